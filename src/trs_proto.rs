//! Transparent Service Protocol Definitions
//!
//! Wire constants for the control point, the notification descriptors
//! and the ATT layer the service rides on.

/// Control point opcode: success response
pub const OPCODE_SUCCESS: u8 = 0x00;

/// Control point opcode: enable credit based flow control on the downlink
pub const OPCODE_DL_ENABLE: u8 = 0x14;

/// Control point opcode: enable credit based flow control on the uplink,
/// also used to return uplink credits to the peer
pub const OPCODE_UL_ENABLE: u8 = 0x15;

/// Vendor command opcode range (inclusive)
pub const VENDOR_OPCODE_MIN: u8 = 0x20;
pub const VENDOR_OPCODE_MAX: u8 = 0xFF;

/// CCCD values (little-endian on the wire)
pub const CCCD_DISABLE: u16 = 0x0000;
pub const CCCD_NOTIFY: u16 = 0x0001;

/// Credits granted to the peer when the uplink is enabled
pub const INITIAL_CREDIT: u8 = 16;

/// Consumed payloads after which credits are returned to the peer
pub const RETURN_THRESHOLD: u8 = 13;

/// ATT default MTU before any exchange
pub const ATT_DEFAULT_MTU: u16 = 23;

/// ATT write header: opcode + attribute handle
pub const ATT_WRITE_HEADER_SIZE: u16 = 3;

/// ATT write request opcode, as echoed in an error response
pub const ATT_WRITE_REQ: u8 = 0x12;

/// ATT error codes
pub const ATT_ERR_INSUFFICIENT_AUTHENTICATION: u8 = 0x05;
pub const ATT_ERR_INSUFFICIENT_ENCRYPTION: u8 = 0x0F;

/// Length of the downlink-enable success response:
/// opcode, request opcode, MTU (2 bytes BE), granted credits
pub const DL_ENABLE_RSP_LEN: usize = 5;

/// Encode a CCCD value as it goes on the wire
#[inline]
pub fn cccd_bytes(value: u16) -> [u8; 2] {
    value.to_le_bytes()
}

/// Check whether an opcode falls in the vendor command range
#[inline]
pub fn is_vendor_opcode(opcode: u8) -> bool {
    (VENDOR_OPCODE_MIN..=VENDOR_OPCODE_MAX).contains(&opcode)
}

/// Check whether an ATT error code means the link must be secured first
#[inline]
pub fn is_security_error(err_code: u8) -> bool {
    err_code == ATT_ERR_INSUFFICIENT_AUTHENTICATION || err_code == ATT_ERR_INSUFFICIENT_ENCRYPTION
}

// The queue sizing and the return threshold must stay consistent
const _: () = assert!(RETURN_THRESHOLD <= INITIAL_CREDIT);
