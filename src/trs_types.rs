//! Transparent Service Common Types
//!
//! Shared types used across the session engine modules.

use crate::state::{DownlinkMode, UplinkMode};

/// Transport connection handle. Zero never names a live connection.
pub type ConnHandle = u16;

/// The five characteristics of the transparent service
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CharacteristicRole {
    UplinkData,
    UplinkDataCccd,
    DownlinkData,
    ControlPoint,
    ControlPointCccd,
}

/// Attribute an event refers to, as resolved by the transport
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Attribute {
    Role(CharacteristicRole),
    /// Any attribute outside the transparent service
    Foreign(u16),
}

impl Attribute {
    pub fn role(self) -> Option<CharacteristicRole> {
        match self {
            Attribute::Role(role) => Some(role),
            Attribute::Foreign(_) => None,
        }
    }
}

impl From<CharacteristicRole> for Attribute {
    fn from(role: CharacteristicRole) -> Self {
        Attribute::Role(role)
    }
}

/// One write handed to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub role: CharacteristicRole,
    pub value: Vec<u8>,
    /// Acknowledged write (a write-response event follows) vs write command
    pub with_response: bool,
}

/// Events delivered by the transport, already serialized onto the
/// engine's processing context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected(ConnHandle),
    Disconnected(ConnHandle),
    WriteResponse {
        conn: ConnHandle,
        attr: Attribute,
    },
    Notification {
        conn: ConnHandle,
        attr: Attribute,
        value: Vec<u8>,
    },
    ErrorResponse {
        conn: ConnHandle,
        req_opcode: u8,
        attr: Attribute,
        err_code: u8,
    },
    MtuUpdated {
        conn: ConnHandle,
        mtu: u16,
    },
    EncryptionEstablished(ConnHandle),
    /// A write previously rejected as busy may now be retried
    TransportReady(ConnHandle),
    /// Link-layer buffers were freed on some connection
    TxBufferAvailable,
    /// Service discovery found the control point on this link
    DiscoveryComplete(ConnHandle),
}

/// Notifications raised to the application listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    UplinkStatus {
        conn: ConnHandle,
        mode: UplinkMode,
    },
    DownlinkStatus {
        conn: ConnHandle,
        mode: DownlinkMode,
        credit: u8,
    },
    ReceiveData {
        conn: ConnHandle,
    },
    VendorCommand {
        conn: ConnHandle,
        command_id: u8,
        payload: Vec<u8>,
    },
    VendorCommandResponse {
        conn: ConnHandle,
    },
    DiscoveryComplete {
        conn: ConnHandle,
    },
    /// An inbound payload could not be buffered
    OutOfMemory {
        conn: ConnHandle,
    },
    /// A payload arrived while the inbound queue was full
    QueueOverflow {
        conn: ConnHandle,
    },
}

/// Parsed control point notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Peer confirmed downlink credit control
    DownlinkEnabled { mtu: u16, credit: u8 },
    /// Peer granted more downlink credits
    CreditGrant(u8),
    /// Success response to some other request
    Success { req_opcode: u8 },
    VendorCommand { command_id: u8, payload: Vec<u8> },
}
