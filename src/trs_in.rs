//! Transparent Service RX Path
//!
//! Decodes notifications pushed by the peer on the control point.

use crate::trs_proto;
use crate::trs_types::ControlMessage;

/// Transparent Service RX Path
pub struct TrsRx;

impl TrsRx {
    /// Parse a control point notification.
    ///
    /// Returns `None` for unknown opcodes and for values too short to hold
    /// what their opcode promises.
    pub fn parse_control(value: &[u8]) -> Option<ControlMessage> {
        let opcode = *value.first()?;

        match opcode {
            trs_proto::OPCODE_SUCCESS => {
                let req_opcode = *value.get(1)?;
                if req_opcode != trs_proto::OPCODE_DL_ENABLE {
                    return Some(ControlMessage::Success { req_opcode });
                }
                if value.len() < trs_proto::DL_ENABLE_RSP_LEN {
                    return None;
                }
                // MTU is big-endian on this opcode
                let mtu = u16::from_be_bytes([value[2], value[3]]);
                Some(ControlMessage::DownlinkEnabled {
                    mtu,
                    credit: value[4],
                })
            }
            trs_proto::OPCODE_DL_ENABLE => Some(ControlMessage::CreditGrant(*value.get(1)?)),
            op if trs_proto::is_vendor_opcode(op) => Some(ControlMessage::VendorCommand {
                command_id: op,
                payload: value[1..].to_vec(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downlink_enabled_response() {
        let msg = TrsRx::parse_control(&[0x00, 0x14, 0x00, 0xF7, 0x05]);
        assert_eq!(msg, Some(ControlMessage::DownlinkEnabled { mtu: 247, credit: 5 }));
    }

    #[test]
    fn test_truncated_downlink_response() {
        assert_eq!(TrsRx::parse_control(&[0x00, 0x14, 0x00]), None);
        assert_eq!(TrsRx::parse_control(&[0x00]), None);
        assert_eq!(TrsRx::parse_control(&[]), None);
    }

    #[test]
    fn test_other_success_response() {
        assert_eq!(
            TrsRx::parse_control(&[0x00, 0x15]),
            Some(ControlMessage::Success { req_opcode: 0x15 })
        );
    }

    #[test]
    fn test_credit_grant() {
        assert_eq!(TrsRx::parse_control(&[0x14, 0x08]), Some(ControlMessage::CreditGrant(8)));
        assert_eq!(TrsRx::parse_control(&[0x14]), None);
    }

    #[test]
    fn test_vendor_command() {
        assert_eq!(
            TrsRx::parse_control(&[0x30, 1, 2, 3]),
            Some(ControlMessage::VendorCommand {
                command_id: 0x30,
                payload: vec![1, 2, 3],
            })
        );
        assert_eq!(
            TrsRx::parse_control(&[0xFF]),
            Some(ControlMessage::VendorCommand {
                command_id: 0xFF,
                payload: vec![],
            })
        );
    }

    #[test]
    fn test_unknown_opcode() {
        assert_eq!(TrsRx::parse_control(&[0x15, 0x10]), None);
        assert_eq!(TrsRx::parse_control(&[0x1F]), None);
    }
}
