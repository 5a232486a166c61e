//! Transparent Service TX Path
//!
//! Builds the writes the engine issues and hands them to the transport.
//! Every request buffer is allocated fallibly so memory pressure comes
//! back as `AllocationFailed` instead of aborting.

use log::trace;

use crate::error::{Result, SessionError};
use crate::state::{DownlinkMode, HandshakeStep};
use crate::transport::{Transport, TransportError};
use crate::trs_proto;
use crate::trs_types::{CharacteristicRole, ConnHandle, WriteRequest};

/// Transparent Service TX Path
pub struct TrsTx;

impl TrsTx {
    /// Write that starts `step`. `Idle` has no write.
    pub fn step_request(step: HandshakeStep) -> Result<WriteRequest> {
        match step {
            HandshakeStep::Idle => Err(SessionError::BadState),
            HandshakeStep::EnablingControlPointNotify => Self::cccd_write(
                CharacteristicRole::ControlPointCccd,
                trs_proto::CCCD_NOTIFY,
            ),
            HandshakeStep::EnablingDownlinkCredit => Self::downlink_credit_request(),
            HandshakeStep::EnablingUplinkNotify => {
                Self::cccd_write(CharacteristicRole::UplinkDataCccd, trs_proto::CCCD_NOTIFY)
            }
            HandshakeStep::DisablingUplinkNotify => {
                Self::cccd_write(CharacteristicRole::UplinkDataCccd, trs_proto::CCCD_DISABLE)
            }
        }
    }

    /// Notification descriptor write
    pub fn cccd_write(role: CharacteristicRole, value: u16) -> Result<WriteRequest> {
        let value = Self::alloc_value(&trs_proto::cccd_bytes(value))?;
        Ok(WriteRequest {
            role,
            value,
            with_response: true,
        })
    }

    /// Ask the peer to put the downlink under credit control
    pub fn downlink_credit_request() -> Result<WriteRequest> {
        let value = Self::alloc_value(&[trs_proto::OPCODE_DL_ENABLE])?;
        Ok(WriteRequest {
            role: CharacteristicRole::ControlPoint,
            value,
            with_response: true,
        })
    }

    /// Report `credit` consumed payloads back to the peer
    pub fn credit_return(credit: u8) -> Result<WriteRequest> {
        let value = Self::alloc_value(&[trs_proto::OPCODE_UL_ENABLE, credit])?;
        Ok(WriteRequest {
            role: CharacteristicRole::ControlPoint,
            value,
            with_response: true,
        })
    }

    /// Vendor command: opcode byte followed by the payload
    pub fn vendor_command(command_id: u8, payload: &[u8]) -> Result<WriteRequest> {
        let mut value = Vec::new();
        value
            .try_reserve_exact(payload.len() + 1)
            .map_err(|_| SessionError::AllocationFailed)?;
        value.push(command_id);
        value.extend_from_slice(payload);
        Ok(WriteRequest {
            role: CharacteristicRole::ControlPoint,
            value,
            with_response: true,
        })
    }

    /// Application data on the downlink.
    ///
    /// Credit-controlled downlinks use write commands, plain downlinks use
    /// acknowledged writes.
    pub fn data(payload: &[u8], mode: DownlinkMode) -> Result<WriteRequest> {
        let with_response = match mode {
            DownlinkMode::CreditControlled => false,
            DownlinkMode::PlainRequest => true,
            DownlinkMode::Disabled => return Err(SessionError::BadState),
        };

        Ok(WriteRequest {
            role: CharacteristicRole::DownlinkData,
            value: Self::alloc_value(payload)?,
            with_response,
        })
    }

    /// Hand a request to the transport
    pub fn send<T: Transport + ?Sized>(
        transport: &mut T,
        conn: ConnHandle,
        req: &WriteRequest,
    ) -> core::result::Result<(), TransportError> {
        trace!(
            "conn {:#06x}: write {:?} len={} rsp={}",
            conn,
            req.role,
            req.value.len(),
            req.with_response
        );
        transport.write(conn, req.role, &req.value, req.with_response)
    }

    fn alloc_value(bytes: &[u8]) -> Result<Vec<u8>> {
        let mut value = Vec::new();
        value
            .try_reserve_exact(bytes.len())
            .map_err(|_| SessionError::AllocationFailed)?;
        value.extend_from_slice(bytes);
        Ok(value)
    }
}
