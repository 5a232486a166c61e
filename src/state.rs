//! Session State
//!
//! This module provides the complete per-connection session by aggregating
//! the state components from the components module.

pub use crate::components::{CreditState, InboundQueue, Payload, RetryState};

use crate::config::EngineConfig;
use crate::trs_types::{CharacteristicRole, ConnHandle};

/// Enable/disable procedure states
///
/// Every state other than `Idle` has exactly one write outstanding.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HandshakeStep {
    Idle,
    EnablingControlPointNotify,
    EnablingDownlinkCredit,
    EnablingUplinkNotify,
    DisablingUplinkNotify,
}

impl HandshakeStep {
    /// Characteristic the step's write goes to
    pub fn written_role(self) -> Option<CharacteristicRole> {
        match self {
            HandshakeStep::Idle => None,
            HandshakeStep::EnablingControlPointNotify => Some(CharacteristicRole::ControlPointCccd),
            HandshakeStep::EnablingDownlinkCredit => Some(CharacteristicRole::ControlPoint),
            HandshakeStep::EnablingUplinkNotify | HandshakeStep::DisablingUplinkNotify => {
                Some(CharacteristicRole::UplinkDataCccd)
            }
        }
    }

    pub fn is_idle(self) -> bool {
        self == HandshakeStep::Idle
    }
}

/// How data writes on the downlink are issued
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DownlinkMode {
    Disabled,
    /// Acknowledged writes, no credit accounting
    PlainRequest,
    /// Unacknowledged writes paced by peer credit
    CreditControlled,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UplinkMode {
    Disabled,
    CreditControlled,
}

/// Directions the application asked for, accumulated across calls
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RequestedDirections {
    pub downlink: bool,
    pub uplink: bool,
}

impl RequestedDirections {
    pub fn merge(&mut self, downlink: bool, uplink: bool) {
        self.downlink |= downlink;
        self.uplink |= uplink;
    }

    pub fn is_empty(&self) -> bool {
        !self.downlink && !self.uplink
    }
}

/// Complete Session State
///
/// One per active connection. A slot whose `conn_handle` is 0 is free.
#[derive(Debug)]
pub struct Session {
    /* Identity */
    pub conn_handle: ConnHandle,
    pub slot_index: usize,

    /* Link */
    pub mtu: u16,
    pub control_point_discovered: bool,

    /* Modes */
    pub downlink: DownlinkMode,
    pub uplink: UplinkMode,
    pub control_point_enabled: bool,
    pub requested: RequestedDirections,

    /* Procedure */
    pub step: HandshakeStep,
    pub retry: RetryState,
    pub vendor_cmd_in_flight: bool,
    pub auth_required: bool,

    /* Components */
    pub credit: CreditState,
    pub inbound: InboundQueue,

    default_mtu: u16,
}

impl Session {
    pub fn new(slot_index: usize, config: &EngineConfig) -> Self {
        let initial_credit = config.initial_credit as u8;
        Self {
            conn_handle: 0,
            slot_index,
            mtu: config.default_mtu,
            control_point_discovered: false,
            downlink: DownlinkMode::Disabled,
            uplink: UplinkMode::Disabled,
            control_point_enabled: false,
            requested: RequestedDirections::default(),
            step: HandshakeStep::Idle,
            retry: RetryState::new(),
            vendor_cmd_in_flight: false,
            auth_required: false,
            credit: CreditState::new(initial_credit, config.return_threshold as u8),
            inbound: InboundQueue::new(initial_credit as usize),
            default_mtu: config.default_mtu,
        }
    }

    pub fn is_free(&self) -> bool {
        self.conn_handle == 0
    }

    /// Largest payload a single write can carry
    pub fn max_write_len(&self, write_overhead: u16) -> usize {
        self.mtu.saturating_sub(write_overhead) as usize
    }

    /// Back to defaults, releasing every queued payload
    pub fn reset(&mut self) {
        self.inbound.flush_all();
        self.conn_handle = 0;
        self.mtu = self.default_mtu;
        self.control_point_discovered = false;
        self.downlink = DownlinkMode::Disabled;
        self.uplink = UplinkMode::Disabled;
        self.control_point_enabled = false;
        self.requested = RequestedDirections::default();
        self.step = HandshakeStep::Idle;
        self.retry.clear();
        self.vendor_cmd_in_flight = false;
        self.auth_required = false;
        self.credit.reset();
    }
}
