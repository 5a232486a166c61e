//! Session Control Path
//!
//! Enable/disable procedure transitions. Every function here is a pure
//! state change on one `Session`; the engine issues whatever write the
//! transition asks for and reports the outcome back through
//! `on_issue_result`.

use log::{debug, info, warn};

use crate::error::{Result, SessionError};
use crate::state::{DownlinkMode, HandshakeStep, Session, UplinkMode};
use crate::transport::TransportError;
use crate::trs_proto;
use crate::trs_types::{CharacteristicRole, ControlMessage, SessionEvent};

/// Action to take after a write response
#[derive(Debug, PartialEq, Eq)]
pub enum ResponseAction {
    /// Nothing to do
    None,
    /// Issue the write that starts this step
    Issue(HandshakeStep),
    /// Uplink is now credit controlled: return the initial grant and
    /// report uplink status
    UplinkEnabled,
    /// Uplink notifications are off: report uplink status
    UplinkDisabled,
    /// The outstanding vendor command was acknowledged
    VendorCommandDone,
}

/// Outcome of an error response
#[derive(Debug, PartialEq, Eq)]
pub enum ErrorAction {
    Ignore,
    /// Peer wants an encrypted link before enabling notifications
    AwaitEncryption,
    /// Outstanding step failed; procedure is back at Idle
    Halted,
}

/// Control Path: enable/disable procedure
///
/// Enable runs:
/// - Downlink requested: CP notify -> DL credit request -> (UL notify)
/// - Uplink only: UL notify
///
/// Disable runs UL notify off from Idle.
pub struct ControlPath;

impl ControlPath {
    // ========================================================================
    // Procedure start
    // ========================================================================

    /// Accumulate requested directions and pick the first step.
    ///
    /// Without a downlink request the downlink falls back to acknowledged
    /// writes, unless it is already enabled.
    pub fn begin_enable(
        session: &mut Session,
        downlink: bool,
        uplink: bool,
    ) -> Result<HandshakeStep> {
        session.requested.merge(downlink, uplink);

        if session.requested.downlink {
            return Ok(HandshakeStep::EnablingControlPointNotify);
        }
        if !session.requested.uplink {
            return Err(SessionError::InvalidRequest);
        }

        if session.downlink == DownlinkMode::Disabled {
            session.downlink = DownlinkMode::PlainRequest;
            debug!("conn {:#06x}: downlink uses acknowledged writes", session.conn_handle);
        }
        Ok(HandshakeStep::EnablingUplinkNotify)
    }

    /// Start turning uplink notifications off
    pub fn begin_disable_uplink(session: &Session) -> Result<HandshakeStep> {
        if session.uplink != UplinkMode::CreditControlled || !session.step.is_idle() {
            return Err(SessionError::BadState);
        }
        Ok(HandshakeStep::DisablingUplinkNotify)
    }

    /// Record what happened to the write that starts `step`.
    ///
    /// Busy arms a replay; any other failure abandons the procedure.
    pub fn on_issue_result(
        session: &mut Session,
        step: HandshakeStep,
        result: core::result::Result<(), TransportError>,
    ) {
        match result {
            Ok(()) => {
                session.step = step;
                session.retry.clear();
            }
            Err(TransportError::Busy) => {
                session.step = HandshakeStep::Idle;
                session.retry.arm(step);
                debug!("conn {:#06x}: {:?} deferred, transport busy", session.conn_handle, step);
            }
            Err(e) => {
                session.step = HandshakeStep::Idle;
                session.retry.clear();
                warn!("conn {:#06x}: {:?} failed: {}", session.conn_handle, step, e);
            }
        }
    }

    /// A write this side could not even build never reaches the transport
    pub fn on_issue_aborted(session: &mut Session, step: HandshakeStep) {
        session.step = HandshakeStep::Idle;
        session.retry.clear();
        warn!("conn {:#06x}: {:?} abandoned, no memory", session.conn_handle, step);
    }

    // ========================================================================
    // Responses
    // ========================================================================

    /// Process a write response on `role`
    ///
    /// Transition: outstanding step -> next step or Idle
    pub fn on_write_response(session: &mut Session, role: CharacteristicRole) -> ResponseAction {
        let step = session.step;

        // A control point response belongs to the vendor command unless the
        // outstanding step itself wrote the control point
        if role == CharacteristicRole::ControlPoint
            && session.vendor_cmd_in_flight
            && step.written_role() != Some(CharacteristicRole::ControlPoint)
        {
            session.vendor_cmd_in_flight = false;
            return ResponseAction::VendorCommandDone;
        }

        if step.is_idle() {
            return ResponseAction::None;
        }

        if step.written_role() != Some(role) {
            debug!(
                "conn {:#06x}: response on {:?} while {:?}, ignored",
                session.conn_handle, role, step
            );
            return ResponseAction::None;
        }

        session.step = HandshakeStep::Idle;

        match step {
            HandshakeStep::EnablingControlPointNotify => {
                session.control_point_enabled = true;
                ResponseAction::Issue(HandshakeStep::EnablingDownlinkCredit)
            }
            HandshakeStep::EnablingDownlinkCredit => {
                if session.requested.uplink {
                    ResponseAction::Issue(HandshakeStep::EnablingUplinkNotify)
                } else {
                    ResponseAction::None
                }
            }
            HandshakeStep::EnablingUplinkNotify => {
                session.uplink = UplinkMode::CreditControlled;
                session.credit.seed_peer_credit();
                info!("conn {:#06x}: uplink credit controlled", session.conn_handle);
                ResponseAction::UplinkEnabled
            }
            HandshakeStep::DisablingUplinkNotify => {
                session.uplink = UplinkMode::Disabled;
                session.credit.reset_uplink();
                info!("conn {:#06x}: uplink disabled", session.conn_handle);
                ResponseAction::UplinkDisabled
            }
            HandshakeStep::Idle => ResponseAction::None,
        }
    }

    /// Process an error response to a write on `role`
    pub fn on_error_response(
        session: &mut Session,
        req_opcode: u8,
        role: CharacteristicRole,
        err_code: u8,
    ) -> ErrorAction {
        if req_opcode != trs_proto::ATT_WRITE_REQ {
            return ErrorAction::Ignore;
        }

        if role == CharacteristicRole::ControlPointCccd && trs_proto::is_security_error(err_code) {
            session.auth_required = true;
            session.retry.clear();
            if session.step == HandshakeStep::EnablingControlPointNotify {
                session.step = HandshakeStep::Idle;
            }
            info!(
                "conn {:#06x}: control point needs encryption (err {:#04x})",
                session.conn_handle, err_code
            );
            return ErrorAction::AwaitEncryption;
        }

        if !session.step.is_idle() && session.step.written_role() == Some(role) {
            warn!(
                "conn {:#06x}: {:?} rejected (err {:#04x})",
                session.conn_handle, session.step, err_code
            );
            session.step = HandshakeStep::Idle;
            return ErrorAction::Halted;
        }

        ErrorAction::Ignore
    }

    // ========================================================================
    // Link events
    // ========================================================================

    /// Pending replay, if the transport can take it now
    pub fn on_transport_ready(session: &mut Session) -> Option<HandshakeStep> {
        session.retry.take()
    }

    /// Returns true when the full enable should restart
    pub fn on_encryption_established(session: &mut Session) -> bool {
        if session.control_point_discovered && session.auth_required {
            session.auth_required = false;
            return true;
        }
        false
    }

    /// Returns true when the full enable should start now
    pub fn on_discovery_complete(session: &mut Session, auto_enable: bool) -> bool {
        session.control_point_discovered = true;
        auto_enable && !session.auth_required
    }

    /// Apply a parsed control point notification.
    ///
    /// Returns the event the application should see, if any.
    pub fn on_control_message(session: &mut Session, msg: ControlMessage) -> Option<SessionEvent> {
        let conn = session.conn_handle;

        match msg {
            ControlMessage::DownlinkEnabled { mtu, credit } => {
                session.downlink = DownlinkMode::CreditControlled;
                session.mtu = mtu;
                session.credit.on_credit_grant_received(credit);
                info!(
                    "conn {:#06x}: downlink credit controlled, mtu={} credit={}",
                    conn, mtu, session.credit.local_credit
                );
                Some(SessionEvent::DownlinkStatus {
                    conn,
                    mode: session.downlink,
                    credit: session.credit.local_credit,
                })
            }
            ControlMessage::CreditGrant(granted) => {
                if session.downlink != DownlinkMode::CreditControlled {
                    debug!("conn {:#06x}: credit grant before downlink enable, ignored", conn);
                    return None;
                }
                session.credit.on_credit_grant_received(granted);
                debug!(
                    "conn {:#06x}: +{} credit, now {}",
                    conn, granted, session.credit.local_credit
                );
                Some(SessionEvent::DownlinkStatus {
                    conn,
                    mode: session.downlink,
                    credit: session.credit.local_credit,
                })
            }
            ControlMessage::Success { req_opcode } => {
                debug!("conn {:#06x}: peer acknowledged opcode {:#04x}", conn, req_opcode);
                None
            }
            ControlMessage::VendorCommand {
                command_id,
                payload,
            } => Some(SessionEvent::VendorCommand {
                conn,
                command_id,
                payload,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn session() -> Session {
        let mut s = Session::new(0, &EngineConfig::default());
        s.conn_handle = 0x40;
        s
    }

    #[test]
    fn test_begin_enable_full() {
        let mut s = session();
        let step = ControlPath::begin_enable(&mut s, true, true).unwrap();
        assert_eq!(step, HandshakeStep::EnablingControlPointNotify);
        assert_eq!(s.downlink, DownlinkMode::Disabled);
    }

    #[test]
    fn test_begin_enable_uplink_only_sets_plain_downlink() {
        let mut s = session();
        let step = ControlPath::begin_enable(&mut s, false, true).unwrap();
        assert_eq!(step, HandshakeStep::EnablingUplinkNotify);
        assert_eq!(s.downlink, DownlinkMode::PlainRequest);
    }

    #[test]
    fn test_begin_enable_keeps_credit_downlink() {
        let mut s = session();
        s.downlink = DownlinkMode::CreditControlled;
        ControlPath::begin_enable(&mut s, false, true).unwrap();
        assert_eq!(s.downlink, DownlinkMode::CreditControlled);
    }

    #[test]
    fn test_begin_enable_nothing_requested() {
        let mut s = session();
        assert!(matches!(
            ControlPath::begin_enable(&mut s, false, false),
            Err(SessionError::InvalidRequest)
        ));
        assert_eq!(s.downlink, DownlinkMode::Disabled);
    }

    #[test]
    fn test_requested_directions_persist() {
        let mut s = session();
        ControlPath::begin_enable(&mut s, true, false).unwrap();
        let step = ControlPath::begin_enable(&mut s, false, false).unwrap();
        assert_eq!(step, HandshakeStep::EnablingControlPointNotify);
    }

    #[test]
    fn test_full_enable_sequence() {
        let mut s = session();
        s.requested.merge(true, true);
        ControlPath::on_issue_result(&mut s, HandshakeStep::EnablingControlPointNotify, Ok(()));

        let action = ControlPath::on_write_response(&mut s, CharacteristicRole::ControlPointCccd);
        assert_eq!(action, ResponseAction::Issue(HandshakeStep::EnablingDownlinkCredit));
        assert!(s.control_point_enabled);
        ControlPath::on_issue_result(&mut s, HandshakeStep::EnablingDownlinkCredit, Ok(()));

        let action = ControlPath::on_write_response(&mut s, CharacteristicRole::ControlPoint);
        assert_eq!(action, ResponseAction::Issue(HandshakeStep::EnablingUplinkNotify));
        ControlPath::on_issue_result(&mut s, HandshakeStep::EnablingUplinkNotify, Ok(()));

        let action = ControlPath::on_write_response(&mut s, CharacteristicRole::UplinkDataCccd);
        assert_eq!(action, ResponseAction::UplinkEnabled);
        assert_eq!(s.uplink, UplinkMode::CreditControlled);
        assert_eq!(s.credit.peer_credit, 16);
        assert_eq!(s.step, HandshakeStep::Idle);
    }

    #[test]
    fn test_response_on_wrong_role_ignored() {
        let mut s = session();
        s.step = HandshakeStep::EnablingControlPointNotify;
        let action = ControlPath::on_write_response(&mut s, CharacteristicRole::UplinkDataCccd);
        assert_eq!(action, ResponseAction::None);
        assert_eq!(s.step, HandshakeStep::EnablingControlPointNotify);
        assert!(!s.control_point_enabled);
    }

    #[test]
    fn test_downlink_only_stops_after_credit_request() {
        let mut s = session();
        s.requested.merge(true, false);
        s.step = HandshakeStep::EnablingDownlinkCredit;
        let action = ControlPath::on_write_response(&mut s, CharacteristicRole::ControlPoint);
        assert_eq!(action, ResponseAction::None);
        assert!(s.step.is_idle());
    }

    #[test]
    fn test_busy_arms_retry() {
        let mut s = session();
        ControlPath::on_issue_result(
            &mut s,
            HandshakeStep::EnablingDownlinkCredit,
            Err(TransportError::Busy),
        );
        assert!(s.step.is_idle());
        assert_eq!(s.retry.pending(), Some(HandshakeStep::EnablingDownlinkCredit));

        assert_eq!(
            ControlPath::on_transport_ready(&mut s),
            Some(HandshakeStep::EnablingDownlinkCredit)
        );
        assert_eq!(ControlPath::on_transport_ready(&mut s), None);
    }

    #[test]
    fn test_other_failure_halts() {
        let mut s = session();
        s.retry.arm(HandshakeStep::EnablingUplinkNotify);
        ControlPath::on_issue_result(
            &mut s,
            HandshakeStep::EnablingUplinkNotify,
            Err(TransportError::Rejected(0x13)),
        );
        assert!(s.step.is_idle());
        assert_eq!(s.retry.pending(), None);
    }

    #[test]
    fn test_vendor_response_when_idle() {
        let mut s = session();
        s.vendor_cmd_in_flight = true;
        assert_eq!(
            ControlPath::on_write_response(&mut s, CharacteristicRole::ControlPoint),
            ResponseAction::VendorCommandDone
        );
        assert!(!s.vendor_cmd_in_flight);
        assert_eq!(
            ControlPath::on_write_response(&mut s, CharacteristicRole::ControlPoint),
            ResponseAction::None
        );
    }

    #[test]
    fn test_vendor_response_during_uplink_step() {
        let mut s = session();
        s.vendor_cmd_in_flight = true;
        s.step = HandshakeStep::DisablingUplinkNotify;
        assert_eq!(
            ControlPath::on_write_response(&mut s, CharacteristicRole::ControlPoint),
            ResponseAction::VendorCommandDone
        );
        assert!(!s.vendor_cmd_in_flight);
        assert_eq!(s.step, HandshakeStep::DisablingUplinkNotify);
    }

    #[test]
    fn test_control_point_step_takes_precedence_over_vendor() {
        let mut s = session();
        s.vendor_cmd_in_flight = true;
        s.step = HandshakeStep::EnablingDownlinkCredit;
        assert_eq!(
            ControlPath::on_write_response(&mut s, CharacteristicRole::ControlPoint),
            ResponseAction::None
        );
        assert!(s.vendor_cmd_in_flight);
        assert!(s.step.is_idle());
    }

    #[test]
    fn test_disable_requires_credit_uplink() {
        let mut s = session();
        assert!(matches!(
            ControlPath::begin_disable_uplink(&s),
            Err(SessionError::BadState)
        ));

        s.uplink = UplinkMode::CreditControlled;
        s.credit.seed_peer_credit();
        let step = ControlPath::begin_disable_uplink(&s).unwrap();
        ControlPath::on_issue_result(&mut s, step, Ok(()));
        assert!(matches!(
            ControlPath::begin_disable_uplink(&s),
            Err(SessionError::BadState)
        ));

        let action = ControlPath::on_write_response(&mut s, CharacteristicRole::UplinkDataCccd);
        assert_eq!(action, ResponseAction::UplinkDisabled);
        assert_eq!(s.uplink, UplinkMode::Disabled);
        assert_eq!(s.credit.peer_credit, 0);
    }

    #[test]
    fn test_auth_gate() {
        let mut s = session();
        s.step = HandshakeStep::EnablingControlPointNotify;
        let action = ControlPath::on_error_response(
            &mut s,
            trs_proto::ATT_WRITE_REQ,
            CharacteristicRole::ControlPointCccd,
            trs_proto::ATT_ERR_INSUFFICIENT_AUTHENTICATION,
        );
        assert_eq!(action, ErrorAction::AwaitEncryption);
        assert!(s.auth_required);
        assert!(s.step.is_idle());

        // Not discovered yet
        assert!(!ControlPath::on_encryption_established(&mut s));
        assert!(!ControlPath::on_discovery_complete(&mut s, true));
        assert!(ControlPath::on_encryption_established(&mut s));
        assert!(!s.auth_required);
        assert!(!ControlPath::on_encryption_established(&mut s));
    }

    #[test]
    fn test_error_on_outstanding_step_halts() {
        let mut s = session();
        s.step = HandshakeStep::EnablingDownlinkCredit;
        let action = ControlPath::on_error_response(
            &mut s,
            trs_proto::ATT_WRITE_REQ,
            CharacteristicRole::ControlPoint,
            0x80,
        );
        assert_eq!(action, ErrorAction::Halted);
        assert!(s.step.is_idle());
    }

    #[test]
    fn test_unrelated_error_ignored() {
        let mut s = session();
        s.step = HandshakeStep::EnablingDownlinkCredit;
        let action = ControlPath::on_error_response(
            &mut s,
            trs_proto::ATT_WRITE_REQ,
            CharacteristicRole::DownlinkData,
            0x80,
        );
        assert_eq!(action, ErrorAction::Ignore);
        assert_eq!(s.step, HandshakeStep::EnablingDownlinkCredit);
    }

    #[test]
    fn test_downlink_enabled_message() {
        let mut s = session();
        let event = ControlPath::on_control_message(
            &mut s,
            ControlMessage::DownlinkEnabled { mtu: 247, credit: 10 },
        );
        assert_eq!(
            event,
            Some(SessionEvent::DownlinkStatus {
                conn: 0x40,
                mode: DownlinkMode::CreditControlled,
                credit: 10,
            })
        );
        assert_eq!(s.mtu, 247);
        assert_eq!(s.credit.local_credit, 10);
    }

    #[test]
    fn test_credit_grant_needs_credit_downlink() {
        let mut s = session();
        assert_eq!(ControlPath::on_control_message(&mut s, ControlMessage::CreditGrant(4)), None);
        assert_eq!(s.credit.local_credit, 0);

        s.downlink = DownlinkMode::CreditControlled;
        s.credit.local_credit = 1;
        ControlPath::on_control_message(&mut s, ControlMessage::CreditGrant(4));
        assert_eq!(s.credit.local_credit, 5);
    }
}
