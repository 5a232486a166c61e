//! Session Engine
//!
//! Facade over the connection table. Application calls and transport
//! events both land here; per-session transitions are delegated to
//! [`ControlPath`], wire formatting to [`TrsTx`] and [`TrsRx`].
//!
//! All calls are expected on one processing context. Nothing here blocks:
//! handshake progress is driven by later [`TransportEvent`]s.

use log::{debug, info, trace, warn};

use crate::components::Payload;
use crate::config::EngineConfig;
use crate::conn_table::ConnectionTable;
use crate::control_path::{ControlPath, ErrorAction, ResponseAction};
use crate::error::{Result, SessionError};
use crate::state::{HandshakeStep, Session, UplinkMode};
use crate::transport::Transport;
use crate::trs_in::TrsRx;
use crate::trs_out::TrsTx;
use crate::trs_proto;
use crate::trs_types::{Attribute, CharacteristicRole, ConnHandle, SessionEvent, TransportEvent};

/// Application callback for [`SessionEvent`]s
pub type Listener = Box<dyn FnMut(SessionEvent)>;

/// Single-subscriber event sink
#[derive(Default)]
struct Notifier {
    listener: Option<Listener>,
}

impl Notifier {
    fn emit(&mut self, event: SessionEvent) {
        match self.listener.as_mut() {
            Some(listener) => listener(event),
            None => trace!("no listener, dropped {:?}", event),
        }
    }
}

pub struct SessionEngine<T: Transport> {
    config: EngineConfig,
    table: ConnectionTable,
    transport: T,
    notifier: Notifier,
}

impl<T: Transport> SessionEngine<T> {
    pub fn new(transport: T, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let table = ConnectionTable::new(&config);
        Ok(Self {
            config,
            table,
            transport,
            notifier: Notifier::default(),
        })
    }

    /// Register the application listener, replacing any previous one
    pub fn set_listener<F>(&mut self, listener: F)
    where
        F: FnMut(SessionEvent) + 'static,
    {
        self.notifier.listener = Some(Box::new(listener));
    }

    pub fn clear_listener(&mut self) {
        self.notifier.listener = None;
    }

    // ========================================================================
    // Application operations
    // ========================================================================

    /// Begin or extend the enable handshake.
    ///
    /// Requested directions accumulate across calls. Returns `Busy` when the
    /// first write was deferred; it goes out on the next `TransportReady`.
    pub fn enable_data_session(
        &mut self,
        handle: ConnHandle,
        downlink: bool,
        uplink: bool,
    ) -> Result<()> {
        let session = self.table.lookup_mut(handle).ok_or(SessionError::NotFound)?;
        let step = ControlPath::begin_enable(session, downlink, uplink)?;
        debug!(
            "conn {:#06x}: enable dl={} ul={}, starting {:?}",
            handle, session.requested.downlink, session.requested.uplink, step
        );
        issue_step(&mut self.transport, session, step)
    }

    /// Turn uplink notifications off
    pub fn disable_uplink(&mut self, handle: ConnHandle) -> Result<()> {
        let session = self.table.lookup_mut(handle).ok_or(SessionError::NotFound)?;
        let step = ControlPath::begin_disable_uplink(session)?;
        issue_step(&mut self.transport, session, step)
    }

    /// Write one payload on the downlink
    pub fn send_data(&mut self, handle: ConnHandle, data: &[u8]) -> Result<()> {
        let session = self.table.lookup(handle).ok_or(SessionError::NotFound)?;
        if !session.credit.can_send(session.downlink) {
            return Err(SessionError::Busy);
        }
        // A credit return waiting anywhere holds back every send
        if self.table.any_return_pending() {
            debug!("conn {:#06x}: send held, credit return pending", handle);
            return Err(SessionError::Busy);
        }
        if data.len() > session.max_write_len(self.config.write_overhead) {
            return Err(SessionError::TooLarge);
        }

        let req = TrsTx::data(data, session.downlink)?;
        let downlink = session.downlink;

        TrsTx::send(&mut self.transport, handle, &req)?;

        if let Some(session) = self.table.lookup_mut(handle) {
            session.credit.on_send_accepted(downlink);
            trace!(
                "conn {:#06x}: sent {} bytes, credit={}",
                handle,
                data.len(),
                session.credit.local_credit
            );
        }
        Ok(())
    }

    /// Write a vendor command on the control point
    pub fn send_vendor_command(
        &mut self,
        handle: ConnHandle,
        command_id: u8,
        payload: &[u8],
    ) -> Result<()> {
        let session = self.table.lookup_mut(handle).ok_or(SessionError::NotFound)?;
        if !session.control_point_enabled {
            return Err(SessionError::BadState);
        }
        if command_id < trs_proto::VENDOR_OPCODE_MIN {
            return Err(SessionError::InvalidParameter);
        }
        // One byte of the write goes to the command id
        let max_len = session
            .max_write_len(self.config.write_overhead)
            .saturating_sub(1);
        if payload.len() > max_len {
            return Err(SessionError::InvalidParameter);
        }
        if session.vendor_cmd_in_flight {
            return Err(SessionError::Busy);
        }

        let req = TrsTx::vendor_command(command_id, payload)?;
        TrsTx::send(&mut self.transport, handle, &req)?;
        session.vendor_cmd_in_flight = true;
        debug!("conn {:#06x}: vendor command {:#04x} sent", handle, command_id);
        Ok(())
    }

    /// Length of the oldest queued payload, 0 if none or unknown handle
    pub fn peek_length(&self, handle: ConnHandle) -> usize {
        self.table
            .lookup(handle)
            .map_or(0, |s| s.inbound.peek_length())
    }

    /// Copy the oldest queued payload into `out`.
    ///
    /// `out` shorter than the payload is rejected and nothing is consumed.
    pub fn read_data(&mut self, handle: ConnHandle, out: &mut [u8]) -> Result<usize> {
        let session = self.table.lookup(handle).ok_or(SessionError::NotFound)?;
        if session.inbound.is_empty() {
            return Err(SessionError::Empty);
        }
        if out.len() < session.inbound.peek_length() {
            return Err(SessionError::InvalidParameter);
        }

        let payload = self.take_payload(handle)?;
        out[..payload.len()].copy_from_slice(payload.as_slice());
        Ok(payload.len())
    }

    /// Take ownership of the oldest queued payload
    pub fn take_payload(&mut self, handle: ConnHandle) -> Result<Payload> {
        let session = self.table.lookup_mut(handle).ok_or(SessionError::NotFound)?;
        let payload = session.inbound.dequeue().ok_or(SessionError::Empty)?;

        if session.uplink == UplinkMode::CreditControlled && session.credit.on_payload_delivered() {
            // Busy leaves the credit owed; the next ready scan returns it
            let _ = return_credit(&mut self.transport, &mut self.notifier, session);
        }
        Ok(payload)
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub fn session(&self, handle: ConnHandle) -> Option<&Session> {
        self.table.lookup(handle)
    }

    pub fn active_connections(&self) -> impl Iterator<Item = ConnHandle> + '_ {
        self.table.active().map(|s| s.conn_handle)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // Transport events
    // ========================================================================

    /// Feed one transport event through the engine.
    ///
    /// Events for unknown handles or unknown characteristics are dropped.
    pub fn handle_event(&mut self, event: TransportEvent) {
        trace!("event {:?}", event);

        match event {
            TransportEvent::Connected(handle) => self.on_connected(handle),
            TransportEvent::Disconnected(handle) => {
                if self.table.release(handle).is_err() {
                    warn!("conn {:#06x}: disconnect for unknown handle", handle);
                }
            }
            TransportEvent::WriteResponse { conn, attr } => {
                if let Some(role) = attr.role() {
                    self.on_write_response(conn, role);
                }
            }
            TransportEvent::Notification { conn, attr, value } => {
                self.on_notification(conn, attr, &value)
            }
            TransportEvent::ErrorResponse {
                conn,
                req_opcode,
                attr,
                err_code,
            } => {
                let (Some(role), Some(session)) = (attr.role(), self.table.lookup_mut(conn)) else {
                    return;
                };
                if ControlPath::on_error_response(session, req_opcode, role, err_code)
                    == ErrorAction::Halted
                {
                    debug!("conn {:#06x}: procedure halted", conn);
                }
            }
            TransportEvent::MtuUpdated { conn, mtu } => {
                if let Some(session) = self.table.lookup_mut(conn) {
                    session.mtu = mtu;
                    debug!("conn {:#06x}: mtu {}", conn, mtu);
                }
            }
            TransportEvent::EncryptionEstablished(handle) => {
                let restart = self
                    .table
                    .lookup_mut(handle)
                    .is_some_and(ControlPath::on_encryption_established);
                if restart {
                    info!("conn {:#06x}: link encrypted, restarting enable", handle);
                    self.auto_enable(handle);
                }
            }
            TransportEvent::TransportReady(handle) => self.on_transport_ready(handle),
            TransportEvent::TxBufferAvailable => self.drain_credit_returns(),
            TransportEvent::DiscoveryComplete(handle) => {
                let auto_enable = self.config.auto_enable_on_discovery;
                let Some(session) = self.table.lookup_mut(handle) else {
                    return;
                };
                let enable = ControlPath::on_discovery_complete(session, auto_enable);
                self.notifier.emit(SessionEvent::DiscoveryComplete { conn: handle });
                if enable {
                    self.auto_enable(handle);
                }
            }
        }
    }

    fn on_connected(&mut self, handle: ConnHandle) {
        if self.table.lookup(handle).is_some() {
            warn!("conn {:#06x}: already connected", handle);
            return;
        }
        if let Err(e) = self.table.allocate(handle) {
            warn!("conn {:#06x}: not tracked: {}", handle, e);
        }
    }

    fn on_write_response(&mut self, handle: ConnHandle, role: CharacteristicRole) {
        let Some(session) = self.table.lookup_mut(handle) else {
            return;
        };

        match ControlPath::on_write_response(session, role) {
            ResponseAction::None => {}
            ResponseAction::Issue(step) => {
                let _ = issue_step(&mut self.transport, session, step);
            }
            ResponseAction::UplinkEnabled => {
                let _ = return_credit(&mut self.transport, &mut self.notifier, session);
                self.notifier.emit(SessionEvent::UplinkStatus {
                    conn: handle,
                    mode: UplinkMode::CreditControlled,
                });
            }
            ResponseAction::UplinkDisabled => {
                self.notifier.emit(SessionEvent::UplinkStatus {
                    conn: handle,
                    mode: UplinkMode::Disabled,
                });
            }
            ResponseAction::VendorCommandDone => {
                self.notifier
                    .emit(SessionEvent::VendorCommandResponse { conn: handle });
            }
        }
    }

    fn on_notification(&mut self, handle: ConnHandle, attr: Attribute, value: &[u8]) {
        let Some(session) = self.table.lookup_mut(handle) else {
            return;
        };

        match attr.role() {
            Some(CharacteristicRole::UplinkData) => {
                let payload = match Payload::try_from_slice(value) {
                    Ok(payload) => payload,
                    Err(_) => {
                        warn!("conn {:#06x}: no memory for {} byte payload", handle, value.len());
                        self.notifier.emit(SessionEvent::OutOfMemory { conn: handle });
                        return;
                    }
                };
                if session.inbound.enqueue(payload).is_err() {
                    warn!("conn {:#06x}: inbound queue full, payload dropped", handle);
                    self.notifier.emit(SessionEvent::QueueOverflow { conn: handle });
                    return;
                }
                self.notifier.emit(SessionEvent::ReceiveData { conn: handle });
            }
            Some(CharacteristicRole::ControlPoint) => {
                let Some(msg) = TrsRx::parse_control(value) else {
                    warn!("conn {:#06x}: malformed control message {:02x?}", handle, value);
                    return;
                };
                if let Some(event) = ControlPath::on_control_message(session, msg) {
                    self.notifier.emit(event);
                }
            }
            _ => trace!("conn {:#06x}: notification on {:?} ignored", handle, attr),
        }
    }

    fn on_transport_ready(&mut self, handle: ConnHandle) {
        let Some(session) = self.table.lookup_mut(handle) else {
            trace!("conn {:#06x}: ready for unknown handle", handle);
            return;
        };
        if let Some(step) = ControlPath::on_transport_ready(session) {
            debug!("conn {:#06x}: replaying {:?}", handle, step);
            let _ = issue_step(&mut self.transport, session, step);
            return;
        }
        self.drain_credit_returns();
    }

    fn auto_enable(&mut self, handle: ConnHandle) {
        match self.enable_data_session(handle, true, true) {
            Ok(()) | Err(SessionError::Busy) => {}
            Err(e) => warn!("conn {:#06x}: enable failed: {}", handle, e),
        }
    }

    /// Return credit on every connection holding return-eligible credit
    fn drain_credit_returns(&mut self) {
        for session in self.table.active_mut() {
            if !session.credit.return_due() {
                continue;
            }
            if let Err(SessionError::Busy) =
                return_credit(&mut self.transport, &mut self.notifier, session)
            {
                break;
            }
        }
    }
}

/// Issue the write that starts `step` and record the outcome
fn issue_step<T: Transport>(
    transport: &mut T,
    session: &mut Session,
    step: HandshakeStep,
) -> Result<()> {
    let req = match TrsTx::step_request(step) {
        Ok(req) => req,
        Err(e) => {
            ControlPath::on_issue_aborted(session, step);
            return Err(e);
        }
    };

    let result = TrsTx::send(transport, session.conn_handle, &req);
    ControlPath::on_issue_result(session, step, result);
    result.map_err(SessionError::from)
}

/// Report accumulated peer credit. Busy leaves it owed; allocation
/// failures also reach the listener as `OutOfMemory`.
fn return_credit<T: Transport>(
    transport: &mut T,
    notifier: &mut Notifier,
    session: &mut Session,
) -> Result<()> {
    let conn = session.conn_handle;
    let credit = session.credit.peer_credit;

    let result = TrsTx::credit_return(credit).and_then(|req| {
        TrsTx::send(transport, conn, &req).map_err(SessionError::from)
    });

    match result {
        Ok(()) => {
            session.credit.on_credit_returned();
            debug!("conn {:#06x}: returned {} credit", conn, credit);
        }
        Err(SessionError::Busy) => {
            debug!("conn {:#06x}: credit return deferred", conn);
        }
        Err(ref e) => {
            warn!("conn {:#06x}: credit return of {} failed: {}", conn, credit, e);
            if matches!(e, SessionError::AllocationFailed) {
                notifier.emit(SessionEvent::OutOfMemory { conn });
            }
        }
    }
    result
}
