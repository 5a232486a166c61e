//! Test Helper Functions for Session Engine Tests
//!
//! This module provides a mock transport that captures every write, an
//! event recorder and canned handshake sequences.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use trs_cbfc::{
    Attribute, CharacteristicRole, ConnHandle, EngineConfig, SessionEngine, SessionEvent,
    Transport, TransportError, TransportEvent,
};

/// Test connection handles
pub const TEST_CONN: ConnHandle = 0x0040;
pub const TEST_CONN_2: ConnHandle = 0x0041;

/// MTU the mock peer negotiates when confirming downlink credit control
pub const TEST_NEGOTIATED_MTU: u16 = 247;

/// A write captured by the mock transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedWrite {
    pub conn: ConnHandle,
    pub role: CharacteristicRole,
    pub value: Vec<u8>,
    pub with_response: bool,
}

/// Mock transport for capturing writes
///
/// `busy` rejects every write with `TransportError::Busy`; `fail_with`
/// takes precedence and rejects with the given error.
#[derive(Debug, Default)]
pub struct MockTransport {
    pub writes: Vec<CapturedWrite>,
    pub busy: bool,
    pub fail_with: Option<TransportError>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.writes.clear();
    }

    pub fn count(&self) -> usize {
        self.writes.len()
    }

    pub fn last(&self) -> Option<&CapturedWrite> {
        self.writes.last()
    }

    /// Writes that went to `role`, oldest first
    pub fn writes_to(&self, role: CharacteristicRole) -> Vec<&CapturedWrite> {
        self.writes.iter().filter(|w| w.role == role).collect()
    }
}

impl Transport for MockTransport {
    fn write(
        &mut self,
        conn: ConnHandle,
        role: CharacteristicRole,
        value: &[u8],
        with_response: bool,
    ) -> Result<(), TransportError> {
        if let Some(err) = self.fail_with {
            return Err(err);
        }
        if self.busy {
            return Err(TransportError::Busy);
        }
        self.writes.push(CapturedWrite {
            conn,
            role,
            value: value.to_vec(),
            with_response,
        });
        Ok(())
    }
}

pub type EventLog = Rc<RefCell<Vec<SessionEvent>>>;

/// Engine wired to a mock transport and an event recorder
pub struct TestBench {
    pub engine: SessionEngine<MockTransport>,
    pub events: EventLog,
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn create_bench() -> TestBench {
    create_bench_with(EngineConfig::default())
}

pub fn create_bench_with(config: EngineConfig) -> TestBench {
    init_logging();

    let mut engine = SessionEngine::new(MockTransport::new(), config).expect("valid config");
    let events: EventLog = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    engine.set_listener(move |event| sink.borrow_mut().push(event));

    TestBench { engine, events }
}

impl TestBench {
    pub fn transport(&mut self) -> &mut MockTransport {
        self.engine.transport_mut()
    }

    pub fn connect(&mut self, conn: ConnHandle) {
        self.engine.handle_event(TransportEvent::Connected(conn));
    }

    pub fn write_response(&mut self, conn: ConnHandle, role: CharacteristicRole) {
        self.engine.handle_event(TransportEvent::WriteResponse {
            conn,
            attr: Attribute::Role(role),
        });
    }

    pub fn notify(&mut self, conn: ConnHandle, role: CharacteristicRole, value: &[u8]) {
        self.engine.handle_event(TransportEvent::Notification {
            conn,
            attr: Attribute::Role(role),
            value: value.to_vec(),
        });
    }

    /// Deliver one payload on the uplink data characteristic
    pub fn deliver(&mut self, conn: ConnHandle, payload: &[u8]) {
        self.notify(conn, CharacteristicRole::UplinkData, payload);
    }

    pub fn ready(&mut self, conn: ConnHandle) {
        self.engine.handle_event(TransportEvent::TransportReady(conn));
    }

    /// Peer confirms downlink credit control with `credit` sends
    pub fn confirm_downlink(&mut self, conn: ConnHandle, credit: u8) {
        let mtu = TEST_NEGOTIATED_MTU.to_be_bytes();
        self.notify(
            conn,
            CharacteristicRole::ControlPoint,
            &[0x00, 0x14, mtu[0], mtu[1], credit],
        );
    }

    /// Connect and run the whole enable handshake in both directions.
    /// Captured writes and recorded events are cleared afterwards.
    pub fn connect_and_enable(&mut self, conn: ConnHandle, credit: u8) {
        self.connect(conn);
        self.engine
            .enable_data_session(conn, true, true)
            .expect("enable accepted");
        self.write_response(conn, CharacteristicRole::ControlPointCccd);
        self.write_response(conn, CharacteristicRole::ControlPoint);
        self.confirm_downlink(conn, credit);
        self.write_response(conn, CharacteristicRole::UplinkDataCccd);

        self.transport().clear();
        self.events.borrow_mut().clear();
    }

    pub fn take_events(&self) -> Vec<SessionEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}
