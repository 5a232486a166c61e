//! Credit-based flow control session manager for the Transparent Service
//!
//! The engine tracks every live connection to a peer exposing the
//! transparent data service, runs the enable/disable handshake on its
//! control characteristics, paces downlink writes by peer credit and
//! buffers uplink notifications until the application reads them.
//!
//! The link stack is reached only through the [`Transport`] trait. Its
//! events are fed back through [`SessionEngine::handle_event`].

pub mod components;
pub mod config;
pub mod conn_table;
pub mod control_path;
pub mod engine;
pub mod error;
pub mod state;
pub mod transport;
pub mod trs_in;
pub mod trs_out;
pub mod trs_proto;
pub mod trs_types;

pub use config::{load_config, EngineConfig};
pub use control_path::ControlPath;
pub use engine::{Listener, SessionEngine};
pub use error::{Result, SessionError};
pub use state::{DownlinkMode, HandshakeStep, Payload, Session, UplinkMode};
pub use transport::{Transport, TransportError};
pub use trs_types::{
    Attribute, CharacteristicRole, ConnHandle, ControlMessage, SessionEvent, TransportEvent,
    WriteRequest,
};
