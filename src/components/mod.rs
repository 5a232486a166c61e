//! Session State Components
//!
//! Per-connection state split into disjoint components:
//! 1. Credit - downlink/uplink credit accounting
//! 2. Inbound Queue - received payloads awaiting the application
//! 3. Retry - handshake step to replay once the transport is ready

mod credit;
mod inbound_queue;
mod retry;

pub use credit::CreditState;
pub use inbound_queue::{InboundQueue, Payload};
pub use retry::RetryState;
