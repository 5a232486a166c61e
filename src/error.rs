//! Error types for the session engine.

use thiserror::Error;

use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unknown connection handle")]
    NotFound,

    #[error("operation not valid in the current session state")]
    BadState,

    #[error("no credit or transport busy")]
    Busy,

    #[error("payload exceeds the negotiated MTU")]
    TooLarge,

    #[error("no direction requested")]
    InvalidRequest,

    #[error("invalid parameter")]
    InvalidParameter,

    #[error("allocation failed")]
    AllocationFailed,

    #[error("no queued data")]
    Empty,

    #[error("connection table full")]
    TableFull,

    #[error("transport rejected the write: {0:#06x}")]
    Rejected(u16),

    #[error("Config: {0}")]
    InvalidConfig(String),

    #[error("Config IO: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("Config parse: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl From<TransportError> for SessionError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Busy => Self::Busy,
            TransportError::OutOfMemory => Self::AllocationFailed,
            TransportError::Rejected(code) => Self::Rejected(code),
        }
    }
}

pub type Result<T> = core::result::Result<T, SessionError>;
