//! Transport collaborator contract
//!
//! The engine never touches the link stack directly. Writes go out through
//! [`Transport`] and only report whether the stack accepted them; the
//! outcome arrives later as a [`TransportEvent`](crate::trs_types::TransportEvent).

use thiserror::Error;

use crate::trs_types::{CharacteristicRole, ConnHandle};

/// Immediate rejection of a write by the transport
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The stack cannot take another request right now; a `TransportReady`
    /// event follows once it can
    #[error("transport busy")]
    Busy,

    #[error("transport out of memory")]
    OutOfMemory,

    #[error("transport rejected write: {0:#06x}")]
    Rejected(u16),
}

pub trait Transport {
    fn write(
        &mut self,
        conn: ConnHandle,
        role: CharacteristicRole,
        value: &[u8],
        with_response: bool,
    ) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(
        &mut self,
        conn: ConnHandle,
        role: CharacteristicRole,
        value: &[u8],
        with_response: bool,
    ) -> Result<(), TransportError> {
        (**self).write(conn, role, value, with_response)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(
        &mut self,
        conn: ConnHandle,
        role: CharacteristicRole,
        value: &[u8],
        with_response: bool,
    ) -> Result<(), TransportError> {
        (**self).write(conn, role, value, with_response)
    }
}
