//! Connection Table
//!
//! Fixed-capacity arena of session slots, looked up by connection handle.
//! Slots are reused; a slot's index never changes.

use log::info;

use crate::config::EngineConfig;
use crate::error::{Result, SessionError};
use crate::state::Session;
use crate::trs_types::ConnHandle;

pub struct ConnectionTable {
    slots: Vec<Session>,
}

impl ConnectionTable {
    pub fn new(config: &EngineConfig) -> Self {
        let slots = (0..config.max_connections)
            .map(|i| Session::new(i, config))
            .collect();
        Self { slots }
    }

    /// Claim a free slot for `handle`
    pub fn allocate(&mut self, handle: ConnHandle) -> Result<&mut Session> {
        if handle == 0 {
            return Err(SessionError::InvalidParameter);
        }

        let session = self
            .slots
            .iter_mut()
            .find(|s| s.is_free())
            .ok_or(SessionError::TableFull)?;
        session.conn_handle = handle;
        info!("conn {:#06x}: allocated slot {}", handle, session.slot_index);
        Ok(session)
    }

    pub fn lookup(&self, handle: ConnHandle) -> Option<&Session> {
        if handle == 0 {
            return None;
        }
        self.slots.iter().find(|s| s.conn_handle == handle)
    }

    pub fn lookup_mut(&mut self, handle: ConnHandle) -> Option<&mut Session> {
        if handle == 0 {
            return None;
        }
        self.slots.iter_mut().find(|s| s.conn_handle == handle)
    }

    /// Reset the slot to defaults, flushing its queue
    pub fn release(&mut self, handle: ConnHandle) -> Result<()> {
        let session = self.lookup_mut(handle).ok_or(SessionError::NotFound)?;
        let slot = session.slot_index;
        session.reset();
        info!("conn {:#06x}: released slot {}", handle, slot);
        Ok(())
    }

    pub fn active(&self) -> impl Iterator<Item = &Session> {
        self.slots.iter().filter(|s| !s.is_free())
    }

    pub fn active_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.slots.iter_mut().filter(|s| !s.is_free())
    }

    /// Whether any live connection holds return-eligible peer credit
    pub fn any_return_pending(&self) -> bool {
        self.active().any(|s| s.credit.return_due())
    }
}
