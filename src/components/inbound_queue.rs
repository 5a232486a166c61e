//! Inbound Queue Component
//!
//! Bounded ring of payloads received on the uplink data characteristic.
//! The capacity equals the credit granted to the peer, so a peer that
//! respects the credit protocol can never overflow it.

use crate::error::{Result, SessionError};

/// One received notification, owned until the application reads it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    data: Vec<u8>,
}

impl Payload {
    /// Copy `bytes` into a freshly allocated buffer.
    /// Allocation failure is reported instead of aborting.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(bytes.len())
            .map_err(|_| SessionError::AllocationFailed)?;
        data.extend_from_slice(bytes);
        Ok(Self { data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

/// Inbound Queue
///
/// `used` is the only source of truth for empty/full; the write position
/// is derived from the read position.
#[derive(Debug)]
pub struct InboundQueue {
    slots: Vec<Option<Payload>>,
    read_index: usize,
    used: usize,
}

impl InboundQueue {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            read_index: 0,
            used: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    pub fn is_full(&self) -> bool {
        self.used >= self.slots.len()
    }

    fn write_index(&self) -> usize {
        (self.read_index + self.used) % self.slots.len()
    }

    /// Append a payload. A full ring hands the payload back.
    pub fn enqueue(&mut self, payload: Payload) -> core::result::Result<(), Payload> {
        if self.is_full() {
            return Err(payload);
        }

        let idx = self.write_index();
        self.slots[idx] = Some(payload);
        self.used += 1;
        Ok(())
    }

    /// Remove the oldest payload
    pub fn dequeue(&mut self) -> Option<Payload> {
        if self.is_empty() {
            return None;
        }

        let payload = self.slots[self.read_index].take();
        self.read_index = (self.read_index + 1) % self.slots.len();
        self.used -= 1;
        payload
    }

    /// Length of the oldest payload, 0 when empty
    pub fn peek_length(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        self.slots[self.read_index].as_ref().map_or(0, Payload::len)
    }

    /// Release every queued payload
    pub fn flush_all(&mut self) {
        while !self.is_empty() {
            self.dequeue();
        }
        self.read_index = 0;
    }
}
