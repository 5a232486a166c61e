//! Retry Coordinator Component
//!
//! Remembers which handshake write the transport refused as busy, so it
//! can be reissued once the transport reports it is ready again.

use crate::state::HandshakeStep;

#[derive(Debug, Default, Clone)]
pub struct RetryState {
    pending: Option<HandshakeStep>,
}

impl RetryState {
    pub fn new() -> Self {
        Self { pending: None }
    }

    /// Record `step` for replay. A later arm replaces an earlier one.
    pub fn arm(&mut self, step: HandshakeStep) {
        self.pending = Some(step);
    }

    /// Take the pending step, leaving nothing armed
    pub fn take(&mut self) -> Option<HandshakeStep> {
        self.pending.take()
    }

    pub fn pending(&self) -> Option<HandshakeStep> {
        self.pending
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_clears() {
        let mut retry = RetryState::new();
        assert_eq!(retry.pending(), None);

        retry.arm(HandshakeStep::EnablingDownlinkCredit);
        assert_eq!(retry.pending(), Some(HandshakeStep::EnablingDownlinkCredit));
        assert_eq!(retry.take(), Some(HandshakeStep::EnablingDownlinkCredit));
        assert_eq!(retry.take(), None);
    }
}
