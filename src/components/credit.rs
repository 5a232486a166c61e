//! Credit Accountant Component
//!
//! Tracks how many writes we may still push to the peer (local credit) and
//! how many consumed payloads we owe the peer a report for (peer credit).

use crate::state::DownlinkMode;

/// Credit State
///
/// Pure bookkeeping for one connection. Writes that carry credit reports
/// are issued by the TX path; this component only decides when.
#[derive(Debug, Clone)]
pub struct CreditState {
    /* Downlink: granted by the peer */
    pub local_credit: u8,     // Sends left before the peer must replenish

    /* Uplink: granted by us */
    pub peer_credit: u8,      // Consumed payloads not yet reported back

    /* Protocol constants, fixed per engine */
    pub initial_credit: u8,
    pub return_threshold: u8,
}

impl CreditState {
    pub fn new(initial_credit: u8, return_threshold: u8) -> Self {
        Self {
            local_credit: 0,
            peer_credit: 0,
            initial_credit,
            return_threshold,
        }
    }

    // ------------------------------------------------------------------------
    // Downlink (outbound)
    // ------------------------------------------------------------------------

    /// Whether this connection's own credit allows another send.
    /// The transport-wide return check is done by the caller.
    pub fn can_send(&self, downlink: DownlinkMode) -> bool {
        !(downlink == DownlinkMode::CreditControlled && self.local_credit == 0)
    }

    /// A data write was accepted by the transport
    pub fn on_send_accepted(&mut self, downlink: DownlinkMode) {
        if downlink == DownlinkMode::CreditControlled {
            self.local_credit = self.local_credit.saturating_sub(1);
        }
    }

    /// Peer granted `granted` more sends
    pub fn on_credit_grant_received(&mut self, granted: u8) {
        self.local_credit = self.local_credit.saturating_add(granted);
    }

    // ------------------------------------------------------------------------
    // Uplink (inbound)
    // ------------------------------------------------------------------------

    /// Application consumed one payload.
    /// Returns true when a credit return is due.
    pub fn on_payload_delivered(&mut self) -> bool {
        self.peer_credit = self.peer_credit.saturating_add(1);
        self.return_due()
    }

    pub fn return_due(&self) -> bool {
        self.peer_credit >= self.return_threshold
    }

    /// Uplink just became credit controlled: the whole initial grant is owed
    pub fn seed_peer_credit(&mut self) {
        self.peer_credit = self.initial_credit;
    }

    /// A credit return carrying `peer_credit` was accepted by the transport
    pub fn on_credit_returned(&mut self) {
        self.peer_credit = 0;
    }

    /// Uplink disabled
    pub fn reset_uplink(&mut self) {
        self.peer_credit = 0;
    }

    pub fn reset(&mut self) {
        self.local_credit = 0;
        self.peer_credit = 0;
    }
}
