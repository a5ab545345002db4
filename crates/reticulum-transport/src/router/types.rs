//! Router table entries.

use reticulum_core::types::{DestinationHash, IdentityHash};

use super::constants::{LINK_PROOF_TIMEOUT_PER_HOP, LINK_TIMEOUT, REVERSE_TIMEOUT};
use crate::interface::InterfaceId;

/// Where to send the proof of a relayed packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverseEntry {
    /// Interface the original packet arrived on.
    pub receiving_interface: InterfaceId,
    /// Interface it was relayed out of.
    pub outbound_interface: InterfaceId,
    pub timestamp: f64,
}

impl ReverseEntry {
    /// Strict: an entry is still usable at exactly its timeout.
    #[must_use]
    pub fn is_expired(&self, now: f64) -> bool {
        now > self.timestamp + REVERSE_TIMEOUT
    }
}

/// A link relayed through this node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkEntry {
    /// Last activity.
    pub timestamp: f64,
    pub next_hop: IdentityHash,
    pub next_hop_interface: InterfaceId,
    /// Hops between us and the destination.
    pub remaining_hops: u8,
    pub received_interface: InterfaceId,
    /// Hops the request took to reach us.
    pub taken_hops: u8,
    pub destination: DestinationHash,
    /// Set once a valid link proof has passed through.
    pub validated: bool,
    pub proof_timeout: f64,
}

impl LinkEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        now: f64,
        next_hop: IdentityHash,
        next_hop_interface: InterfaceId,
        remaining_hops: u8,
        received_interface: InterfaceId,
        taken_hops: u8,
        destination: DestinationHash,
    ) -> Self {
        Self {
            timestamp: now,
            next_hop,
            next_hop_interface,
            remaining_hops,
            received_interface,
            taken_hops,
            destination,
            validated: false,
            proof_timeout: now + LINK_PROOF_TIMEOUT_PER_HOP * f64::from(remaining_hops.max(1)),
        }
    }

    /// Interface to relay a link packet out of, given where it arrived and
    /// its hop count. `None` when the packet does not belong on this link.
    pub fn forward_interface(&self, arrived_on: InterfaceId, hops: u8) -> Option<InterfaceId> {
        if self.next_hop_interface == self.received_interface {
            // Both directions share one interface; either hop count is valid.
            (arrived_on == self.next_hop_interface
                && (hops == self.remaining_hops || hops == self.taken_hops))
                .then_some(self.next_hop_interface)
        } else if arrived_on == self.next_hop_interface && hops == self.remaining_hops {
            Some(self.received_interface)
        } else if arrived_on == self.received_interface && hops == self.taken_hops {
            Some(self.next_hop_interface)
        } else {
            None
        }
    }

    /// Validated links go stale after [`LINK_TIMEOUT`] of silence,
    /// unvalidated ones when the proof deadline passes.
    pub fn is_stale(&self, now: f64) -> bool {
        if self.validated {
            now > self.timestamp + LINK_TIMEOUT
        } else {
            now > self.proof_timeout
        }
    }
}
