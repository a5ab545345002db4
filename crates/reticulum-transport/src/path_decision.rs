//! Pure functions for path table update decisions.
//!
//! Keeps the replacement rules for inbound announces out of the engine so
//! they can be tested on their own.

use reticulum_core::packet::wire::RawPacket;
use reticulum_core::types::{IdentityHash, RandomBlob};

use crate::path::types::PathEntry;

/// The outcome of evaluating an announce against the path table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathUpdateDecision {
    /// No entry yet.
    InsertNew,
    /// Replace the existing entry.
    Replace,
    /// Keep the existing entry and ignore the announce.
    Reject,
}

impl PathUpdateDecision {
    pub fn accepts(self) -> bool {
        self != PathUpdateDecision::Reject
    }
}

/// An announce as seen by the decision rules.
#[derive(Debug, Clone, Copy)]
pub struct AnnounceCandidate {
    pub hops: u8,
    pub random_blob: RandomBlob,
}

/// Decide whether an announce should update the path table.
///
/// * no entry: insert;
/// * equal or fewer hops: replace iff the blob is unseen;
/// * more hops and the entry has expired (`now >= expires`): replace iff
///   the blob is unseen;
/// * more hops, unexpired: replace iff the blob is unseen and the current
///   path is marked unresponsive.
///
/// A live path is never lengthened by a fresher announce, so the table
/// settles on the shortest path whatever order announces arrive in.
#[must_use]
pub fn decide_path_update(
    existing: Option<&PathEntry>,
    candidate: &AnnounceCandidate,
    now: f64,
    path_unresponsive: bool,
) -> PathUpdateDecision {
    let Some(entry) = existing else {
        return PathUpdateDecision::InsertNew;
    };
    let unseen = !entry.has_random_blob(&candidate.random_blob);
    let accept = if candidate.hops <= entry.hops {
        unseen
    } else if now >= entry.expires {
        unseen
    } else {
        unseen && path_unresponsive
    };
    if accept {
        PathUpdateDecision::Replace
    } else {
        PathUpdateDecision::Reject
    }
}

/// Next hop for a path learned from `packet`: the relay that inserted its
/// transport id, or the announcing destination when heard directly.
pub fn compute_announce_next_hop(packet: &RawPacket) -> IdentityHash {
    packet
        .transport_id
        .unwrap_or_else(|| packet.destination.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::{InterfaceId, InterfaceMode};
    use bytes::Bytes;
    use reticulum_core::constants::{DestinationType, HeaderType, PacketType, PropagationType};
    use reticulum_core::packet::context::ContextType;
    use reticulum_core::packet::flags::PacketFlags;
    use reticulum_core::types::{DestinationHash, PacketHash};

    fn blob(seed: u8, emitted: u64) -> RandomBlob {
        RandomBlob::from_parts([seed; 5], emitted)
    }

    fn make_entry(hops: u8, timestamp: f64, blobs: Vec<RandomBlob>) -> PathEntry {
        PathEntry::new(
            timestamp,
            IdentityHash::new([0u8; 16]),
            hops,
            InterfaceMode::Full,
            blobs,
            InterfaceId(1),
            PacketHash::new([0u8; 32]),
        )
    }

    fn cand(hops: u8, random_blob: RandomBlob) -> AnnounceCandidate {
        AnnounceCandidate { hops, random_blob }
    }

    #[test]
    fn new_destination_inserts() {
        let d = decide_path_update(None, &cand(3, blob(1, 5)), 1000.0, false);
        assert_eq!(d, PathUpdateDecision::InsertNew);
    }

    #[test]
    fn fewer_or_equal_hops_with_new_blob_replaces() {
        let entry = make_entry(3, 1000.0, vec![blob(1, 100)]);
        assert_eq!(
            decide_path_update(Some(&entry), &cand(2, blob(2, 100)), 1001.0, false),
            PathUpdateDecision::Replace
        );
        assert_eq!(
            decide_path_update(Some(&entry), &cand(3, blob(2, 100)), 1001.0, false),
            PathUpdateDecision::Replace
        );
    }

    #[test]
    fn replayed_blob_is_rejected_even_with_better_hops() {
        let entry = make_entry(5, 1000.0, vec![blob(0xAA, 100)]);
        assert_eq!(
            decide_path_update(Some(&entry), &cand(1, blob(0xAA, 100)), 1001.0, false),
            PathUpdateDecision::Reject
        );
    }

    #[test]
    fn more_hops_rejected_while_path_live() {
        let entry = make_entry(1, 1000.0, vec![blob(1, 100)]);
        assert_eq!(
            decide_path_update(Some(&entry), &cand(3, blob(2, 100)), 1001.0, false),
            PathUpdateDecision::Reject
        );
    }

    #[test]
    fn more_hops_replaces_unresponsive_path() {
        let entry = make_entry(1, 1000.0, vec![blob(1, 100)]);
        assert_eq!(
            decide_path_update(Some(&entry), &cand(3, blob(2, 100)), 1001.0, true),
            PathUpdateDecision::Replace
        );
    }

    #[test]
    fn more_hops_newer_emission_does_not_replace_live_path() {
        let entry = make_entry(1, 1000.0, vec![blob(1, 100)]);
        assert_eq!(
            decide_path_update(Some(&entry), &cand(3, blob(2, 101)), 1001.0, false),
            PathUpdateDecision::Reject
        );
    }

    #[test]
    fn unresponsive_path_still_rejects_replayed_blob() {
        let entry = make_entry(1, 1000.0, vec![blob(1, 100)]);
        assert_eq!(
            decide_path_update(Some(&entry), &cand(3, blob(1, 100)), 1001.0, true),
            PathUpdateDecision::Reject
        );
        assert_eq!(
            decide_path_update(Some(&entry), &cand(3, blob(2, 99)), 1001.0, true),
            PathUpdateDecision::Replace
        );
    }

    #[test]
    fn more_hops_on_expired_entry_replaces_at_boundary() {
        // Full mode: expires = 1000 + 604800
        let entry = make_entry(2, 1000.0, vec![blob(1, 100)]);
        let expires = entry.expires;
        assert_eq!(
            decide_path_update(Some(&entry), &cand(5, blob(2, 1)), expires - 1.0, false),
            PathUpdateDecision::Reject
        );
        assert_eq!(
            decide_path_update(Some(&entry), &cand(5, blob(2, 1)), expires, false),
            PathUpdateDecision::Replace
        );
        assert_eq!(
            decide_path_update(Some(&entry), &cand(5, blob(1, 100)), expires, false),
            PathUpdateDecision::Reject
        );
    }

    fn announce_packet(transport_id: Option<IdentityHash>) -> RawPacket {
        RawPacket {
            flags: PacketFlags {
                ifac: false,
                header_type: if transport_id.is_some() {
                    HeaderType::Header2
                } else {
                    HeaderType::Header1
                },
                propagation_type: PropagationType::Broadcast,
                destination_type: DestinationType::Single,
                packet_type: PacketType::Announce,
            },
            hops: 1,
            transport_id,
            destination: DestinationHash::new([0xDD; 16]),
            context: ContextType::None,
            data: Bytes::new(),
        }
    }

    #[test]
    fn next_hop_with_transport_id() {
        let tid = IdentityHash::new([0xBB; 16]);
        assert_eq!(compute_announce_next_hop(&announce_packet(Some(tid))), tid);
    }

    #[test]
    fn next_hop_without_transport_id_is_destination() {
        let nh = compute_announce_next_hop(&announce_packet(None));
        assert_eq!(nh.as_ref(), &[0xDD; 16]);
    }
}
