//! Announce retransmission table.

use std::collections::HashMap;

use reticulum_core::packet::wire::RawPacket;
use reticulum_core::types::{DestinationHash, IdentityHash};

use super::constants::{LOCAL_REBROADCASTS_MAX, PATHFINDER_G, PATHFINDER_R, PATHFINDER_RW};
use crate::interface::InterfaceId;

/// Work the engine must do for a pending announce.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnounceAction {
    /// Rebuild the announce under our transport id and send it.
    Retransmit {
        destination: DestinationHash,
        packet: RawPacket,
        hops: u8,
        /// Send with the path-response context.
        path_response: bool,
        attached_interface: Option<InterfaceId>,
    },
    /// Retransmission finished; the entry is gone.
    Completed { destination: DestinationHash },
}

/// An announce waiting to be rebroadcast.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnounceEntry {
    /// When the announce was received.
    pub timestamp: f64,
    /// No retransmission before this time.
    pub retransmit_timeout: f64,
    pub retries: u32,
    /// Transport id of the relay we heard it from, or the destination itself.
    pub received_from: IdentityHash,
    pub hops: u8,
    pub packet: RawPacket,
    /// Times a neighbour was heard rebroadcasting it.
    pub local_rebroadcasts: u32,
    /// Retransmit as a path response, which nobody rebroadcasts.
    pub block_rebroadcasts: bool,
    /// Send only on this interface.
    pub attached_interface: Option<InterfaceId>,
}

impl AnnounceEntry {
    /// Entry for a freshly accepted announce. `jitter` in `[0, 1)` spreads
    /// rebroadcasts over [`PATHFINDER_RW`].
    pub fn new(
        now: f64,
        jitter: f64,
        received_from: IdentityHash,
        hops: u8,
        packet: RawPacket,
    ) -> Self {
        Self {
            timestamp: now,
            retransmit_timeout: now + jitter * PATHFINDER_RW,
            retries: 0,
            received_from,
            hops,
            packet,
            local_rebroadcasts: 0,
            block_rebroadcasts: false,
            attached_interface: None,
        }
    }

    /// Both retry budgets are checked: neighbours already covering it, or
    /// our own retransmissions exhausted.
    pub fn is_complete(&self) -> bool {
        (self.retries > 0 && self.retries >= LOCAL_REBROADCASTS_MAX) || self.retries > PATHFINDER_R
    }
}

/// Announces awaiting retransmission, plus entries held aside while a path
/// response for the same destination is in flight.
#[derive(Debug, Default)]
pub struct AnnounceTable {
    entries: HashMap<DestinationHash, AnnounceEntry>,
    held: HashMap<DestinationHash, AnnounceEntry>,
}

impl AnnounceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, destination: DestinationHash, entry: AnnounceEntry) {
        self.entries.insert(destination, entry);
    }

    pub fn get(&self, destination: &DestinationHash) -> Option<&AnnounceEntry> {
        self.entries.get(destination)
    }

    pub fn get_mut(&mut self, destination: &DestinationHash) -> Option<&mut AnnounceEntry> {
        self.entries.get_mut(destination)
    }

    pub fn remove(&mut self, destination: &DestinationHash) -> Option<AnnounceEntry> {
        self.entries.remove(destination)
    }

    pub fn contains(&self, destination: &DestinationHash) -> bool {
        self.entries.contains_key(destination)
    }

    /// Park the current entry for `destination`, if any, so a path response
    /// can take its slot. It comes back after the response is sent.
    pub fn hold(&mut self, destination: DestinationHash) -> bool {
        match self.entries.remove(&destination) {
            Some(entry) => {
                self.held.insert(destination, entry);
                true
            }
            None => false,
        }
    }

    pub fn held(&self, destination: &DestinationHash) -> Option<&AnnounceEntry> {
        self.held.get(destination)
    }

    pub fn held_len(&self) -> usize {
        self.held.len()
    }

    /// Drop finished entries and schedule due retransmissions.
    ///
    /// A retransmitted entry moves its deadline to `now + PATHFINDER_G +
    /// jitter * PATHFINDER_RW`, drawing one `jitter` in `[0, 1)` per entry.
    /// Any held entry for the same destination replaces it right after.
    pub fn process(&mut self, now: f64, mut jitter: impl FnMut() -> f64) -> Vec<AnnounceAction> {
        let mut actions = Vec::new();
        let mut completed = Vec::new();
        let mut sent = Vec::new();

        for (dest, entry) in &mut self.entries {
            if entry.is_complete() {
                completed.push(*dest);
                continue;
            }
            if now > entry.retransmit_timeout {
                entry.retransmit_timeout = now + PATHFINDER_G + jitter() * PATHFINDER_RW;
                entry.retries += 1;
                actions.push(AnnounceAction::Retransmit {
                    destination: *dest,
                    packet: entry.packet.clone(),
                    hops: entry.hops,
                    path_response: entry.block_rebroadcasts,
                    attached_interface: entry.attached_interface,
                });
                sent.push(*dest);
            }
        }

        for dest in sent {
            if let Some(held) = self.held.remove(&dest) {
                self.entries.insert(dest, held);
            }
        }

        for dest in completed {
            self.entries.remove(&dest);
            actions.push(AnnounceAction::Completed { destination: dest });
        }

        actions
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DestinationHash, &AnnounceEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use reticulum_core::constants::{DestinationType, PacketType, PropagationType};
    use reticulum_core::packet::context::ContextType;
    use reticulum_core::packet::flags::PacketFlags;

    fn make_dest(seed: u8) -> DestinationHash {
        DestinationHash::new([seed; 16])
    }

    fn packet(dest: DestinationHash) -> RawPacket {
        RawPacket {
            flags: PacketFlags::header1(
                PropagationType::Broadcast,
                DestinationType::Single,
                PacketType::Announce,
            ),
            hops: 1,
            transport_id: None,
            destination: dest,
            context: ContextType::None,
            data: Bytes::from_static(&[0x01, 0x02]),
        }
    }

    fn entry(now: f64, jitter: f64, seed: u8) -> AnnounceEntry {
        AnnounceEntry::new(now, jitter, IdentityHash::new([seed; 16]), 1, packet(make_dest(seed)))
    }

    fn retransmits(actions: &[AnnounceAction]) -> usize {
        actions
            .iter()
            .filter(|a| matches!(a, AnnounceAction::Retransmit { .. }))
            .count()
    }

    #[test]
    fn jitter_sets_first_deadline() {
        let e = entry(1000.0, 0.5, 1);
        assert_eq!(e.retransmit_timeout, 1000.25);
        assert_eq!(e.retries, 0);
    }

    #[test]
    fn retransmits_only_after_deadline() {
        let mut table = AnnounceTable::new();
        table.insert(make_dest(1), entry(1000.0, 0.5, 1));

        assert_eq!(retransmits(&table.process(1000.1, || 1.0)), 0);
        assert_eq!(retransmits(&table.process(1000.3, || 1.0)), 1);

        let e = table.get(&make_dest(1)).unwrap();
        assert_eq!(e.retries, 1);
        assert_eq!(e.retransmit_timeout, 1000.3 + PATHFINDER_G + PATHFINDER_RW);
    }

    #[test]
    fn retransmit_deadline_is_jittered() {
        let mut table = AnnounceTable::new();
        table.insert(make_dest(1), entry(0.0, 0.0, 1));
        table.insert(make_dest(2), entry(0.0, 0.0, 1));

        let mut samples = [0.0, 0.5].into_iter();
        let actions = table.process(1.0, || samples.next().unwrap_or(1.0));
        assert_eq!(retransmits(&actions), 2);

        let mut deadlines: Vec<f64> = table.iter().map(|(_, e)| e.retransmit_timeout).collect();
        deadlines.sort_by(f64::total_cmp);
        assert_eq!(deadlines, vec![1.0 + PATHFINDER_G, 1.0 + PATHFINDER_G + 0.25]);
    }

    #[test]
    fn retry_ceiling_bounds_retransmissions() {
        let mut table = AnnounceTable::new();
        table.insert(make_dest(1), entry(0.0, 0.0, 1));

        let mut sent = 0;
        let mut now = 0.0;
        while !table.is_empty() {
            now += 1.0;
            sent += retransmits(&table.process(now, || 1.0));
            assert!(now < 1000.0);
        }
        assert_eq!(sent as u32, PATHFINDER_R + 1);
    }

    #[test]
    fn completes_when_retries_reach_local_rebroadcast_max() {
        let mut table = AnnounceTable::new();
        let mut e = entry(0.0, 0.0, 1);
        e.retries = LOCAL_REBROADCASTS_MAX;
        table.insert(make_dest(1), e);

        let actions = table.process(10.0, || 1.0);
        assert_eq!(
            actions,
            vec![AnnounceAction::Completed {
                destination: make_dest(1)
            }]
        );
        assert!(!table.contains(&make_dest(1)));
    }

    #[test]
    fn block_rebroadcasts_turns_into_path_response() {
        let mut table = AnnounceTable::new();
        let mut e = entry(0.0, 0.0, 1);
        e.block_rebroadcasts = true;
        e.attached_interface = Some(InterfaceId(3));
        table.insert(make_dest(1), e);

        let actions = table.process(1.0, || 1.0);
        assert!(matches!(
            actions.as_slice(),
            [AnnounceAction::Retransmit {
                path_response: true,
                attached_interface: Some(InterfaceId(3)),
                ..
            }]
        ));
    }

    #[test]
    fn held_entry_restored_after_retransmit() {
        let mut table = AnnounceTable::new();
        let original = entry(0.0, 0.9, 1);
        table.insert(make_dest(1), original.clone());
        assert!(table.hold(make_dest(1)));
        assert!(!table.contains(&make_dest(1)));

        let mut response = entry(5.0, 0.0, 2);
        response.block_rebroadcasts = true;
        table.insert(make_dest(1), response);

        assert_eq!(retransmits(&table.process(6.0, || 1.0)), 1);
        assert_eq!(table.get(&make_dest(1)), Some(&original));
        assert_eq!(table.held_len(), 0);
    }

    #[test]
    fn hold_without_entry_is_noop() {
        let mut table = AnnounceTable::new();
        assert!(!table.hold(make_dest(9)));
        assert!(table.held(&make_dest(9)).is_none());
    }
}
