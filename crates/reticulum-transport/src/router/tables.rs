//! Reverse table and link table.

use std::collections::HashMap;

use reticulum_core::types::{LinkId, TruncatedHash};

use super::types::{LinkEntry, ReverseEntry};
use crate::interface::InterfaceRegistry;

/// Routes proofs back to the originator of a relayed packet.
///
/// Keyed by the truncated hash of the relayed packet, which is also the
/// address its proof is sent to.
#[derive(Debug, Default)]
pub struct ReverseTable {
    entries: HashMap<TruncatedHash, ReverseEntry>,
}

impl ReverseTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: TruncatedHash, entry: ReverseEntry) {
        self.entries.insert(key, entry);
    }

    /// Look up and remove; a reverse entry serves one proof.
    pub fn take(&mut self, key: &TruncatedHash) -> Option<ReverseEntry> {
        self.entries.remove(key)
    }

    #[must_use]
    pub fn get(&self, key: &TruncatedHash) -> Option<&ReverseEntry> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &TruncatedHash) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove expired entries and entries whose interfaces are gone.
    pub fn cull(&mut self, now: f64, interfaces: &InterfaceRegistry) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            !entry.is_expired(now)
                && interfaces.contains(entry.receiving_interface)
                && interfaces.contains(entry.outbound_interface)
        });
        before - self.entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Links relayed through this node, keyed by link id.
#[derive(Debug, Default)]
pub struct LinkTable {
    entries: HashMap<LinkId, LinkEntry>,
}

impl LinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, link_id: LinkId, entry: LinkEntry) {
        self.entries.insert(link_id, entry);
    }

    #[must_use]
    pub fn get(&self, link_id: &LinkId) -> Option<&LinkEntry> {
        self.entries.get(link_id)
    }

    pub fn get_mut(&mut self, link_id: &LinkId) -> Option<&mut LinkEntry> {
        self.entries.get_mut(link_id)
    }

    pub fn remove(&mut self, link_id: &LinkId) -> Option<LinkEntry> {
        self.entries.remove(link_id)
    }

    #[must_use]
    pub fn contains(&self, link_id: &LinkId) -> bool {
        self.entries.contains_key(link_id)
    }

    /// Remove and return stale entries, and entries whose interfaces are
    /// gone. The caller decides whether a failed link warrants rediscovery.
    pub fn drain_stale(
        &mut self,
        now: f64,
        interfaces: &InterfaceRegistry,
    ) -> Vec<(LinkId, LinkEntry)> {
        let stale: Vec<LinkId> = self
            .entries
            .iter()
            .filter(|(_, e)| {
                e.is_stale(now)
                    || !interfaces.contains(e.next_hop_interface)
                    || !interfaces.contains(e.received_interface)
            })
            .map(|(id, _)| *id)
            .collect();
        stale
            .into_iter()
            .filter_map(|id| self.entries.remove(&id).map(|e| (id, e)))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LinkId, &LinkEntry)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
