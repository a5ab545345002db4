//! Path table for destination routing.

use std::collections::HashMap;

use reticulum_core::types::{DestinationHash, IdentityHash};

use super::constants::PATHFINDER_M;
use super::types::{PathEntry, PathState};
use crate::interface::{InterfaceId, InterfaceRegistry};

/// Path table mapping destination hashes to path entries.
#[must_use]
#[derive(Debug, Default)]
pub struct PathTable {
    entries: HashMap<DestinationHash, PathEntry>,
    states: HashMap<DestinationHash, PathState>,
    max_size: Option<usize>,
}

impl PathTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table that evicts its oldest entries beyond `max_size`.
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            max_size: Some(max_size),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn get(&self, dest: &DestinationHash) -> Option<&PathEntry> {
        self.entries.get(dest)
    }

    pub fn get_mut(&mut self, dest: &DestinationHash) -> Option<&mut PathEntry> {
        self.entries.get_mut(dest)
    }

    /// Whether a non-expired path exists.
    #[must_use]
    pub fn has_path(&self, dest: &DestinationHash, now: f64) -> bool {
        self.valid(dest, now).is_some()
    }

    fn valid(&self, dest: &DestinationHash, now: f64) -> Option<&PathEntry> {
        self.entries.get(dest).filter(|e| !e.is_expired(now))
    }

    /// Hop count to a destination, or [`PATHFINDER_M`] if unknown.
    #[must_use]
    pub fn hops_to(&self, dest: &DestinationHash, now: f64) -> u8 {
        self.valid(dest, now).map_or(PATHFINDER_M, |e| e.hops)
    }

    #[must_use]
    pub fn next_hop(&self, dest: &DestinationHash, now: f64) -> Option<IdentityHash> {
        self.valid(dest, now).map(|e| e.next_hop)
    }

    #[must_use]
    pub fn next_hop_interface(&self, dest: &DestinationHash, now: f64) -> Option<InterfaceId> {
        self.valid(dest, now).map(|e| e.receiving_interface)
    }

    /// Insert or replace, then enforce the size cap. Returns evicted entries.
    pub fn insert(&mut self, dest: DestinationHash, entry: PathEntry) -> Vec<(DestinationHash, PathEntry)> {
        self.entries.insert(dest, entry);
        self.enforce_size_limit()
    }

    /// Force-expire a path. Returns true if the path existed.
    pub fn expire_path(&mut self, dest: &DestinationHash) -> bool {
        match self.entries.get_mut(dest) {
            Some(entry) => {
                entry.expire();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, dest: &DestinationHash) -> Option<PathEntry> {
        self.entries.remove(dest)
    }

    /// Present regardless of expiry.
    #[must_use]
    pub fn contains(&self, dest: &DestinationHash) -> bool {
        self.entries.contains_key(dest)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DestinationHash, &PathEntry)> {
        self.entries.iter()
    }

    /// Remove entries past their mode TTL or whose interface is gone.
    ///
    /// TTL is measured from the last refresh, so a path in active use
    /// outlives its announce.
    pub fn cull(&mut self, now: f64, interfaces: &InterfaceRegistry) -> Vec<(DestinationHash, PathEntry)> {
        let stale: Vec<DestinationHash> = self
            .entries
            .iter()
            .filter(|(_, entry)| match interfaces.get(entry.receiving_interface) {
                Some(state) => now > entry.timestamp + state.info.mode.path_ttl(),
                None => true,
            })
            .map(|(dest, _)| *dest)
            .collect();
        stale
            .into_iter()
            .filter_map(|dest| self.entries.remove(&dest).map(|e| (dest, e)))
            .collect()
    }

    /// Drop the oldest entries by timestamp until the cap holds.
    pub fn enforce_size_limit(&mut self) -> Vec<(DestinationHash, PathEntry)> {
        let Some(max) = self.max_size else {
            return Vec::new();
        };
        if self.entries.len() <= max {
            return Vec::new();
        }
        let mut by_age: Vec<(DestinationHash, f64)> =
            self.entries.iter().map(|(d, e)| (*d, e.timestamp)).collect();
        by_age.sort_by(|a, b| a.1.total_cmp(&b.1));
        let excess = self.entries.len() - max;
        by_age
            .into_iter()
            .take(excess)
            .filter_map(|(dest, _)| self.entries.remove(&dest).map(|e| (dest, e)))
            .collect()
    }

    pub fn set_max_size(&mut self, max_size: Option<usize>) {
        self.max_size = max_size;
    }

    // Path responsiveness

    pub fn state(&self, dest: &DestinationHash) -> PathState {
        self.states.get(dest).copied().unwrap_or_default()
    }

    pub fn set_state(&mut self, dest: DestinationHash, state: PathState) {
        self.states.insert(dest, state);
    }

    pub fn is_unresponsive(&self, dest: &DestinationHash) -> bool {
        self.state(dest) == PathState::Unresponsive
    }

    /// Forget states for destinations no longer in the table.
    pub fn cull_states(&mut self) -> usize {
        let before = self.states.len();
        let entries = &self.entries;
        self.states.retain(|dest, _| entries.contains_key(dest));
        before - self.states.len()
    }
}
