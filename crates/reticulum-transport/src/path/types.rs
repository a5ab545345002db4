//! Path table types.

use std::collections::VecDeque;

use reticulum_core::types::{IdentityHash, PacketHash, RandomBlob};

use super::constants::MAX_RANDOM_BLOBS;
use crate::interface::{InterfaceId, InterfaceMode};

/// Responsiveness of a path, as observed by link establishment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathState {
    #[default]
    Unknown,
    Unresponsive,
    Responsive,
}

/// A single entry in the path table.
#[derive(Debug, Clone, PartialEq)]
pub struct PathEntry {
    /// When the path was learned or last used.
    pub timestamp: f64,
    /// Transport id of the next relay, or the destination itself when it
    /// is a direct neighbour.
    pub next_hop: IdentityHash,
    pub hops: u8,
    pub expires: f64,
    random_blobs: VecDeque<RandomBlob>,
    pub receiving_interface: InterfaceId,
    /// Hash of the announce backing this path, for the packet cache.
    pub packet_hash: PacketHash,
}

impl PathEntry {
    /// Entry whose expiry follows from the receiving interface's mode.
    pub fn new(
        timestamp: f64,
        next_hop: IdentityHash,
        hops: u8,
        mode: InterfaceMode,
        random_blobs: impl IntoIterator<Item = RandomBlob>,
        receiving_interface: InterfaceId,
        packet_hash: PacketHash,
    ) -> Self {
        let mut entry = Self {
            timestamp,
            next_hop,
            hops,
            expires: timestamp + mode.path_ttl(),
            random_blobs: VecDeque::new(),
            receiving_interface,
            packet_hash,
        };
        for blob in random_blobs {
            entry.add_random_blob(blob);
        }
        entry
    }

    /// Entry restored from storage, with an explicit expiry.
    #[allow(clippy::too_many_arguments)]
    pub fn from_raw(
        timestamp: f64,
        next_hop: IdentityHash,
        hops: u8,
        expires: f64,
        random_blobs: Vec<RandomBlob>,
        receiving_interface: InterfaceId,
        packet_hash: PacketHash,
    ) -> Self {
        Self {
            timestamp,
            next_hop,
            hops,
            expires,
            random_blobs: random_blobs.into(),
            receiving_interface,
            packet_hash,
        }
    }

    pub fn random_blobs(&self) -> &VecDeque<RandomBlob> {
        &self.random_blobs
    }

    pub fn random_blobs_to_vec(&self) -> Vec<RandomBlob> {
        self.random_blobs.iter().copied().collect()
    }

    /// Strict: a path is still valid at the instant it expires.
    pub fn is_expired(&self, now: f64) -> bool {
        now > self.expires
    }

    /// Mark for removal at the next cull.
    pub fn expire(&mut self) {
        self.timestamp = 0.0;
        self.expires = 0.0;
    }

    /// Refresh on use, extending the TTL.
    pub fn refresh_timestamp(&mut self, now: f64, mode: InterfaceMode) {
        self.timestamp = now;
        self.expires = now + mode.path_ttl();
    }

    pub fn has_random_blob(&self, blob: &RandomBlob) -> bool {
        self.random_blobs.contains(blob)
    }

    /// Remember a blob, dropping the oldest past [`MAX_RANDOM_BLOBS`].
    pub fn add_random_blob(&mut self, blob: RandomBlob) {
        if self.has_random_blob(&blob) {
            return;
        }
        if self.random_blobs.len() >= MAX_RANDOM_BLOBS {
            self.random_blobs.pop_front();
        }
        self.random_blobs.push_back(blob);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(seed: u8, emitted: u64) -> RandomBlob {
        RandomBlob::from_parts([seed; 5], emitted)
    }

    fn entry() -> PathEntry {
        PathEntry::new(
            1000.0,
            IdentityHash::new([0xAA; 16]),
            2,
            InterfaceMode::Full,
            [blob(1, 10)],
            InterfaceId(0),
            PacketHash::new([0xBB; 32]),
        )
    }

    #[test]
    fn expiry_follows_mode() {
        let e = PathEntry::new(
            100.0,
            IdentityHash::new([0; 16]),
            1,
            InterfaceMode::Roaming,
            [],
            InterfaceId(0),
            PacketHash::new([0; 32]),
        );
        assert_eq!(e.expires, 100.0 + 21_600.0);
    }

    #[test]
    fn expiry_is_strict() {
        let mut e = entry();
        e.expires = 2000.0;
        assert!(!e.is_expired(2000.0));
        assert!(e.is_expired(2000.5));
        e.expire();
        assert!(e.is_expired(1.0));
    }

    #[test]
    fn random_blob_tracking() {
        let mut e = entry();
        assert!(e.has_random_blob(&blob(1, 10)));
        e.add_random_blob(blob(2, 20));
        e.add_random_blob(blob(2, 20));
        assert_eq!(e.random_blobs().len(), 2);
    }

    #[test]
    fn random_blob_cap_drops_oldest() {
        let mut e = entry();
        for i in 0..MAX_RANDOM_BLOBS as u8 {
            e.add_random_blob(blob(i.wrapping_add(10), u64::from(i)));
        }
        assert_eq!(e.random_blobs().len(), MAX_RANDOM_BLOBS);
        assert!(!e.has_random_blob(&blob(1, 10)));
    }
}
