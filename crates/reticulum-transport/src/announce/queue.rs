//! Per-interface queue of announces held back by the bandwidth cap.

use bytes::Bytes;
use reticulum_core::types::DestinationHash;

use super::constants::{MAX_QUEUED_ANNOUNCES, QUEUED_ANNOUNCE_LIFE};

#[derive(Debug, Clone, PartialEq)]
pub struct QueuedAnnounce {
    pub destination: DestinationHash,
    /// When it was queued.
    pub time: f64,
    pub hops: u8,
    /// Emission time from the announce's random blob.
    pub emitted: u64,
    pub raw: Bytes,
}

/// Outcome of [`AnnounceQueue::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    Queued,
    /// Replaced an older announce for the same destination.
    Replaced,
    /// An announce at least as recent is already waiting.
    Superseded,
    Full,
}

#[derive(Debug, Default)]
pub struct AnnounceQueue {
    entries: Vec<QueuedAnnounce>,
}

impl AnnounceQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an announce, keeping at most one per destination: the most
    /// recently emitted.
    pub fn push(&mut self, announce: QueuedAnnounce) -> QueueOutcome {
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|e| e.destination == announce.destination)
        {
            if announce.emitted > existing.emitted {
                *existing = announce;
                return QueueOutcome::Replaced;
            }
            return QueueOutcome::Superseded;
        }
        if self.entries.len() >= MAX_QUEUED_ANNOUNCES {
            return QueueOutcome::Full;
        }
        self.entries.push(announce);
        QueueOutcome::Queued
    }

    /// Take the next announce to send: fewest hops first, oldest among
    /// equals. Entries past [`QUEUED_ANNOUNCE_LIFE`] are discarded first.
    pub fn pop_next(&mut self, now: f64) -> Option<QueuedAnnounce> {
        self.entries.retain(|e| now <= e.time + QUEUED_ANNOUNCE_LIFE);
        let (index, _) = self
            .entries
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.hops.cmp(&b.hops).then(a.time.total_cmp(&b.time)))?;
        Some(self.entries.remove(index))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
