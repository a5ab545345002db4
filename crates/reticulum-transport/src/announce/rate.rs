//! Ingress announce rate control.
//!
//! Only interfaces configured with a rate target take part. A destination
//! announcing faster than the target accumulates violations; past the grace
//! count its announces are still used for paths but no longer rebroadcast
//! until the block lifts.

use std::collections::{HashMap, VecDeque};

use reticulum_core::types::DestinationHash;

use super::constants::MAX_RATE_TIMESTAMPS;
use crate::interface::AnnounceRateConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct AnnounceRateEntry {
    /// Last accepted announce.
    pub last: f64,
    pub violations: u32,
    pub blocked_until: f64,
    pub timestamps: VecDeque<f64>,
}

#[derive(Debug, Default)]
pub struct AnnounceRateTable {
    entries: HashMap<DestinationHash, AnnounceRateEntry>,
}

impl AnnounceRateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an announce for `dest` and report whether its rebroadcast is
    /// blocked.
    pub fn check(&mut self, dest: DestinationHash, now: f64, config: &AnnounceRateConfig) -> bool {
        let Some(entry) = self.entries.get_mut(&dest) else {
            self.entries.insert(
                dest,
                AnnounceRateEntry {
                    last: now,
                    violations: 0,
                    blocked_until: 0.0,
                    timestamps: VecDeque::from([now]),
                },
            );
            return false;
        };

        entry.timestamps.push_back(now);
        while entry.timestamps.len() > MAX_RATE_TIMESTAMPS {
            entry.timestamps.pop_front();
        }

        if now <= entry.blocked_until {
            return true;
        }

        if now - entry.last < config.target {
            entry.violations += 1;
        } else {
            entry.violations = entry.violations.saturating_sub(1);
        }

        if entry.violations > config.grace {
            entry.blocked_until = entry.last + config.target + config.penalty;
            true
        } else {
            entry.last = now;
            false
        }
    }

    pub fn get(&self, dest: &DestinationHash) -> Option<&AnnounceRateEntry> {
        self.entries.get(dest)
    }

    /// Keep only destinations for which `keep` holds.
    pub fn retain(&mut self, mut keep: impl FnMut(&DestinationHash) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|dest, _| keep(dest));
        before - self.entries.len()
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

    fn config() -> AnnounceRateConfig {
        AnnounceRateConfig {
            target: 60.0,
            grace: 1,
            penalty: 30.0,
        }
    }

    #[test]
    fn blocks_after_grace_exhausted() {
        let dest = DestinationHash::new([1; 16]);
        let mut rates = AnnounceRateTable::new();
        assert!(!rates.check(dest, 0.0, &config()));
        // one violation is within grace
        assert!(!rates.check(dest, 10.0, &config()));
        assert!(rates.check(dest, 20.0, &config()));

        let entry = rates.get(&dest).unwrap();
        assert_eq!(entry.blocked_until, 10.0 + 60.0 + 30.0);
        assert!(rates.check(dest, 99.0, &config()));
    }

    #[test]
    fn slow_announces_pay_down_violations() {
        let dest = DestinationHash::new([2; 16]);
        let mut rates = AnnounceRateTable::new();
        rates.check(dest, 0.0, &config());
        rates.check(dest, 10.0, &config());
        assert_eq!(rates.get(&dest).unwrap().violations, 1);
        assert!(!rates.check(dest, 100.0, &config()));
        assert_eq!(rates.get(&dest).unwrap().violations, 0);
    }

    #[test]
    fn timestamps_are_bounded() {
        let dest = DestinationHash::new([3; 16]);
        let mut rates = AnnounceRateTable::new();
        for i in 0..40 {
            rates.check(dest, f64::from(i) * 100.0, &config());
        }
        assert_eq!(rates.get(&dest).unwrap().timestamps.len(), MAX_RATE_TIMESTAMPS);
    }
}
