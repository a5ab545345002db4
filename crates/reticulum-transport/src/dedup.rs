//! Bounded, insertion-ordered sets.
//!
//! Used for the packet hashlist and for path-request tags. When full, the
//! oldest member is evicted to make room.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

use reticulum_core::types::PacketHash;

/// Default capacity of the packet hashlist.
pub const HASHLIST_MAX_SIZE: usize = 1_000_000;

/// Default capacity of the path-request tag set.
pub const MAX_PR_TAGS: usize = 32_000;

#[derive(Debug, Clone)]
pub struct BoundedSet<T: Hash + Eq + Clone> {
    members: HashSet<T>,
    order: VecDeque<T>,
    capacity: usize,
}

impl<T: Hash + Eq + Clone> BoundedSet<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            members: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn contains(&self, item: &T) -> bool {
        self.members.contains(item)
    }

    /// Insert `item`, returning `true` if it was not already present.
    pub fn insert(&mut self, item: T) -> bool {
        if !self.members.insert(item.clone()) {
            return false;
        }
        self.order.push_back(item);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        true
    }

    /// Shrink to `max` members, dropping the oldest.
    pub fn truncate_oldest(&mut self, max: usize) -> usize {
        let mut dropped = 0;
        while self.order.len() > max {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
                dropped += 1;
            }
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Members, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.order.iter()
    }
}

impl<T: Hash + Eq + Clone> Extend<T> for BoundedSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.insert(item);
        }
    }
}

/// Packet hashes already seen, oldest evicted first.
pub type PacketHashlist = BoundedSet<PacketHash>;


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn never_exceeds_capacity(
            cap in 1usize..64,
            items in prop::collection::vec(any::<u16>(), 0..400),
        ) {
            let mut set = BoundedSet::new(cap);
            for item in &items {
                set.insert(*item);
                prop_assert!(set.len() <= cap);
            }
            if let Some(last) = items.last() {
                prop_assert!(set.contains(last));
            }
        }

        #[test]
        fn insert_is_idempotent(item in any::<u32>()) {
            let mut set = BoundedSet::new(8);
            prop_assert!(set.insert(item));
            prop_assert!(!set.insert(item));
            prop_assert_eq!(set.len(), 1);
        }
    }
}
