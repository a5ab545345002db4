//! Outstanding discovery requests.
//!
//! When a path request for an unknown destination arrives on a discovery
//! capable interface, the request is remembered here so that a matching
//! announce can be answered straight back to the requester.

use std::collections::HashMap;

use reticulum_core::types::DestinationHash;

use super::constants::PATH_REQUEST_TIMEOUT;
use crate::interface::InterfaceId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscoveryRequest {
    pub timeout: f64,
    pub requesting_interface: InterfaceId,
}

#[derive(Debug, Default)]
pub struct DiscoveryRequests {
    entries: HashMap<DestinationHash, DiscoveryRequest>,
}

impl DiscoveryRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request unless one is already waiting for `dest`.
    pub fn record(&mut self, dest: DestinationHash, interface: InterfaceId, now: f64) -> bool {
        if self.entries.contains_key(&dest) {
            return false;
        }
        self.entries.insert(
            dest,
            DiscoveryRequest {
                timeout: now + PATH_REQUEST_TIMEOUT,
                requesting_interface: interface,
            },
        );
        true
    }

    pub fn get(&self, dest: &DestinationHash) -> Option<&DiscoveryRequest> {
        self.entries.get(dest)
    }

    pub fn contains(&self, dest: &DestinationHash) -> bool {
        self.entries.contains_key(dest)
    }

    pub fn cull(&mut self, now: f64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, req| now <= req.timeout);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
