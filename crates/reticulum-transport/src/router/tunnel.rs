//! Tunnels: paths that survive an interface going away and coming back.
//!
//! A node that wants a tunnel over an interface broadcasts a signed
//! synthesis packet. The relay on the other side records a tunnel keyed by
//! `SHA-256(public_key || interface_hash)` and stores every path it learns
//! through that interface. When the same tunnel is synthesized again, on
//! any interface, those paths are restored.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use reticulum_core::constants::KEYSIZE;
use reticulum_core::hash::full_hash_parts;
use reticulum_core::identity::{Identity, IdentityResolver};
use reticulum_core::types::{
    DestinationHash, FullHash, IdentityHash, PacketHash, RandomBlob, Signature, TunnelId,
};

use super::constants::TUNNEL_SYNTHESIS_LEN;
use crate::error::RouterError;
use crate::interface::InterfaceId;
use crate::path::constants::DESTINATION_TIMEOUT;
use crate::path::types::PathEntry;

pub fn tunnel_id(public_key: &[u8; KEYSIZE], interface_hash: &FullHash) -> TunnelId {
    full_hash_parts(&[public_key, interface_hash.as_ref()]).into()
}

/// The payload of a tunnel synthesis packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelSynthesis {
    pub public_key: [u8; KEYSIZE],
    pub interface_hash: FullHash,
    pub random: [u8; 16],
    pub signature: Signature,
}

impl TunnelSynthesis {
    pub fn create(
        identity: &dyn Identity,
        interface_hash: FullHash,
        random: [u8; 16],
    ) -> Result<Self, RouterError> {
        let mut synthesis = Self {
            public_key: identity.public_key(),
            interface_hash,
            random,
            signature: Signature::new([0u8; 64]),
        };
        synthesis.signature = identity.sign(&synthesis.signed_data())?;
        Ok(synthesis)
    }

    pub fn parse(data: &[u8]) -> Result<Self, RouterError> {
        if data.len() != TUNNEL_SYNTHESIS_LEN {
            return Err(RouterError::TunnelPayloadLength {
                expected: TUNNEL_SYNTHESIS_LEN,
                actual: data.len(),
            });
        }
        let mut public_key = [0u8; KEYSIZE];
        public_key.copy_from_slice(&data[..64]);
        let mut interface_hash = [0u8; 32];
        interface_hash.copy_from_slice(&data[64..96]);
        let mut random = [0u8; 16];
        random.copy_from_slice(&data[96..112]);
        let mut signature = [0u8; 64];
        signature.copy_from_slice(&data[112..176]);
        Ok(Self {
            public_key,
            interface_hash: FullHash::new(interface_hash),
            random,
            signature: Signature::new(signature),
        })
    }

    fn signed_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(112);
        data.extend_from_slice(&self.public_key);
        data.extend_from_slice(self.interface_hash.as_ref());
        data.extend_from_slice(&self.random);
        data
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(TUNNEL_SYNTHESIS_LEN);
        out.put_slice(&self.signed_data());
        out.put_slice(self.signature.as_ref());
        out.freeze()
    }

    pub fn tunnel_id(&self) -> TunnelId {
        tunnel_id(&self.public_key, &self.interface_hash)
    }

    /// Check the signature, returning the tunnel id and signer.
    pub fn validate(
        &self,
        resolver: &dyn IdentityResolver,
    ) -> Result<(TunnelId, Arc<dyn Identity>), RouterError> {
        let identity = resolver.from_public_key(&self.public_key)?;
        if !identity.verify(&self.signed_data(), &self.signature) {
            return Err(RouterError::TunnelSignature);
        }
        Ok((self.tunnel_id(), identity))
    }
}

/// A path remembered by a tunnel, detached from any interface.
#[derive(Debug, Clone, PartialEq)]
pub struct TunnelPath {
    pub timestamp: f64,
    pub next_hop: IdentityHash,
    pub hops: u8,
    pub expires: f64,
    pub random_blobs: Vec<RandomBlob>,
    pub packet_hash: PacketHash,
}

impl TunnelPath {
    pub fn from_entry(entry: &PathEntry) -> Self {
        Self {
            timestamp: entry.timestamp,
            next_hop: entry.next_hop,
            hops: entry.hops,
            expires: entry.expires,
            random_blobs: entry.random_blobs_to_vec(),
            packet_hash: entry.packet_hash,
        }
    }

    /// Bind the stored path to `interface`, stamped `now`.
    pub fn to_entry(&self, now: f64, interface: InterfaceId) -> PathEntry {
        PathEntry::from_raw(
            now,
            self.next_hop,
            self.hops,
            self.expires,
            self.random_blobs.clone(),
            interface,
            self.packet_hash,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TunnelEntry {
    /// `None` while the tunnel's interface is down.
    pub interface: Option<InterfaceId>,
    pub paths: HashMap<DestinationHash, TunnelPath>,
    pub expires: f64,
}

#[derive(Debug, Default)]
pub struct TunnelTable {
    entries: HashMap<TunnelId, TunnelEntry>,
}

impl TunnelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or re-bind a tunnel. Returns the paths a re-bound tunnel
    /// carried, for the caller to offer back to the path table.
    pub fn bind(
        &mut self,
        id: TunnelId,
        interface: InterfaceId,
        now: f64,
    ) -> Option<Vec<(DestinationHash, TunnelPath)>> {
        let expires = now + DESTINATION_TIMEOUT;
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.interface = Some(interface);
                entry.expires = expires;
                Some(
                    entry
                        .paths
                        .iter()
                        .map(|(dest, path)| (*dest, path.clone()))
                        .collect(),
                )
            }
            None => {
                self.entries.insert(
                    id,
                    TunnelEntry {
                        interface: Some(interface),
                        paths: HashMap::new(),
                        expires,
                    },
                );
                None
            }
        }
    }

    /// Remember a path learned through the tunnel and extend its life.
    pub fn record_path(&mut self, id: &TunnelId, dest: DestinationHash, path: TunnelPath, now: f64) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.paths.insert(dest, path);
            entry.expires = now + DESTINATION_TIMEOUT;
        }
    }

    pub fn forget_path(&mut self, id: &TunnelId, dest: &DestinationHash) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.paths.remove(dest);
        }
    }

    /// Detach tunnels from a removed interface. Their paths are kept.
    pub fn void_interface(&mut self, interface: InterfaceId) {
        for entry in self.entries.values_mut() {
            if entry.interface == Some(interface) {
                entry.interface = None;
            }
        }
    }

    /// Drop expired tunnels and expired paths inside live ones.
    pub fn cull(&mut self, now: f64) -> (usize, usize) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| now <= entry.expires);
        let tunnels = before - self.entries.len();

        let mut paths = 0;
        for entry in self.entries.values_mut() {
            let before = entry.paths.len();
            entry
                .paths
                .retain(|_, path| now <= path.timestamp + DESTINATION_TIMEOUT);
            paths += before - entry.paths.len();
        }
        (tunnels, paths)
    }

    pub fn get(&self, id: &TunnelId) -> Option<&TunnelEntry> {
        self.entries.get(id)
    }

    pub fn insert(&mut self, id: TunnelId, entry: TunnelEntry) {
        self.entries.insert(id, entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TunnelId, &TunnelEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
