//! Serializable snapshots of the tables that outlive a restart.
//!
//! Interfaces are stored by name, since [`InterfaceId`]s are only valid for
//! the engine that issued them. A restored path also needs its announce
//! back in the packet cache, so the host reloads cached packets before
//! calling [`TransportEngine::restore`].

use std::collections::HashMap;

use bytes::Bytes;
use reticulum_core::constants::KEYSIZE;
use reticulum_core::types::{DestinationHash, IdentityHash, PacketHash, RandomBlob, TunnelId};
use serde::{Deserialize, Serialize};

use super::TransportEngine;
use crate::interface::InterfaceId;
use crate::path::{PathEntry, PathState};
use crate::router::{TunnelEntry, TunnelPath};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedPath {
    pub destination: [u8; 16],
    pub timestamp: f64,
    pub next_hop: [u8; 16],
    pub hops: u8,
    pub expires: f64,
    pub random_blobs: Vec<[u8; 10]>,
    pub packet_hash: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRoute {
    pub path: PersistedPath,
    /// Name of the receiving interface.
    pub interface: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedTunnel {
    pub tunnel_id: [u8; 32],
    pub expires: f64,
    pub paths: Vec<PersistedPath>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedIdentity {
    pub destination: [u8; 16],
    pub public_key: Vec<u8>,
    pub app_data: Option<Vec<u8>>,
    pub last_seen: f64,
}

/// Everything [`TransportEngine::snapshot`] captures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportSnapshot {
    pub paths: Vec<PersistedRoute>,
    pub packet_hashes: Vec<[u8; 32]>,
    pub tunnels: Vec<PersistedTunnel>,
    pub identities: Vec<PersistedIdentity>,
}

/// What [`TransportEngine::restore`] brought back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub paths: usize,
    /// Paths skipped for a missing interface or cached announce.
    pub skipped_paths: usize,
    pub packet_hashes: usize,
    pub tunnels: usize,
    pub identities: usize,
}

impl PersistedPath {
    fn capture(destination: &DestinationHash, path: &TunnelPath) -> Self {
        Self {
            destination: destination.to_bytes(),
            timestamp: path.timestamp,
            next_hop: path.next_hop.to_bytes(),
            hops: path.hops,
            expires: path.expires,
            random_blobs: path.random_blobs.iter().map(|b| b.to_bytes()).collect(),
            packet_hash: path.packet_hash.to_bytes(),
        }
    }

    fn to_tunnel_path(&self) -> (DestinationHash, TunnelPath) {
        (
            DestinationHash::new(self.destination),
            TunnelPath {
                timestamp: self.timestamp,
                next_hop: IdentityHash::new(self.next_hop),
                hops: self.hops,
                expires: self.expires,
                random_blobs: self.random_blobs.iter().copied().map(RandomBlob::new).collect(),
                packet_hash: PacketHash::new(self.packet_hash),
            },
        )
    }

    fn to_entry(&self, interface: InterfaceId) -> (DestinationHash, PathEntry) {
        let (destination, path) = self.to_tunnel_path();
        (
            destination,
            PathEntry::from_raw(
                path.timestamp,
                path.next_hop,
                path.hops,
                path.expires,
                path.random_blobs,
                interface,
                path.packet_hash,
            ),
        )
    }
}

impl TransportEngine {
    /// Capture the path table, packet hashlist, tunnels and known
    /// identities. Paths whose announce is no longer cached are left out.
    pub fn snapshot(&self) -> TransportSnapshot {
        let paths = self
            .paths
            .iter()
            .filter(|(_, entry)| self.cache.contains(&entry.packet_hash))
            .filter_map(|(destination, entry)| {
                let interface = self.interfaces.get(entry.receiving_interface)?;
                Some(PersistedRoute {
                    path: PersistedPath::capture(destination, &TunnelPath::from_entry(entry)),
                    interface: interface.info.name.clone(),
                })
            })
            .collect();

        let tunnels = self
            .tunnels
            .iter()
            .map(|(id, tunnel)| PersistedTunnel {
                tunnel_id: id.to_bytes(),
                expires: tunnel.expires,
                paths: tunnel
                    .paths
                    .iter()
                    .map(|(destination, path)| PersistedPath::capture(destination, path))
                    .collect(),
            })
            .collect();

        let identities = self
            .known
            .iter()
            .map(|(destination, known)| PersistedIdentity {
                destination: destination.to_bytes(),
                public_key: known.identity.public_key().to_vec(),
                app_data: known.app_data.as_ref().map(|data| data.to_vec()),
                last_seen: known.last_seen,
            })
            .collect();

        TransportSnapshot {
            paths,
            packet_hashes: self.hashlist.iter().map(|hash| hash.to_bytes()).collect(),
            tunnels,
            identities,
        }
    }

    /// Put a cached announce back, typically from the host's disk cache.
    pub fn restore_cached_packet(&mut self, raw: Bytes) -> Option<PacketHash> {
        self.cache.insert(raw)
    }

    /// Load a snapshot into the engine. Interfaces and cached packets must
    /// already be in place. Entries already present are kept.
    pub fn restore(&mut self, snapshot: TransportSnapshot) -> RestoreSummary {
        let mut summary = RestoreSummary::default();

        for route in snapshot.paths {
            let interface = self.interfaces.find_by_name(&route.interface);
            let cached = self.cache.contains(&PacketHash::new(route.path.packet_hash));
            let Some(interface) = interface.filter(|_| cached) else {
                tracing::debug!(interface = %route.interface, "skipping persisted path");
                summary.skipped_paths += 1;
                continue;
            };
            let (destination, entry) = route.path.to_entry(interface);
            if self.paths.contains(&destination) {
                continue;
            }
            self.paths.insert(destination, entry);
            self.paths.set_state(destination, PathState::Unknown);
            summary.paths += 1;
        }

        for hash in snapshot.packet_hashes {
            if self.hashlist.insert(PacketHash::new(hash)) {
                summary.packet_hashes += 1;
            }
        }

        for tunnel in snapshot.tunnels {
            let id = TunnelId::new(tunnel.tunnel_id);
            if self.tunnels.get(&id).is_some() {
                continue;
            }
            let paths: HashMap<DestinationHash, TunnelPath> = tunnel
                .paths
                .iter()
                .filter(|path| self.cache.contains(&PacketHash::new(path.packet_hash)))
                .map(PersistedPath::to_tunnel_path)
                .collect();
            self.tunnels.insert(
                id,
                TunnelEntry {
                    interface: None,
                    paths,
                    expires: tunnel.expires,
                },
            );
            summary.tunnels += 1;
        }

        for persisted in snapshot.identities {
            let destination = DestinationHash::new(persisted.destination);
            if self.known.contains_key(&destination) {
                continue;
            }
            let Ok(public_key) = <[u8; KEYSIZE]>::try_from(persisted.public_key.as_slice()) else {
                tracing::debug!(destination = %destination, "persisted identity has a malformed key");
                continue;
            };
            match self.resolver.from_public_key(&public_key) {
                Ok(identity) => {
                    self.remember_identity(
                        destination,
                        identity,
                        persisted.app_data.map(Bytes::from),
                        persisted.last_seen,
                    );
                    summary.identities += 1;
                }
                Err(err) => {
                    tracing::debug!(destination = %destination, %err, "could not restore identity");
                }
            }
        }

        tracing::info!(
            paths = summary.paths,
            skipped_paths = summary.skipped_paths,
            tunnels = summary.tunnels,
            identities = summary.identities,
            "transport state restored"
        );
        summary
    }
}
