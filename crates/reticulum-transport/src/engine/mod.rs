//! The transport engine.
//!
//! [`TransportEngine`] owns every routing table and makes every routing
//! decision. It is a synchronous state machine: the host feeds it frames,
//! application sends and clock ticks, and executes the
//! [`TransportAction`]s it returns. Time is always passed in as seconds.

mod announce;
mod discovery;
pub mod filter;
mod inbound;
mod jobs;
mod outbound;
pub mod persist;
mod proof;
mod tunnel;

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use rand::SeedableRng;
use rand::rngs::StdRng;
use reticulum_core::constants::TRANSPORT_APP_NAME;
use reticulum_core::destination::Destination;
use reticulum_core::identity::{Identity, IdentityResolver};
use reticulum_core::types::{DestinationHash, IdentityHash, LinkId};

use crate::action::TransportAction;
use crate::announce::{AnnounceRateTable, AnnounceTable};
use crate::cache::PacketCache;
use crate::config::TransportConfig;
use crate::dedup::{BoundedSet, PacketHashlist};
use crate::error::TransportError;
use crate::interface::{InterfaceId, InterfaceInfo, InterfaceRegistry};
use crate::path::discovery::DiscoveryRequests;
use crate::path::request::PathRequestTracker;
use crate::path::{PathState, PathTable};
use crate::receipt::ReceiptTable;
use crate::router::{LinkTable, ReverseTable, TunnelTable};

/// A destination registered on this node.
#[derive(Debug)]
struct LocalDestination {
    destination: Destination,
    /// App data carried by announces, including path responses.
    app_data: Option<Bytes>,
    /// Path-response announce payloads by request tag, with creation time.
    path_responses: HashMap<Bytes, (f64, Bytes)>,
}

/// An identity learned from a valid announce.
#[derive(Debug, Clone)]
pub struct KnownDestination {
    pub identity: Arc<dyn Identity>,
    pub app_data: Option<Bytes>,
    pub last_seen: f64,
}

/// A link request we sent, waiting for its proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingLink {
    pub destination: DestinationHash,
    /// Hops the proof must have travelled. [`PATHFINDER_M`] accepts any.
    ///
    /// [`PATHFINDER_M`]: crate::path::PATHFINDER_M
    pub expected_hops: u8,
}

pub struct TransportEngine {
    config: TransportConfig,
    identity: Arc<dyn Identity>,
    transport_id: IdentityHash,
    resolver: Arc<dyn IdentityResolver>,
    rng: StdRng,

    interfaces: InterfaceRegistry,
    destinations: HashMap<DestinationHash, LocalDestination>,
    known: HashMap<DestinationHash, KnownDestination>,

    paths: PathTable,
    announces: AnnounceTable,
    announce_rates: AnnounceRateTable,
    reverse: ReverseTable,
    links: LinkTable,
    tunnels: TunnelTable,
    receipts: ReceiptTable,
    cache: PacketCache,

    hashlist: PacketHashlist,
    pr_tags: BoundedSet<Vec<u8>>,
    discovery: DiscoveryRequests,
    /// Requesting interface and request time of path requests answered by
    /// a local client.
    pending_local_path_requests: HashMap<DestinationHash, (InterfaceId, f64)>,
    path_requests: PathRequestTracker,

    active_links: HashMap<LinkId, InterfaceId>,
    pending_links: HashMap<LinkId, PendingLink>,

    path_request_destination: Destination,
    tunnel_synthesize_destination: Destination,

    announces_checked: f64,
    receipts_checked: f64,
    tables_culled: f64,
}

impl std::fmt::Debug for TransportEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportEngine")
            .field("transport_id", &self.transport_id)
            .field("enable_transport", &self.config.enable_transport)
            .field("interfaces", &self.interfaces.len())
            .field("destinations", &self.destinations.len())
            .field("paths", &self.paths.len())
            .field("announces", &self.announces.len())
            .field("links", &self.links.len())
            .finish()
    }
}

impl TransportEngine {
    /// Engine acting as `identity`, whose hash becomes the transport id.
    pub fn new(
        identity: Arc<dyn Identity>,
        resolver: Arc<dyn IdentityResolver>,
        config: TransportConfig,
    ) -> Self {
        Self::with_rng(identity, resolver, config, StdRng::from_entropy())
    }

    /// Engine with a seeded random source, for reproducible jitter and tags.
    pub fn with_seed(
        identity: Arc<dyn Identity>,
        resolver: Arc<dyn IdentityResolver>,
        config: TransportConfig,
        seed: u64,
    ) -> Self {
        Self::with_rng(identity, resolver, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        identity: Arc<dyn Identity>,
        resolver: Arc<dyn IdentityResolver>,
        config: TransportConfig,
        rng: StdRng,
    ) -> Self {
        let mut paths = PathTable::new();
        paths.set_max_size(Some(config.path_table_max_size));
        Self {
            transport_id: identity.hash(),
            identity,
            resolver,
            rng,
            interfaces: InterfaceRegistry::new(),
            destinations: HashMap::new(),
            known: HashMap::new(),
            paths,
            announces: AnnounceTable::new(),
            announce_rates: AnnounceRateTable::new(),
            reverse: ReverseTable::new(),
            links: LinkTable::new(),
            tunnels: TunnelTable::new(),
            receipts: ReceiptTable::new(config.max_receipts),
            cache: PacketCache::new(),
            hashlist: PacketHashlist::new(config.hashlist_max_size),
            pr_tags: BoundedSet::new(config.max_pr_tags),
            discovery: DiscoveryRequests::new(),
            pending_local_path_requests: HashMap::new(),
            path_requests: PathRequestTracker::new(),
            active_links: HashMap::new(),
            pending_links: HashMap::new(),
            path_request_destination: Destination::plain(TRANSPORT_APP_NAME, &["path", "request"]),
            tunnel_synthesize_destination: Destination::plain(
                TRANSPORT_APP_NAME,
                &["tunnel", "synthesize"],
            ),
            announces_checked: 0.0,
            receipts_checked: 0.0,
            tables_culled: 0.0,
            config,
        }
    }

    pub fn transport_id(&self) -> IdentityHash {
        self.transport_id
    }

    pub fn identity(&self) -> &Arc<dyn Identity> {
        &self.identity
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    // Interfaces

    pub fn register_interface(&mut self, info: InterfaceInfo) -> InterfaceId {
        let name = info.name.clone();
        let id = self.interfaces.register(info);
        tracing::debug!(interface = %id, name = %name, "interface registered");
        id
    }

    /// Forget an interface. Tunnels bound to it are detached; paths through
    /// it go at the next cull.
    pub fn remove_interface(&mut self, id: InterfaceId) -> Option<InterfaceInfo> {
        let state = self.interfaces.remove(id)?;
        self.tunnels.void_interface(id);
        self.active_links.retain(|_, iface| *iface != id);
        tracing::debug!(interface = %id, name = %state.info.name, "interface removed");
        Some(state.info)
    }

    pub fn interfaces(&self) -> &InterfaceRegistry {
        &self.interfaces
    }

    // Destinations

    /// Register a destination for local delivery.
    pub fn register_destination(&mut self, destination: Destination) -> Result<(), TransportError> {
        let hash = *destination.hash();
        if self.destinations.contains_key(&hash) {
            return Err(TransportError::DuplicateDestination(hash));
        }
        tracing::debug!(destination = %hash, name = %destination.expanded_name(), "destination registered");
        self.destinations.insert(
            hash,
            LocalDestination {
                destination,
                app_data: None,
                path_responses: HashMap::new(),
            },
        );
        Ok(())
    }

    pub fn deregister_destination(&mut self, hash: &DestinationHash) -> Option<Destination> {
        self.destinations.remove(hash).map(|local| local.destination)
    }

    pub fn destination(&self, hash: &DestinationHash) -> Option<&Destination> {
        self.destinations.get(hash).map(|local| &local.destination)
    }

    pub fn is_local_destination(&self, hash: &DestinationHash) -> bool {
        self.destinations.contains_key(hash)
    }

    // Known identities

    pub fn remember_identity(
        &mut self,
        destination: DestinationHash,
        identity: Arc<dyn Identity>,
        app_data: Option<Bytes>,
        now: f64,
    ) {
        self.known.insert(
            destination,
            KnownDestination {
                identity,
                app_data,
                last_seen: now,
            },
        );
    }

    pub fn recall_identity(&self, destination: &DestinationHash) -> Option<Arc<dyn Identity>> {
        self.known
            .get(destination)
            .map(|known| known.identity.clone())
            .or_else(|| {
                self.destinations
                    .get(destination)
                    .and_then(|local| local.destination.identity().cloned())
            })
    }

    pub fn recall_app_data(&self, destination: &DestinationHash) -> Option<Bytes> {
        self.known.get(destination).and_then(|known| known.app_data.clone())
    }

    pub fn known_destinations(&self) -> impl Iterator<Item = (&DestinationHash, &KnownDestination)> {
        self.known.iter()
    }

    // Links terminating here

    /// Track a link request we sent so its proof is delivered.
    pub fn register_pending_link(
        &mut self,
        link_id: LinkId,
        destination: DestinationHash,
        expected_hops: u8,
    ) {
        self.pending_links.insert(
            link_id,
            PendingLink {
                destination,
                expected_hops,
            },
        );
    }

    /// Mark a link established over `interface`. Link traffic is only
    /// accepted from that interface.
    pub fn activate_link(&mut self, link_id: LinkId, interface: InterfaceId) {
        self.pending_links.remove(&link_id);
        self.active_links.insert(link_id, interface);
    }

    pub fn close_link(&mut self, link_id: &LinkId) {
        self.pending_links.remove(link_id);
        self.active_links.remove(link_id);
    }

    pub fn is_link_active(&self, link_id: &LinkId) -> bool {
        self.active_links.contains_key(link_id)
    }

    // Path queries

    pub fn has_path(&self, destination: &DestinationHash, now: f64) -> bool {
        self.paths.has_path(destination, now)
    }

    pub fn hops_to(&self, destination: &DestinationHash, now: f64) -> u8 {
        self.paths.hops_to(destination, now)
    }

    pub fn next_hop(&self, destination: &DestinationHash, now: f64) -> Option<IdentityHash> {
        self.paths.next_hop(destination, now)
    }

    pub fn next_hop_interface(&self, destination: &DestinationHash, now: f64) -> Option<InterfaceId> {
        self.paths.next_hop_interface(destination, now)
    }

    /// Force a path out at the next cull.
    pub fn expire_path(&mut self, destination: &DestinationHash) -> bool {
        self.paths.expire_path(destination)
    }

    pub fn mark_path_responsive(&mut self, destination: DestinationHash) {
        self.paths.set_state(destination, PathState::Responsive);
    }

    pub fn mark_path_unresponsive(&mut self, destination: DestinationHash) {
        self.paths.set_state(destination, PathState::Unresponsive);
    }

    pub fn path_table(&self) -> &PathTable {
        &self.paths
    }

    pub fn announce_table(&self) -> &AnnounceTable {
        &self.announces
    }

    pub fn reverse_table(&self) -> &ReverseTable {
        &self.reverse
    }

    pub fn link_table(&self) -> &LinkTable {
        &self.links
    }

    pub fn tunnel_table(&self) -> &TunnelTable {
        &self.tunnels
    }

    pub fn receipts(&self) -> &ReceiptTable {
        &self.receipts
    }

    pub fn packet_cache(&self) -> &PacketCache {
        &self.cache
    }

    pub fn hashlist(&self) -> &PacketHashlist {
        &self.hashlist
    }

    pub fn discovery_requests(&self) -> &DiscoveryRequests {
        &self.discovery
    }

    fn is_control_destination(&self, hash: &DestinationHash) -> bool {
        hash == self.path_request_destination.hash()
            || hash == self.tunnel_synthesize_destination.hash()
    }

    /// Drop a cached announce unless another path still relies on it.
    fn release_cached(
        &mut self,
        packet_hash: reticulum_core::types::PacketHash,
        actions: &mut Vec<TransportAction>,
    ) {
        let in_use = self
            .paths
            .iter()
            .any(|(_, entry)| entry.packet_hash == packet_hash);
        if !in_use && self.cache.remove(&packet_hash).is_some() {
            actions.push(TransportAction::CacheEvicted { packet_hash });
        }
    }

    /// Outbound interfaces, in registration order.
    fn outbound_interfaces(&self) -> Vec<InterfaceId> {
        self.interfaces
            .iter()
            .filter(|(_, state)| state.info.outbound)
            .map(|(id, _)| id)
            .collect()
    }
}

fn transmit(actions: &mut Vec<TransportAction>, interface: InterfaceId, raw: Bytes) {
    actions.push(TransportAction::Transmit { interface, raw });
}
