//! Core Node struct and async event loop.
//!
//! The node owns one [`TransportEngine`] and is its only writer. Received
//! frames, application commands and clock ticks arrive on one task and are
//! handled one at a time; the actions each engine call returns are carried
//! out afterwards, which is when application handlers run.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{Instant, MissedTickBehavior};

use reticulum_core::destination::Destination;
use reticulum_core::identity::{Identity, IdentityResolver};
use reticulum_core::packet::builder::Packet;
use reticulum_core::types::{DestinationHash, PacketHash};
use reticulum_transport::engine::persist::{PersistedRoute, TransportSnapshot};
use reticulum_transport::{InterfaceId, InterfaceInfo, TransportAction, TransportEngine};

use crate::announce_cache::AnnounceCache;
use crate::config::{NodeConfig, NodeSection};
use crate::error::NodeError;
use crate::handle::{Command, NodeHandle, PathInfo, SendOutcome};
use crate::handler::{
    AnnounceHandler, DeliveredPacket, DestinationHandler, LinkEvent, LinkHandler, ReceiptHandler,
    ReceivedAnnounce, announce_matches,
};
use crate::storage::Storage;

/// Commands queued before senders wait.
const COMMAND_QUEUE: usize = 1024;

/// Subdirectory of the storage path holding cached announces.
const ANNOUNCE_DIR: &str = "announces";

/// Wall-clock seconds, advanced by tokio's clock so paused-time tests
/// drive the engine's timers.
#[derive(Debug, Clone, Copy)]
struct Clock {
    base: f64,
    started: Instant,
}

impl Clock {
    fn new() -> Self {
        let base = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        Self {
            base,
            started: Instant::now(),
        }
    }

    fn now(&self) -> f64 {
        self.base + self.started.elapsed().as_secs_f64()
    }
}

/// A Reticulum node: one transport engine and the handlers around it.
pub struct Node {
    config: NodeConfig,
    engine: TransportEngine,
    clock: Clock,
    storage: Option<Storage>,
    announce_cache: Option<AnnounceCache>,
    interfaces: HashMap<InterfaceId, mpsc::Sender<Bytes>>,
    destination_handlers: HashMap<DestinationHash, Box<dyn DestinationHandler>>,
    announce_handlers: Vec<Box<dyn AnnounceHandler>>,
    receipt_handlers: HashMap<PacketHash, Box<dyn ReceiptHandler>>,
    link_handler: Option<Box<dyn LinkHandler>>,
    /// Persisted paths waiting for their interface to attach.
    pending_paths: Vec<PersistedRoute>,
    commands: mpsc::Receiver<Command>,
    started: bool,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("engine", &self.engine)
            .field("interfaces", &self.interfaces.len())
            .field("storage", &self.storage)
            .field("pending_paths", &self.pending_paths.len())
            .field("started", &self.started)
            .finish()
    }
}

impl Node {
    /// Create a node acting as `identity`.
    pub fn new(
        config: NodeConfig,
        identity: Arc<dyn Identity>,
        resolver: Arc<dyn IdentityResolver>,
    ) -> (Self, NodeHandle) {
        let engine = TransportEngine::new(identity, resolver, config.transport.clone());
        Self::with_engine(config, engine)
    }

    /// Create a node around a prepared engine. The engine's own transport
    /// configuration is kept.
    pub fn with_engine(config: NodeConfig, engine: TransportEngine) -> (Self, NodeHandle) {
        let (storage, announce_cache) = match open_storage(&config.node) {
            Some((storage, cache)) => (Some(storage), Some(cache)),
            None => (None, None),
        };
        let (command_tx, commands) = mpsc::channel(COMMAND_QUEUE);
        let node = Self {
            config,
            engine,
            clock: Clock::new(),
            storage,
            announce_cache,
            interfaces: HashMap::new(),
            destination_handlers: HashMap::new(),
            announce_handlers: Vec::new(),
            receipt_handlers: HashMap::new(),
            link_handler: None,
            pending_paths: Vec::new(),
            commands,
            started: false,
        };
        (node, NodeHandle::new(command_tx))
    }

    pub fn engine(&self) -> &TransportEngine {
        &self.engine
    }

    pub fn has_storage(&self) -> bool {
        self.storage.is_some()
    }

    /// Load persisted state. Cached announces come back first, then the
    /// tables; persisted paths return as their interfaces attach.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        if self.started {
            return Err(NodeError::AlreadyStarted);
        }
        self.started = true;

        let Some(storage) = self.storage.as_mut() else {
            tracing::info!("node started without storage");
            return Ok(());
        };
        let mut snapshot = match storage.load_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("failed to load persisted state, starting empty: {e}");
                TransportSnapshot::default()
            }
        };

        if let Some(cache) = &self.announce_cache {
            let referenced: HashSet<PacketHash> = snapshot
                .paths
                .iter()
                .map(|route| &route.path)
                .chain(snapshot.tunnels.iter().flat_map(|tunnel| tunnel.paths.iter()))
                .map(|path| PacketHash::new(path.packet_hash))
                .collect();
            match cache.load_all().await {
                Ok(packets) => {
                    for (packet_hash, raw) in packets {
                        if !referenced.contains(&packet_hash) {
                            continue;
                        }
                        if self.engine.restore_cached_packet(raw) != Some(packet_hash) {
                            tracing::warn!(packet_hash = %packet_hash, "cached announce does not match its name");
                        }
                    }
                }
                Err(e) => tracing::warn!("failed to load announce cache: {e}"),
            }
            match cache.retain(&referenced).await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "removed unreferenced cached announces"),
                Err(e) => tracing::warn!("failed to clean announce cache: {e}"),
            }
        }

        self.pending_paths = std::mem::take(&mut snapshot.paths);
        let summary = self.engine.restore(snapshot);
        tracing::info!(
            pending_paths = self.pending_paths.len(),
            tunnels = summary.tunnels,
            identities = summary.identities,
            "node started"
        );
        Ok(())
    }

    /// Run the event loop until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        if !self.started
            && let Err(e) = self.start().await
        {
            tracing::warn!("failed to start node: {e}");
        }

        let mut tick_interval = tokio::time::interval(self.config.node.tick_period());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let persist_period = self
            .config
            .node
            .persist_period()
            .filter(|_| self.storage.is_some());
        let mut persist_interval =
            tokio::time::interval(persist_period.unwrap_or(Duration::from_secs(3600)));

        // Don't fire immediately
        tick_interval.tick().await;
        persist_interval.tick().await;

        tracing::info!("entering event loop");

        let mut shutdown_reply = None;
        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        tracing::info!("shutdown requested");
                        shutdown_reply = Some(reply);
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        tracing::info!("all node handles dropped, exiting");
                        break;
                    }
                },

                _ = tick_interval.tick() => {
                    let actions = self.engine.tick(self.clock.now());
                    self.execute(actions).await;
                }

                _ = persist_interval.tick(), if persist_period.is_some() => {
                    self.persist_state().await;
                }
            }
        }

        self.persist_state().await;
        tracing::info!("node shutdown complete");
        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
    }

    async fn handle_command(&mut self, command: Command) {
        let now = self.clock.now();
        match command {
            Command::Inbound { interface, raw } => {
                if !self.interfaces.contains_key(&interface) {
                    tracing::debug!(interface = %interface, "frame from detached interface dropped");
                    return;
                }
                let actions = self.engine.inbound(raw, interface, now);
                self.execute(actions).await;
            }
            Command::AttachInterface {
                name,
                info,
                sender,
                reply,
            } => {
                let _ = reply.send(self.attach_interface(name, info, sender));
            }
            Command::DetachInterface { interface, reply } => {
                self.interfaces.remove(&interface);
                let removed = self.engine.remove_interface(interface);
                if let Some(info) = &removed {
                    tracing::info!(interface = %interface, name = %info.name, "interface detached");
                }
                let _ = reply.send(removed.is_some());
            }
            Command::RegisterDestination {
                destination,
                handler,
                reply,
            } => {
                let hash = *destination.hash();
                let result = self.engine.register_destination(destination);
                if result.is_ok() {
                    self.destination_handlers.insert(hash, handler);
                }
                let _ = reply.send(result.map_err(NodeError::from));
            }
            Command::DeregisterDestination { destination, reply } => {
                self.destination_handlers.remove(&destination);
                let _ = reply.send(self.engine.deregister_destination(&destination).is_some());
            }
            Command::AddAnnounceHandler { handler } => self.announce_handlers.push(handler),
            Command::SetLinkHandler { handler } => self.link_handler = Some(handler),
            Command::Announce {
                destination,
                app_data,
                reply,
            } => {
                let result = self.engine.announce(&destination, app_data, now);
                let _ = reply.send(self.execute_result(result).await);
            }
            Command::Send {
                destination,
                data,
                receipt,
                reply,
            } => {
                let _ = reply.send(self.send(&destination, data, receipt, now).await);
            }
            Command::RequestPath { destination, reply } => {
                let result = self.engine.request_path(&destination, None, now);
                let _ = reply.send(self.execute_result(result).await);
            }
            Command::Path { destination, reply } => {
                let _ = reply.send(self.path_info(&destination, now));
            }
            Command::RecallIdentity { destination, reply } => {
                let _ = reply.send(self.engine.recall_identity(&destination));
            }
            Command::Persist { reply } => {
                let _ = reply.send(self.persist().await);
            }
            Command::Shutdown { .. } => {}
        }
    }

    fn attach_interface(
        &mut self,
        name: String,
        info: Option<InterfaceInfo>,
        sender: mpsc::Sender<Bytes>,
    ) -> Result<InterfaceId, NodeError> {
        let info = match info {
            Some(info) => info,
            None => match self.config.interface(&name) {
                Some(entry) => entry.to_info()?,
                None => InterfaceInfo::new(name),
            },
        };
        let name = info.name.clone();
        let id = self.engine.register_interface(info);
        self.interfaces.insert(id, sender);

        let (restorable, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_paths)
            .into_iter()
            .partition(|route| route.interface == name);
        self.pending_paths = waiting;
        let restored = if restorable.is_empty() {
            0
        } else {
            self.engine
                .restore(TransportSnapshot {
                    paths: restorable,
                    ..TransportSnapshot::default()
                })
                .paths
        };

        tracing::info!(interface = %id, name = %name, restored, "interface attached");
        Ok(id)
    }

    async fn send(
        &mut self,
        destination: &Destination,
        data: Bytes,
        receipt: Option<Box<dyn ReceiptHandler>>,
        now: f64,
    ) -> Result<SendOutcome, NodeError> {
        let dispatch = self.engine.send(destination, Packet::data(data), now)?;
        let outcome = SendOutcome {
            sent: dispatch.sent,
            packet_hash: dispatch.packet_hash,
            receipt: dispatch.receipt,
        };
        if let Some(handler) = receipt {
            match dispatch.packet_hash.filter(|_| dispatch.receipt) {
                Some(packet_hash) => {
                    self.receipt_handlers.insert(packet_hash, handler);
                }
                None => tracing::debug!(destination = %destination.hash(), "no receipt for packet, handler dropped"),
            }
        }
        self.execute(dispatch.actions).await;
        Ok(outcome)
    }

    fn path_info(&self, destination: &DestinationHash, now: f64) -> Option<PathInfo> {
        if !self.engine.has_path(destination, now) {
            return None;
        }
        Some(PathInfo {
            hops: self.engine.hops_to(destination, now),
            next_hop: self.engine.next_hop(destination, now)?,
            interface: self.engine.next_hop_interface(destination, now)?,
        })
    }

    async fn execute_result<E>(
        &mut self,
        result: Result<Vec<TransportAction>, E>,
    ) -> Result<(), NodeError>
    where
        NodeError: From<E>,
    {
        let actions = result?;
        self.execute(actions).await;
        Ok(())
    }

    /// Carry out engine actions in order. Proofs requested by handlers
    /// are queued behind the actions already pending.
    async fn execute(&mut self, actions: Vec<TransportAction>) {
        let mut queue = VecDeque::from(actions);
        while let Some(action) = queue.pop_front() {
            match action {
                TransportAction::Transmit { interface, raw } => self.transmit(interface, raw),
                TransportAction::DeliverPacket {
                    destination,
                    packet_hash,
                    context,
                    data,
                    interface,
                    proof_requested,
                } => {
                    let packet = DeliveredPacket {
                        destination,
                        packet_hash,
                        context,
                        data,
                        interface,
                    };
                    let Some(handler) = self.destination_handlers.get_mut(&destination) else {
                        tracing::debug!(destination = %destination, "no handler for delivered packet");
                        continue;
                    };
                    let prove = proof_requested && handler.proof_requested(&packet);
                    handler.on_packet(&packet);
                    if prove {
                        match self
                            .engine
                            .prove(&destination, &packet_hash, interface, self.clock.now())
                        {
                            Ok(more) => queue.extend(more),
                            Err(e) => tracing::warn!(packet_hash = %packet_hash, "failed to prove packet: {e}"),
                        }
                    }
                }
                TransportAction::DeliverLinkRequest {
                    destination,
                    link_id,
                    packet,
                    interface,
                } => self.link_event(LinkEvent::Request {
                    destination,
                    link_id,
                    packet,
                    interface,
                }),
                TransportAction::DeliverToLink {
                    link_id,
                    packet,
                    interface,
                } => self.link_event(LinkEvent::Traffic {
                    link_id,
                    packet,
                    interface,
                }),
                TransportAction::DeliverLinkProof {
                    link_id,
                    packet,
                    interface,
                } => self.link_event(LinkEvent::Proof {
                    link_id,
                    packet,
                    interface,
                }),
                TransportAction::AnnounceReceived {
                    destination,
                    identity,
                    name_hash,
                    app_data,
                    hops,
                    interface,
                    path_response,
                } => {
                    let announce = ReceivedAnnounce {
                        destination,
                        identity,
                        name_hash,
                        app_data,
                        hops,
                        interface,
                        path_response,
                    };
                    for handler in &mut self.announce_handlers {
                        if announce_matches(&**handler, &announce) {
                            handler.on_announce(&announce);
                        }
                    }
                }
                TransportAction::ReceiptDelivered { packet_hash, .. } => {
                    if let Some(mut handler) = self.receipt_handlers.remove(&packet_hash) {
                        handler.on_delivered(&packet_hash);
                    }
                }
                TransportAction::ReceiptFailed {
                    packet_hash,
                    status,
                    ..
                } => {
                    if let Some(mut handler) = self.receipt_handlers.remove(&packet_hash) {
                        handler.on_failed(&packet_hash, status);
                    }
                }
                TransportAction::CachePacket { packet_hash, raw } => {
                    if let Some(cache) = &self.announce_cache
                        && let Err(e) = cache.store(&packet_hash, &raw).await
                    {
                        tracing::warn!(packet_hash = %packet_hash, "failed to cache announce: {e}");
                    }
                }
                TransportAction::CacheEvicted { packet_hash } => {
                    if let Some(cache) = &self.announce_cache
                        && let Err(e) = cache.remove(&packet_hash).await
                    {
                        tracing::warn!(packet_hash = %packet_hash, "failed to evict cached announce: {e}");
                    }
                }
            }
        }
    }

    fn transmit(&self, interface: InterfaceId, raw: Bytes) {
        let Some(sender) = self.interfaces.get(&interface) else {
            tracing::debug!(interface = %interface, "transmit on detached interface dropped");
            return;
        };
        match sender.try_send(raw) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(interface = %interface, "interface queue full, frame dropped");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(interface = %interface, "interface channel closed, frame dropped");
            }
        }
    }

    fn link_event(&mut self, event: LinkEvent) {
        match &mut self.link_handler {
            Some(handler) => handler.on_link_event(event),
            None => tracing::debug!(?event, "no link handler, link traffic dropped"),
        }
    }

    /// Save the engine's tables, keeping paths still waiting for their
    /// interface.
    async fn persist(&mut self) -> Result<usize, NodeError> {
        let Some(storage) = self.storage.as_mut() else {
            return Ok(0);
        };
        let mut snapshot = self.engine.snapshot();
        snapshot.paths.extend(self.pending_paths.iter().cloned());
        Ok(storage.save_snapshot(&snapshot).await?)
    }

    async fn persist_state(&mut self) {
        if let Err(e) = self.persist().await {
            tracing::warn!("failed to persist state: {e}");
        }
    }
}

/// Open storage and the announce cache. Failures disable persistence
/// rather than stopping the node.
fn open_storage(section: &NodeSection) -> Option<(Storage, AnnounceCache)> {
    let Some(dir) = section.storage_dir() else {
        if section.enable_storage {
            tracing::warn!("could not determine storage directory, persistence disabled");
        }
        return None;
    };
    let storage = match Storage::new(dir.clone()) {
        Ok(storage) => storage,
        Err(e) => {
            tracing::warn!(path = %dir.display(), "failed to initialize storage: {e}");
            return None;
        }
    };
    match AnnounceCache::new(dir.join(ANNOUNCE_DIR)) {
        Ok(cache) => Some((storage, cache)),
        Err(e) => {
            tracing::warn!(path = %dir.display(), "failed to initialize announce cache: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reticulum_core::testing::{TestIdentity, TestResolver};

    fn no_storage() -> NodeConfig {
        NodeConfig::parse("[node]\nenable_storage = false\n").unwrap()
    }

    fn node(config: NodeConfig) -> (Node, NodeHandle) {
        Node::new(
            config,
            Arc::new(TestIdentity::from_seed(1)),
            Arc::new(TestResolver),
        )
    }

    #[test]
    fn node_new_without_storage() {
        let (node, _handle) = node(no_storage());
        assert!(!node.has_storage());
        assert!(node.interfaces.is_empty());
    }

    #[test]
    fn node_new_with_storage_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig::parse(&format!(
            "[node]\nstorage_path = \"{}\"\n",
            dir.path().join("state").display()
        ))
        .unwrap();
        let (node, _handle) = node(config);
        assert!(node.has_storage());
        assert!(dir.path().join("state").join(ANNOUNCE_DIR).is_dir());
    }

    #[tokio::test]
    async fn node_start_twice_fails() {
        let (mut node, _handle) = node(no_storage());
        node.start().await.unwrap();
        assert!(matches!(node.start().await, Err(NodeError::AlreadyStarted)));
    }

    #[tokio::test]
    async fn run_exits_when_handles_dropped() {
        let (node, handle) = node(no_storage());
        drop(handle);
        tokio::time::timeout(Duration::from_secs(1), node.run())
            .await
            .expect("run should exit once every handle is gone");
    }

    #[tokio::test]
    async fn shutdown_stops_run_and_later_calls_fail() {
        let (node, handle) = node(no_storage());
        let task = tokio::spawn(node.run());
        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert!(matches!(
            handle.path(DestinationHash::new([1; 16])).await,
            Err(NodeError::NotRunning)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn clock_follows_tokio_time() {
        let clock = Clock::new();
        let before = clock.now();
        tokio::time::advance(Duration::from_secs(30)).await;
        let elapsed = clock.now() - before;
        assert!((elapsed - 30.0).abs() < 1e-6, "elapsed {elapsed}");
    }

    #[tokio::test]
    async fn attach_uses_configured_profile() {
        let mut config = no_storage();
        config.interfaces = NodeConfig::parse(
            "[[interfaces]]\nname = \"lora\"\nmode = \"access_point\"\nbitrate = 1200\n",
        )
        .unwrap()
        .interfaces;
        let (mut node, _handle) = node(config);
        let (tx, _rx) = mpsc::channel(4);
        let id = node.attach_interface("lora".into(), None, tx).unwrap();
        let state = node.engine.interfaces().get(id).unwrap();
        assert_eq!(state.info.bitrate, Some(1200));
        assert_eq!(
            state.info.mode,
            reticulum_transport::InterfaceMode::AccessPoint
        );
    }

    #[tokio::test]
    async fn transmit_to_closed_interface_is_dropped() {
        let (mut node, _handle) = node(no_storage());
        let (tx, rx) = mpsc::channel(1);
        let id = node.attach_interface("eth0".into(), None, tx).unwrap();
        drop(rx);
        node.transmit(id, Bytes::from_static(b"frame"));
        node.transmit(InterfaceId(99), Bytes::from_static(b"frame"));
    }

    #[tokio::test]
    async fn full_interface_queue_drops_frames() {
        let (mut node, _handle) = node(no_storage());
        let (tx, mut rx) = mpsc::channel(1);
        let id = node.attach_interface("eth0".into(), None, tx).unwrap();
        node.transmit(id, Bytes::from_static(b"first"));
        node.transmit(id, Bytes::from_static(b"second"));
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"first"));
        assert!(rx.try_recv().is_err());
    }
}
