//! The engine's view of network interfaces.
//!
//! Interfaces live in an arena and are referred to by [`InterfaceId`]. The
//! engine never touches a driver; it only needs to know what an interface
//! is allowed to do and how fast it is.

use std::fmt;
use std::str::FromStr;

use reticulum_core::hash::full_hash;
use reticulum_core::types::{FullHash, TunnelId};
use serde::{Deserialize, Serialize};

use crate::announce::queue::AnnounceQueue;
use crate::announce::constants::ANNOUNCE_CAP;
use crate::error::PathError;
use crate::path::constants::{AP_PATH_TIME, PATHFINDER_E, ROAMING_PATH_TIME};

/// Handle to a registered interface. Handles are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceId(pub u32);

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "if#{}", self.0)
    }
}

/// Interface operating mode. Determines path lifetime and announce policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceMode {
    #[default]
    Full,
    PointToPoint,
    AccessPoint,
    Roaming,
    Boundary,
    Gateway,
}

impl InterfaceMode {
    /// How long a path learned on this interface stays valid, in seconds.
    pub fn path_ttl(&self) -> f64 {
        match self {
            InterfaceMode::AccessPoint => AP_PATH_TIME,
            InterfaceMode::Roaming => ROAMING_PATH_TIME,
            InterfaceMode::Full
            | InterfaceMode::PointToPoint
            | InterfaceMode::Boundary
            | InterfaceMode::Gateway => PATHFINDER_E,
        }
    }

    /// Whether unknown-path requests arriving here trigger recursive discovery.
    pub fn discovers_paths(&self) -> bool {
        matches!(
            self,
            InterfaceMode::AccessPoint | InterfaceMode::Gateway | InterfaceMode::Roaming
        )
    }
}

impl FromStr for InterfaceMode {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" | "default" => Ok(InterfaceMode::Full),
            "point_to_point" | "ptp" => Ok(InterfaceMode::PointToPoint),
            "access_point" | "ap" => Ok(InterfaceMode::AccessPoint),
            "roaming" => Ok(InterfaceMode::Roaming),
            "boundary" => Ok(InterfaceMode::Boundary),
            "gateway" | "gw" => Ok(InterfaceMode::Gateway),
            _ => Err(PathError::InvalidInterfaceMode(s.to_string())),
        }
    }
}

/// Where an interface sits relative to this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceRole {
    /// An ordinary link to the mesh.
    #[default]
    Network,
    /// A program attached to this node as a shared instance.
    LocalClient,
    /// This node's own uplink to a shared instance.
    SharedInstance,
}

/// Ingress announce rate control for one interface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnounceRateConfig {
    /// Minimum seconds between announces for one destination.
    pub target: f64,
    /// Violations tolerated before blocking.
    #[serde(default)]
    pub grace: u32,
    /// Extra seconds added to the block.
    #[serde(default)]
    pub penalty: f64,
}

/// What the engine knows about an interface.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceInfo {
    pub name: String,
    /// Accepts inbound traffic.
    pub inbound: bool,
    /// May be transmitted on.
    pub outbound: bool,
    pub mode: InterfaceMode,
    pub role: InterfaceRole,
    /// Bits per second. `None` disables the announce bandwidth cap.
    pub bitrate: Option<u64>,
    /// Share of bandwidth announces may use.
    pub announce_cap: f64,
    pub announce_rate: Option<AnnounceRateConfig>,
    /// Synthesize a tunnel over this interface when it comes up.
    pub wants_tunnel: bool,
}

impl InterfaceInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inbound: true,
            outbound: true,
            mode: InterfaceMode::Full,
            role: InterfaceRole::Network,
            bitrate: None,
            announce_cap: ANNOUNCE_CAP,
            announce_rate: None,
            wants_tunnel: false,
        }
    }

    pub fn with_mode(mut self, mode: InterfaceMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_role(mut self, role: InterfaceRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_bitrate(mut self, bitrate: u64) -> Self {
        self.bitrate = Some(bitrate);
        self
    }

    pub fn with_announce_rate(mut self, rate: AnnounceRateConfig) -> Self {
        self.announce_rate = Some(rate);
        self
    }

    pub fn receive_only(mut self) -> Self {
        self.outbound = false;
        self
    }

    /// Identifies the interface in tunnel synthesis.
    pub fn interface_hash(&self) -> FullHash {
        full_hash(self.name.as_bytes())
    }

    /// Seconds of airtime budget consumed by an announce of `len` bytes.
    pub fn announce_wait(&self, len: usize) -> Option<f64> {
        let bitrate = self.bitrate.filter(|b| *b > 0)? as f64;
        Some(compute_announce_wait_time(len, bitrate, self.announce_cap))
    }
}

/// `(size_bits / bitrate) / cap`
pub fn compute_announce_wait_time(size_bytes: usize, bitrate: f64, cap: f64) -> f64 {
    let size_bits = (size_bytes * 8) as f64;
    (size_bits / bitrate) / cap
}

/// Per-interface state the engine keeps next to [`InterfaceInfo`].
#[derive(Debug)]
pub struct InterfaceState {
    pub info: InterfaceInfo,
    /// No announce may leave before this time.
    pub announce_allowed_at: f64,
    pub announce_queue: AnnounceQueue,
    pub tunnel_id: Option<TunnelId>,
}

impl InterfaceState {
    fn new(info: InterfaceInfo) -> Self {
        Self {
            info,
            announce_allowed_at: 0.0,
            announce_queue: AnnounceQueue::new(),
            tunnel_id: None,
        }
    }

    pub fn is_local_client(&self) -> bool {
        self.info.role == InterfaceRole::LocalClient
    }

    /// Traffic on this interface is not hop-counted.
    pub fn is_local(&self) -> bool {
        self.info.role != InterfaceRole::Network
    }
}

/// Arena of registered interfaces.
#[derive(Debug, Default)]
pub struct InterfaceRegistry {
    slots: Vec<Option<InterfaceState>>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, info: InterfaceInfo) -> InterfaceId {
        let id = InterfaceId(self.slots.len() as u32);
        self.slots.push(Some(InterfaceState::new(info)));
        id
    }

    pub fn remove(&mut self, id: InterfaceId) -> Option<InterfaceState> {
        self.slots.get_mut(id.0 as usize)?.take()
    }

    pub fn get(&self, id: InterfaceId) -> Option<&InterfaceState> {
        self.slots.get(id.0 as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, id: InterfaceId) -> Option<&mut InterfaceState> {
        self.slots.get_mut(id.0 as usize)?.as_mut()
    }

    pub fn contains(&self, id: InterfaceId) -> bool {
        self.get(id).is_some()
    }

    pub fn find_by_name(&self, name: &str) -> Option<InterfaceId> {
        self.iter()
            .find(|(_, state)| state.info.name == name)
            .map(|(id, _)| id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (InterfaceId, &InterfaceState)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|s| (InterfaceId(i as u32), s)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (InterfaceId, &mut InterfaceState)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|s| (InterfaceId(i as u32), s)))
    }

    pub fn is_local_client(&self, id: InterfaceId) -> bool {
        self.get(id).is_some_and(InterfaceState::is_local_client)
    }

    pub fn local_clients(&self) -> Vec<InterfaceId> {
        self.iter()
            .filter(|(_, s)| s.is_local_client())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn has_local_clients(&self) -> bool {
        self.iter().any(|(_, s)| s.is_local_client())
    }

    pub fn mode(&self, id: InterfaceId) -> Option<InterfaceMode> {
        self.get(id).map(|s| s.info.mode)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
