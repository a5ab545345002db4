//! What the engine asks its host to do.
//!
//! The engine never performs I/O. Every entry point returns a list of
//! actions; the host transmits, delivers and persists in order.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use reticulum_core::identity::Identity;
use reticulum_core::packet::context::ContextType;
use reticulum_core::packet::wire::RawPacket;
use reticulum_core::types::{DestinationHash, LinkId, NameHash, PacketHash};

use crate::interface::InterfaceId;
use crate::receipt::ReceiptStatus;

#[derive(Clone)]
pub enum TransportAction {
    /// Send raw bytes out of one interface.
    Transmit { interface: InterfaceId, raw: Bytes },

    /// A decrypted packet for a registered destination.
    DeliverPacket {
        destination: DestinationHash,
        packet_hash: PacketHash,
        context: ContextType,
        data: Bytes,
        interface: InterfaceId,
        /// The destination proves on application request; answer with
        /// [`TransportEngine::prove`](crate::engine::TransportEngine::prove).
        proof_requested: bool,
    },

    /// A link request for a registered destination.
    DeliverLinkRequest {
        destination: DestinationHash,
        link_id: LinkId,
        packet: RawPacket,
        interface: InterfaceId,
    },

    /// Traffic for an active link terminating here.
    DeliverToLink {
        link_id: LinkId,
        packet: RawPacket,
        interface: InterfaceId,
    },

    /// The proof answering one of our pending link requests.
    DeliverLinkProof {
        link_id: LinkId,
        packet: RawPacket,
        interface: InterfaceId,
    },

    /// A valid announce that updated the path table.
    AnnounceReceived {
        destination: DestinationHash,
        identity: Arc<dyn Identity>,
        name_hash: NameHash,
        app_data: Option<Bytes>,
        hops: u8,
        interface: InterfaceId,
        /// Sent in answer to a path request.
        path_response: bool,
    },

    ReceiptDelivered {
        packet_hash: PacketHash,
        destination: DestinationHash,
    },

    /// Timed out or culled. Emitted once per receipt.
    ReceiptFailed {
        packet_hash: PacketHash,
        destination: DestinationHash,
        status: ReceiptStatus,
    },

    /// Keep this announce on disk; it backs a path.
    CachePacket { packet_hash: PacketHash, raw: Bytes },

    /// The cached announce no longer backs any path.
    CacheEvicted { packet_hash: PacketHash },
}

impl fmt::Debug for TransportAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transmit { interface, raw } => f
                .debug_struct("Transmit")
                .field("interface", interface)
                .field("len", &raw.len())
                .finish(),
            Self::DeliverPacket {
                destination,
                packet_hash,
                proof_requested,
                ..
            } => f
                .debug_struct("DeliverPacket")
                .field("destination", destination)
                .field("packet_hash", packet_hash)
                .field("proof_requested", proof_requested)
                .finish(),
            Self::DeliverLinkRequest {
                destination,
                link_id,
                ..
            } => f
                .debug_struct("DeliverLinkRequest")
                .field("destination", destination)
                .field("link_id", link_id)
                .finish(),
            Self::DeliverToLink { link_id, .. } => {
                f.debug_struct("DeliverToLink").field("link_id", link_id).finish()
            }
            Self::DeliverLinkProof { link_id, .. } => f
                .debug_struct("DeliverLinkProof")
                .field("link_id", link_id)
                .finish(),
            Self::AnnounceReceived {
                destination,
                hops,
                path_response,
                ..
            } => f
                .debug_struct("AnnounceReceived")
                .field("destination", destination)
                .field("hops", hops)
                .field("path_response", path_response)
                .finish(),
            Self::ReceiptDelivered { packet_hash, .. } => f
                .debug_struct("ReceiptDelivered")
                .field("packet_hash", packet_hash)
                .finish(),
            Self::ReceiptFailed {
                packet_hash,
                status,
                ..
            } => f
                .debug_struct("ReceiptFailed")
                .field("packet_hash", packet_hash)
                .field("status", status)
                .finish(),
            Self::CachePacket { packet_hash, .. } => f
                .debug_struct("CachePacket")
                .field("packet_hash", packet_hash)
                .finish(),
            Self::CacheEvicted { packet_hash } => f
                .debug_struct("CacheEvicted")
                .field("packet_hash", packet_hash)
                .finish(),
        }
    }
}

/// Result of an outbound call.
#[derive(Debug, Default)]
pub struct Dispatch {
    /// At least one interface accepted the packet.
    pub sent: bool,
    /// A receipt is now watching for the packet's proof.
    pub receipt: bool,
    /// Hash of the packet as it was packed for sending.
    pub packet_hash: Option<PacketHash>,
    pub actions: Vec<TransportAction>,
}

/// Raw frames to transmit, in order, for tests and simple hosts.
pub fn transmissions(actions: &[TransportAction]) -> Vec<(InterfaceId, Bytes)> {
    actions
        .iter()
        .filter_map(|a| match a {
            TransportAction::Transmit { interface, raw } => Some((*interface, raw.clone())),
            _ => None,
        })
        .collect()
}
