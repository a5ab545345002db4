//! Proofs: generating our own, relaying others', and concluding receipts.

use reticulum_core::constants::{DestinationType, KEYSIZE, PacketType, SIGLENGTH};
use reticulum_core::destination::ProofDestination;
use reticulum_core::identity::Identity;
use reticulum_core::packet::builder::Packet;
use reticulum_core::packet::context::ContextType;
use reticulum_core::packet::wire::RawPacket;
use reticulum_core::types::{DestinationHash, LinkId, PacketHash, Signature, TruncatedHash};

use super::{TransportEngine, transmit};
use crate::action::TransportAction;
use crate::error::TransportError;
use crate::interface::InterfaceId;
use crate::path::PATHFINDER_M;
use crate::receipt::build_proof;

/// Half of a link key: the X25519 part of a link proof, or the Ed25519
/// half of an identity key.
const LINK_KEY_HALF: usize = KEYSIZE / 2;
/// Optional link MTU signalling appended to a link proof.
const LINK_SIGNALLING_SIZE: usize = 3;

/// Check a link request proof against the destination's identity.
///
/// The proof carries `signature(64) || link_public_key(32) [|| signalling(3)]`
/// and signs `link_id || link_public_key || identity_signing_key [|| signalling]`.
pub fn validate_link_proof(link_id: &LinkId, data: &[u8], identity: &dyn Identity) -> bool {
    let bare = SIGLENGTH + LINK_KEY_HALF;
    if data.len() != bare && data.len() != bare + LINK_SIGNALLING_SIZE {
        return false;
    }
    let Ok(signature) = Signature::try_from(&data[..SIGLENGTH]) else {
        return false;
    };
    let public_key = identity.public_key();
    let mut signed = Vec::with_capacity(16 + LINK_KEY_HALF * 2 + LINK_SIGNALLING_SIZE);
    signed.extend_from_slice(link_id.as_ref());
    signed.extend_from_slice(&data[SIGLENGTH..bare]);
    signed.extend_from_slice(&public_key[LINK_KEY_HALF..]);
    signed.extend_from_slice(&data[bare..]);
    identity.verify(&signed, &signature)
}

impl TransportEngine {
    /// Prove receipt of `packet_hash` on behalf of a registered destination,
    /// sending the proof back on `interface`.
    pub fn prove(
        &mut self,
        destination: &DestinationHash,
        packet_hash: &PacketHash,
        interface: InterfaceId,
        now: f64,
    ) -> Result<Vec<TransportAction>, TransportError> {
        let identity = self
            .destinations
            .get(destination)
            .and_then(|local| local.destination.identity().cloned())
            .ok_or(TransportError::UnknownDestination(*destination))?;
        let mut actions = Vec::new();
        self.send_proof(identity.as_ref(), packet_hash, interface, now, &mut actions)?;
        Ok(actions)
    }

    /// Proof sending for inbound handling, where failure is only logged.
    pub(super) fn prove_with(
        &mut self,
        identity: &dyn Identity,
        packet_hash: &PacketHash,
        interface: InterfaceId,
        now: f64,
        actions: &mut Vec<TransportAction>,
    ) {
        if let Err(err) = self.send_proof(identity, packet_hash, interface, now, actions) {
            tracing::warn!(packet_hash = %packet_hash, %err, "could not send proof");
        }
    }

    fn send_proof(
        &mut self,
        identity: &dyn Identity,
        packet_hash: &PacketHash,
        interface: InterfaceId,
        now: f64,
        actions: &mut Vec<TransportAction>,
    ) -> Result<(), TransportError> {
        let proof = build_proof(identity, packet_hash, self.config.use_implicit_proof)?;
        let mut packet = Packet::new(PacketType::Proof, ContextType::None, proof);
        packet.pack(Some(&ProofDestination::for_packet(packet_hash)))?;
        tracing::trace!(packet_hash = %packet_hash, interface = %interface, "sending proof");
        actions.extend(self.dispatch(&packet, Some(interface), now)?.actions);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn inbound_proof(
        &mut self,
        packet: RawPacket,
        packet_hash: PacketHash,
        interface: InterfaceId,
        from_local_client: bool,
        for_local_client_link: bool,
        now: f64,
        actions: &mut Vec<TransportAction>,
    ) {
        match packet.context {
            ContextType::Lrproof => self.inbound_link_proof(
                packet,
                packet_hash,
                interface,
                from_local_client,
                for_local_client_link,
                actions,
            ),
            ContextType::ResourcePrf => {
                let link_id = LinkId::from(packet.destination);
                if self.active_links.contains_key(&link_id) {
                    actions.push(TransportAction::DeliverToLink {
                        link_id,
                        packet,
                        interface,
                    });
                }
            }
            _ => self.inbound_delivery_proof(packet, interface, from_local_client, now, actions),
        }
    }

    fn inbound_link_proof(
        &mut self,
        packet: RawPacket,
        packet_hash: PacketHash,
        interface: InterfaceId,
        from_local_client: bool,
        for_local_client_link: bool,
        actions: &mut Vec<TransportAction>,
    ) {
        let link_id = LinkId::from(packet.destination);
        let relays = self.config.enable_transport || for_local_client_link || from_local_client;

        if relays && let Some(entry) = self.links.get(&link_id).copied() {
            if packet.hops != entry.remaining_hops || interface != entry.next_hop_interface {
                tracing::trace!(link_id = %link_id, hops = packet.hops, "link proof off its path");
                return;
            }
            let Some(identity) = self.recall_identity(&entry.destination) else {
                tracing::debug!(link_id = %link_id, "no identity to check link proof against");
                return;
            };
            if !validate_link_proof(&link_id, &packet.data, identity.as_ref()) {
                tracing::debug!(link_id = %link_id, "invalid link proof dropped");
                return;
            }
            self.hashlist.insert(packet_hash);
            if let Some(entry) = self.links.get_mut(&link_id) {
                entry.validated = true;
            }
            tracing::debug!(link_id = %link_id, to = %entry.received_interface, "relaying link proof");
            transmit(actions, entry.received_interface, packet.serialize());
            return;
        }

        let Some(pending) = self.pending_links.get(&link_id) else {
            return;
        };
        if packet.hops == pending.expected_hops || pending.expected_hops == PATHFINDER_M {
            self.hashlist.insert(packet_hash);
            actions.push(TransportAction::DeliverLinkProof {
                link_id,
                packet,
                interface,
            });
        }
    }

    fn inbound_delivery_proof(
        &mut self,
        packet: RawPacket,
        interface: InterfaceId,
        from_local_client: bool,
        now: f64,
        actions: &mut Vec<TransportAction>,
    ) {
        let proven = TruncatedHash::from(packet.destination);

        let for_local_client = self
            .reverse
            .get(&proven)
            .is_some_and(|entry| self.interfaces.is_local_client(entry.receiving_interface));
        if (self.config.enable_transport || from_local_client || for_local_client)
            && let Some(entry) = self.reverse.take(&proven)
        {
            if interface == entry.outbound_interface {
                tracing::trace!(to = %entry.receiving_interface, "relaying proof along reverse path");
                transmit(actions, entry.receiving_interface, packet.serialize());
            } else {
                tracing::trace!(interface = %interface, "proof arrived off its reverse path");
            }
        }

        if packet.flags.destination_type == DestinationType::Link {
            let link_id = LinkId::from(packet.destination);
            if self.active_links.contains_key(&link_id) {
                actions.push(TransportAction::DeliverToLink {
                    link_id,
                    packet,
                    interface,
                });
            }
            return;
        }

        let Some(destination) = self.receipts.find(&proven).map(|r| r.destination) else {
            return;
        };
        let Some(identity) = self.recall_identity(&destination) else {
            tracing::debug!(destination = %destination, "no identity to check proof against");
            return;
        };
        if let Some(receipt) = self.receipts.prove(&proven, &packet.data, identity.as_ref()) {
            tracing::debug!(packet_hash = %receipt.hash, rtt = now - receipt.sent_at, "packet delivered");
            actions.push(TransportAction::ReceiptDelivered {
                packet_hash: receipt.hash,
                destination: receipt.destination,
            });
        }
    }
}
