//! Inbound processing: filter, relay, then local handling by packet type.

use bytes::Bytes;
use reticulum_core::constants::{DestinationType, PacketType};
use reticulum_core::destination::ProofStrategy;
use reticulum_core::packet::context::ContextType;
use reticulum_core::packet::wire::RawPacket;
use reticulum_core::types::{LinkId, PacketHash};

use super::filter::packet_filter;
use super::{TransportEngine, transmit};
use crate::action::TransportAction;
use crate::interface::InterfaceId;
use crate::router::{LinkEntry, ReverseEntry, replace_transport_id, strip_transport_header};

impl TransportEngine {
    /// Process a frame received on `interface`.
    ///
    /// Malformed, filtered and unroutable frames are dropped with a log
    /// line; inbound traffic never produces an error.
    pub fn inbound(&mut self, raw: Bytes, interface: InterfaceId, now: f64) -> Vec<TransportAction> {
        let mut actions = Vec::new();
        let Some(state) = self.interfaces.get(interface) else {
            tracing::debug!(interface = %interface, "frame from unknown interface dropped");
            return actions;
        };
        if !state.info.inbound {
            return actions;
        }
        let hop_counted = !state.is_local();

        let mut packet = match RawPacket::parse_bytes(raw) {
            Ok(packet) => packet,
            Err(err) => {
                tracing::debug!(interface = %interface, %err, "malformed frame dropped");
                return actions;
            }
        };
        if hop_counted {
            packet.hops = packet.hops.saturating_add(1);
        }

        let packet_hash = packet.packet_hash();
        let verdict = packet_filter(&packet, &self.transport_id, self.hashlist.contains(&packet_hash));
        if !verdict.accepted() {
            tracing::trace!(
                interface = %interface,
                destination = %packet.destination,
                ?verdict,
                "packet filtered"
            );
            return actions;
        }

        let link_id = LinkId::from(packet.destination);
        let deferred_hash = self.links.contains(&link_id)
            || (packet.flags.packet_type == PacketType::Proof
                && packet.context == ContextType::Lrproof);
        if !deferred_hash {
            self.hashlist.insert(packet_hash);
        }

        let from_local_client = self.interfaces.is_local_client(interface);
        self.relay_plain_broadcast(&packet, interface, &mut actions);

        let for_local_client = packet.flags.packet_type != PacketType::Announce
            && self
                .paths
                .get(&packet.destination)
                .is_some_and(|entry| entry.hops == 0);
        let for_local_client_link = self.links.get(&link_id).is_some_and(|entry| {
            self.interfaces.is_local_client(entry.next_hop_interface)
                || self.interfaces.is_local_client(entry.received_interface)
        });

        if self.config.enable_transport || from_local_client || for_local_client || for_local_client_link
        {
            self.forward_transported(&packet, interface, now, &mut actions);
            self.forward_on_link(&packet, packet_hash, interface, now, &mut actions);
        }

        match packet.flags.packet_type {
            PacketType::Announce => {
                self.inbound_announce(packet, packet_hash, interface, from_local_client, now, &mut actions);
            }
            PacketType::LinkRequest => self.inbound_link_request(packet, interface, &mut actions),
            PacketType::Data => self.inbound_data(packet, packet_hash, interface, now, &mut actions),
            PacketType::Proof => self.inbound_proof(
                packet,
                packet_hash,
                interface,
                from_local_client,
                for_local_client_link,
                now,
                &mut actions,
            ),
        }
        actions
    }

    /// PLAIN broadcasts that passed the filter go out once more on every
    /// other out-capable interface, local clients included. The hop limit
    /// in the filter stops them a hop later. Control traffic is handled by
    /// its own handlers instead.
    fn relay_plain_broadcast(
        &self,
        packet: &RawPacket,
        interface: InterfaceId,
        actions: &mut Vec<TransportAction>,
    ) {
        if packet.flags.destination_type != DestinationType::Plain
            || packet.flags.packet_type == PacketType::Announce
            || packet.transport_id.is_some()
            || self.is_control_destination(&packet.destination)
        {
            return;
        }
        let targets: Vec<InterfaceId> = self
            .outbound_interfaces()
            .into_iter()
            .filter(|id| *id != interface)
            .collect();
        if targets.is_empty() {
            return;
        }
        let raw = packet.serialize();
        for id in targets {
            transmit(actions, id, raw.clone());
        }
    }

    /// Relay a packet addressed through us toward its destination.
    fn forward_transported(
        &mut self,
        packet: &RawPacket,
        interface: InterfaceId,
        now: f64,
        actions: &mut Vec<TransportAction>,
    ) {
        if packet.flags.packet_type == PacketType::Announce
            || packet.transport_id != Some(self.transport_id)
        {
            return;
        }
        let Some(entry) = self.paths.get(&packet.destination) else {
            tracing::debug!(destination = %packet.destination, "no path for transported packet, dropping");
            return;
        };
        let next_hop = entry.next_hop;
        let remaining_hops = entry.hops;
        let outbound = entry.receiving_interface;

        let relayed = match remaining_hops {
            0 => packet.clone(),
            1 => strip_transport_header(packet, packet.hops),
            _ => replace_transport_id(packet, next_hop, packet.hops),
        };

        if packet.flags.packet_type == PacketType::LinkRequest {
            self.links.insert(
                packet.link_id(),
                LinkEntry::new(
                    now,
                    next_hop,
                    outbound,
                    remaining_hops,
                    interface,
                    packet.hops,
                    packet.destination,
                ),
            );
        } else {
            self.reverse.insert(
                packet.truncated_hash(),
                ReverseEntry {
                    receiving_interface: interface,
                    outbound_interface: outbound,
                    timestamp: now,
                },
            );
        }

        tracing::trace!(
            destination = %packet.destination,
            from = %interface,
            to = %outbound,
            remaining_hops,
            "relaying packet"
        );
        transmit(actions, outbound, relayed.serialize());

        let mode = self.interfaces.mode(outbound).unwrap_or_default();
        if let Some(entry) = self.paths.get_mut(&packet.destination) {
            entry.refresh_timestamp(now, mode);
        }
    }

    /// Carry traffic for a link relayed through us.
    fn forward_on_link(
        &mut self,
        packet: &RawPacket,
        packet_hash: PacketHash,
        interface: InterfaceId,
        now: f64,
        actions: &mut Vec<TransportAction>,
    ) {
        if matches!(
            packet.flags.packet_type,
            PacketType::Announce | PacketType::LinkRequest
        ) || packet.context == ContextType::Lrproof
        {
            return;
        }
        let link_id = LinkId::from(packet.destination);
        let Some(entry) = self.links.get_mut(&link_id) else {
            return;
        };
        let Some(outbound) = entry.forward_interface(interface, packet.hops) else {
            tracing::trace!(link_id = %link_id, interface = %interface, "link packet on unexpected interface");
            return;
        };
        entry.timestamp = now;
        self.hashlist.insert(packet_hash);
        transmit(actions, outbound, packet.serialize());
    }

    fn inbound_link_request(
        &mut self,
        packet: RawPacket,
        interface: InterfaceId,
        actions: &mut Vec<TransportAction>,
    ) {
        if packet.transport_id.is_some_and(|tid| tid != self.transport_id) {
            return;
        }
        let Some(local) = self.destinations.get(&packet.destination) else {
            return;
        };
        if local.destination.dtype() != packet.flags.destination_type {
            return;
        }
        actions.push(TransportAction::DeliverLinkRequest {
            destination: packet.destination,
            link_id: packet.link_id(),
            packet,
            interface,
        });
    }

    fn inbound_data(
        &mut self,
        packet: RawPacket,
        packet_hash: PacketHash,
        interface: InterfaceId,
        now: f64,
        actions: &mut Vec<TransportAction>,
    ) {
        if packet.flags.destination_type == DestinationType::Link {
            let link_id = LinkId::from(packet.destination);
            match self.active_links.get(&link_id) {
                Some(attached) if *attached == interface => {
                    if packet.context == ContextType::CacheRequest {
                        self.answer_cache_request(&packet, interface, actions);
                    } else {
                        actions.push(TransportAction::DeliverToLink {
                            link_id,
                            packet,
                            interface,
                        });
                    }
                }
                Some(_) => {
                    tracing::trace!(link_id = %link_id, interface = %interface, "link data on wrong interface");
                }
                None => {}
            }
            return;
        }

        if packet.destination == *self.path_request_destination.hash() {
            self.handle_path_request(&packet, interface, now, actions);
            return;
        }
        if packet.destination == *self.tunnel_synthesize_destination.hash() {
            if self.config.enable_transport {
                self.handle_tunnel_synthesis(&packet, interface, now, actions);
            }
            return;
        }

        let Some(local) = self.destinations.get(&packet.destination) else {
            return;
        };
        if local.destination.dtype() != packet.flags.destination_type {
            return;
        }
        if packet.context == ContextType::CacheRequest {
            self.answer_cache_request(&packet, interface, actions);
            return;
        }

        let data = match local.destination.decrypt(&packet.data) {
            Ok(data) => Bytes::from(data),
            Err(err) => {
                tracing::debug!(destination = %packet.destination, %err, "could not decrypt packet");
                return;
            }
        };
        let strategy = local.destination.proof_strategy;
        let identity = local.destination.identity().cloned();

        if strategy == ProofStrategy::All
            && let Some(identity) = identity
        {
            self.prove_with(identity.as_ref(), &packet_hash, interface, now, actions);
        }

        actions.push(TransportAction::DeliverPacket {
            destination: packet.destination,
            packet_hash,
            context: packet.context,
            data,
            interface,
            proof_requested: strategy == ProofStrategy::App,
        });
    }

    /// Answer a cache request with the cached packet, sent back the way
    /// the request came.
    fn answer_cache_request(
        &self,
        packet: &RawPacket,
        interface: InterfaceId,
        actions: &mut Vec<TransportAction>,
    ) {
        let Ok(requested) = PacketHash::try_from(packet.data.as_ref()) else {
            return;
        };
        match self.cache.get(&requested) {
            Some(raw) => transmit(actions, interface, raw.clone()),
            None => tracing::trace!(packet_hash = %requested, "cache request for unknown packet"),
        }
    }
}
