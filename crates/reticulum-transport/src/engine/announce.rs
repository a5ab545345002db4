//! Announces: our own, and those heard from the network.

use bytes::Bytes;
use rand::{Rng, RngCore};
use reticulum_core::announce::{Announce, pack_announce_payload};
use reticulum_core::constants::DestinationType;
use reticulum_core::packet::builder::Packet;
use reticulum_core::packet::context::ContextType;
use reticulum_core::packet::wire::RawPacket;
use reticulum_core::types::{DestinationHash, PacketHash, RandomBlob};

use super::{KnownDestination, TransportEngine};
use crate::action::TransportAction;
use crate::announce::{AnnounceAction, AnnounceEntry, LOCAL_REBROADCASTS_MAX, PATHFINDER_R};
use crate::error::TransportError;
use crate::interface::InterfaceId;
use crate::path::{PATHFINDER_M, PR_TAG_WINDOW, PathEntry, PathState};
use crate::path_decision::{AnnounceCandidate, compute_announce_next_hop, decide_path_update};
use crate::router::TunnelPath;

impl TransportEngine {
    /// Announce a registered SINGLE destination on every eligible interface.
    /// `app_data` is kept and reused by path responses.
    pub fn announce(
        &mut self,
        destination: &DestinationHash,
        app_data: Option<Bytes>,
        now: f64,
    ) -> Result<Vec<TransportAction>, TransportError> {
        let local = self
            .destinations
            .get_mut(destination)
            .ok_or(TransportError::UnknownDestination(*destination))?;
        local.app_data = app_data;
        let packet = self.local_announce_packet(destination, ContextType::None, now)?;
        tracing::debug!(destination = %destination, "announcing destination");
        Ok(self.dispatch(&packet, None, now)?.actions)
    }

    fn local_announce_packet(
        &mut self,
        destination: &DestinationHash,
        context: ContextType,
        now: f64,
    ) -> Result<Packet, TransportError> {
        let random_blob = self.random_blob(now);
        let local = self
            .destinations
            .get(destination)
            .ok_or(TransportError::UnknownDestination(*destination))?;
        if local.destination.dtype() != DestinationType::Single {
            return Err(TransportError::CannotAnnounce(*destination));
        }
        let identity = local
            .destination
            .identity()
            .filter(|identity| identity.has_private_key())
            .ok_or(TransportError::CannotAnnounce(*destination))?;
        let name_hash = local
            .destination
            .name_hash()
            .copied()
            .ok_or(TransportError::CannotAnnounce(*destination))?;
        let announce = Announce::create(
            identity.as_ref(),
            name_hash,
            *destination,
            random_blob,
            local.app_data.clone(),
        )?;
        Ok(announce.pack(context)?)
    }

    fn random_blob(&mut self, now: f64) -> RandomBlob {
        let mut nonce = [0u8; 5];
        self.rng.fill_bytes(&mut nonce);
        RandomBlob::from_parts(nonce, now.max(0.0) as u64)
    }

    /// Answer a path request for one of our own destinations. Requests
    /// carrying the same tag within [`PR_TAG_WINDOW`] get the same announce.
    pub(super) fn announce_path_response(
        &mut self,
        destination: &DestinationHash,
        tag: Bytes,
        interface: InterfaceId,
        now: f64,
        actions: &mut Vec<TransportAction>,
    ) -> Result<(), TransportError> {
        let cached = {
            let local = self
                .destinations
                .get_mut(destination)
                .ok_or(TransportError::UnknownDestination(*destination))?;
            local
                .path_responses
                .retain(|_, (created, _)| now <= *created + PR_TAG_WINDOW);
            local.path_responses.get(&tag).map(|(_, payload)| payload.clone())
        };

        let payload = match cached {
            Some(payload) => payload,
            None => {
                let packet = self.local_announce_packet(destination, ContextType::PathResponse, now)?;
                let payload = packet.data.clone();
                if let Some(local) = self.destinations.get_mut(destination) {
                    local.path_responses.insert(tag, (now, payload.clone()));
                }
                payload
            }
        };

        let packet =
            pack_announce_payload(*destination, payload, ContextType::PathResponse, None, 0)?;
        tracing::debug!(destination = %destination, interface = %interface, "answering path request for local destination");
        actions.extend(self.dispatch(&packet, Some(interface), now)?.actions);
        Ok(())
    }

    pub(super) fn inbound_announce(
        &mut self,
        packet: RawPacket,
        packet_hash: PacketHash,
        interface: InterfaceId,
        from_local_client: bool,
        now: f64,
        actions: &mut Vec<TransportAction>,
    ) {
        let destination = packet.destination;
        if self.destinations.contains_key(&destination) {
            return;
        }

        let announce = match Announce::from_packet(&packet) {
            Ok(announce) => announce,
            Err(err) => {
                tracing::debug!(destination = %destination, %err, "malformed announce dropped");
                return;
            }
        };
        let identity = match announce.validate(self.resolver.as_ref()) {
            Ok(identity) => identity,
            Err(err) => {
                tracing::debug!(destination = %destination, %err, "invalid announce dropped");
                return;
            }
        };
        self.known.insert(
            destination,
            KnownDestination {
                identity: identity.clone(),
                app_data: announce.app_data.clone(),
                last_seen: now,
            },
        );

        let received_from = compute_announce_next_hop(&packet);
        if packet.transport_id.is_some() {
            self.note_rebroadcast(&destination, packet.hops.saturating_sub(1), now);
        }

        if packet.hops >= PATHFINDER_M {
            return;
        }

        let candidate = AnnounceCandidate {
            hops: packet.hops,
            random_blob: announce.random_blob,
        };
        let decision = decide_path_update(
            self.paths.get(&destination),
            &candidate,
            now,
            self.paths.is_unresponsive(&destination),
        );
        if !decision.accepts() {
            tracing::trace!(destination = %destination, hops = packet.hops, "announce did not improve path");
            return;
        }

        let path_response = packet.context == ContextType::PathResponse;
        let rate_blocked = !path_response
            && self
                .interfaces
                .get(interface)
                .and_then(|state| state.info.announce_rate)
                .is_some_and(|rate| self.announce_rates.check(destination, now, &rate));

        if (self.config.enable_transport || from_local_client) && !path_response {
            if rate_blocked {
                tracing::debug!(destination = %destination, "announce rate exceeded, not rebroadcasting");
            } else {
                let jitter = self.rng.r#gen::<f64>();
                let mut entry =
                    AnnounceEntry::new(now, jitter, received_from, packet.hops, packet.clone());
                if from_local_client {
                    entry.retransmit_timeout = now;
                    entry.retries = PATHFINDER_R;
                }
                self.announces.insert(destination, entry);
            }
        } else if from_local_client && path_response {
            if let Some((desiring, _)) = self.pending_local_path_requests.remove(&destination) {
                let mut entry =
                    AnnounceEntry::new(now, 0.0, received_from, packet.hops, packet.clone());
                entry.retries = PATHFINDER_R;
                entry.block_rebroadcasts = true;
                entry.attached_interface = Some(desiring);
                self.announces.insert(destination, entry);
            }
        }

        self.copy_to_local_clients(&packet, interface, from_local_client, now, actions);

        if let Some(request) = self.discovery.get(&destination).copied() {
            tracing::debug!(
                destination = %destination,
                interface = %request.requesting_interface,
                "answering waiting discovery path request"
            );
            self.send_relayed_announce(
                &packet,
                ContextType::PathResponse,
                Some(request.requesting_interface),
                now,
                actions,
            );
        }

        if !self.config.connected_to_shared_instance {
            let raw = packet.serialize();
            self.cache.insert_with_hash(packet_hash, raw.clone());
            actions.push(TransportAction::CachePacket { packet_hash, raw });
        }

        let mode = self.interfaces.mode(interface).unwrap_or_default();
        let mut random_blobs = self
            .paths
            .get(&destination)
            .map(PathEntry::random_blobs_to_vec)
            .unwrap_or_default();
        random_blobs.push(announce.random_blob);
        let entry = PathEntry::new(
            now,
            received_from,
            packet.hops,
            mode,
            random_blobs,
            interface,
            packet_hash,
        );

        if let Some(tunnel_id) = self.interfaces.get(interface).and_then(|state| state.tunnel_id) {
            self.tunnels
                .record_path(&tunnel_id, destination, TunnelPath::from_entry(&entry), now);
        }

        let replaced = self.paths.get(&destination).map(|old| old.packet_hash);
        let evicted = self.paths.insert(destination, entry);
        self.paths.set_state(destination, PathState::Unknown);
        for (_, old) in evicted {
            self.release_cached(old.packet_hash, actions);
        }
        if let Some(old) = replaced
            && old != packet_hash
        {
            self.release_cached(old, actions);
        }

        tracing::debug!(
            destination = %destination,
            hops = packet.hops,
            interface = %interface,
            ?decision,
            "path updated from announce"
        );
        actions.push(TransportAction::AnnounceReceived {
            destination,
            identity,
            name_hash: announce.name_hash,
            app_data: announce.app_data,
            hops: packet.hops,
            interface,
            path_response,
        });
    }

    /// A neighbour rebroadcast an announce we are waiting to rebroadcast.
    /// Enough of those, or one from further out while our retransmission is
    /// pending, means ours is no longer needed.
    fn note_rebroadcast(&mut self, destination: &DestinationHash, heard_hops: u8, now: f64) {
        let Some(entry) = self.announces.get_mut(destination) else {
            return;
        };
        if heard_hops == entry.hops {
            entry.local_rebroadcasts += 1;
            if entry.retries > 0 && entry.local_rebroadcasts >= LOCAL_REBROADCASTS_MAX {
                tracing::trace!(destination = %destination, "announce rebroadcast by neighbours, completed");
                self.announces.remove(destination);
                return;
            }
        }
        if heard_hops == entry.hops.saturating_add(1)
            && entry.retries > 0
            && now < entry.retransmit_timeout
        {
            tracing::trace!(destination = %destination, "announce passed on by next node, completed");
            self.announces.remove(destination);
        }
    }

    fn copy_to_local_clients(
        &mut self,
        packet: &RawPacket,
        interface: InterfaceId,
        from_local_client: bool,
        now: f64,
        actions: &mut Vec<TransportAction>,
    ) {
        let context = if from_local_client && packet.context == ContextType::PathResponse {
            ContextType::PathResponse
        } else {
            ContextType::None
        };
        for client in self.interfaces.local_clients() {
            if client != interface {
                self.send_relayed_announce(packet, context, Some(client), now, actions);
            }
        }
    }

    /// Rebuild `packet` as a header-2 announce under our transport id and
    /// send it.
    fn send_relayed_announce(
        &mut self,
        packet: &RawPacket,
        context: ContextType,
        attached: Option<InterfaceId>,
        now: f64,
        actions: &mut Vec<TransportAction>,
    ) {
        let rebuilt = pack_announce_payload(
            packet.destination,
            packet.data.clone(),
            context,
            Some(self.transport_id),
            packet.hops,
        );
        let result = match rebuilt {
            Ok(rebuilt) => self.dispatch(&rebuilt, attached, now),
            Err(err) => Err(err.into()),
        };
        match result {
            Ok(dispatch) => actions.extend(dispatch.actions),
            Err(err) => {
                tracing::warn!(destination = %packet.destination, %err, "could not relay announce");
            }
        }
    }

    /// Run due announce retransmissions.
    pub(super) fn retransmit_announces(&mut self, now: f64, actions: &mut Vec<TransportAction>) {
        let rng = &mut self.rng;
        let due = self.announces.process(now, || rng.r#gen::<f64>());
        for action in due {
            match action {
                AnnounceAction::Retransmit {
                    destination,
                    mut packet,
                    hops,
                    path_response,
                    attached_interface,
                } => {
                    tracing::debug!(
                        destination = %destination,
                        hops,
                        path_response,
                        "rebroadcasting announce"
                    );
                    packet.hops = hops;
                    let context = if path_response {
                        ContextType::PathResponse
                    } else {
                        ContextType::None
                    };
                    self.send_relayed_announce(&packet, context, attached_interface, now, actions);
                }
                AnnounceAction::Completed { destination } => {
                    tracing::trace!(destination = %destination, "announce retransmission completed");
                }
            }
        }
    }
}
