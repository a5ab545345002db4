//! Outbound dispatch.

use bytes::Bytes;
use reticulum_core::announce::Announce;
use reticulum_core::constants::{DestinationType, HeaderType, PacketType};
use reticulum_core::destination::Destination;
use reticulum_core::packet::builder::Packet;
use reticulum_core::types::{DestinationHash, LinkId};

use super::{TransportEngine, transmit};
use crate::action::{Dispatch, TransportAction};
use crate::announce::queue::{QueueOutcome, QueuedAnnounce};
use crate::error::TransportError;
use crate::interface::{InterfaceId, InterfaceMode};
use crate::receipt::PacketReceipt;
use crate::router::inject_transport_header;

impl TransportEngine {
    /// Send a packed packet.
    ///
    /// Packets to a destination with a known path go out of the path's
    /// interface, rewritten to header 2 when the destination is more than
    /// one hop away. Everything else is broadcast on every eligible
    /// interface.
    pub fn outbound(&mut self, packet: &Packet, now: f64) -> Result<Dispatch, TransportError> {
        self.dispatch(packet, None, now)
    }

    /// Send a packed packet on one interface only.
    pub fn outbound_on(
        &mut self,
        packet: &Packet,
        interface: InterfaceId,
        now: f64,
    ) -> Result<Dispatch, TransportError> {
        if !self.interfaces.contains(interface) {
            return Err(TransportError::UnknownInterface(interface));
        }
        self.dispatch(packet, Some(interface), now)
    }

    /// Pack `packet` for `destination` and send it. The destination's
    /// identity is remembered so proofs from it can be checked.
    pub fn send(
        &mut self,
        destination: &Destination,
        mut packet: Packet,
        now: f64,
    ) -> Result<Dispatch, TransportError> {
        if destination.dtype() == DestinationType::Single
            && let Some(identity) = destination.identity()
            && !self.known.contains_key(destination.hash())
        {
            self.remember_identity(*destination.hash(), identity.clone(), None, now);
        }
        packet.pack(Some(destination))?;
        self.outbound(&packet, now)
    }

    pub(super) fn dispatch(
        &mut self,
        packet: &Packet,
        attached: Option<InterfaceId>,
        now: f64,
    ) -> Result<Dispatch, TransportError> {
        let raw = packet.raw().cloned().ok_or(TransportError::NotPacked)?;
        let packet_hash = packet.packet_hash().ok_or(TransportError::NotPacked)?;
        let destination = packet.destination().ok_or(TransportError::NotPacked)?;
        let destination_type = packet.destination_type();
        let mut dispatch = Dispatch {
            packet_hash: Some(packet_hash),
            ..Dispatch::default()
        };

        let routed = packet.packet_type != PacketType::Announce
            && !matches!(
                destination_type,
                DestinationType::Plain | DestinationType::Group
            )
            && attached.is_none()
            && self.paths.has_path(&destination, now);

        if routed {
            self.send_along_path(packet, raw, destination, now, &mut dispatch.actions)?;
            dispatch.sent = true;
            self.hashlist.insert(packet_hash);
        } else {
            dispatch.sent =
                self.broadcast(packet, raw, destination, attached, now, &mut dispatch.actions)?;
            if dispatch.sent {
                self.hashlist.insert(packet_hash);
            }
        }

        if dispatch.sent && wants_receipt(packet) {
            let hops = self.paths.hops_to(&destination, now);
            let receipt = PacketReceipt::new(packet_hash, destination, now, hops);
            if let Some(culled) = self.receipts.add(receipt) {
                dispatch.actions.push(TransportAction::ReceiptFailed {
                    packet_hash: culled.hash,
                    destination: culled.destination,
                    status: culled.status,
                });
            }
            dispatch.receipt = true;
        }

        tracing::trace!(
            destination = %destination,
            packet_type = ?packet.packet_type,
            sent = dispatch.sent,
            "outbound"
        );
        Ok(dispatch)
    }

    fn send_along_path(
        &mut self,
        packet: &Packet,
        raw: Bytes,
        destination: DestinationHash,
        now: f64,
        actions: &mut Vec<TransportAction>,
    ) -> Result<(), TransportError> {
        let Some(entry) = self.paths.get(&destination) else {
            return Ok(());
        };
        let interface = entry.receiving_interface;
        let via_relay = entry.hops > 1 || (entry.hops == 1 && self.config.connected_to_shared_instance);

        if via_relay {
            let frame = if packet.header_type == HeaderType::Header1 {
                inject_transport_header(&packet.to_raw_packet()?, entry.next_hop).serialize()
            } else {
                raw
            };
            transmit(actions, interface, frame);
            let mode = self.interfaces.mode(interface).unwrap_or_default();
            if let Some(entry) = self.paths.get_mut(&destination) {
                entry.refresh_timestamp(now, mode);
            }
        } else {
            transmit(actions, interface, raw);
        }
        Ok(())
    }

    fn broadcast(
        &mut self,
        packet: &Packet,
        raw: Bytes,
        destination: DestinationHash,
        attached: Option<InterfaceId>,
        now: f64,
        actions: &mut Vec<TransportAction>,
    ) -> Result<bool, TransportError> {
        let link_interface = (packet.destination_type() == DestinationType::Link)
            .then(|| self.active_links.get(&LinkId::from(destination)).copied());
        let is_announce = packet.packet_type == PacketType::Announce;
        let local_destination = self.destinations.contains_key(&destination);
        let emitted = if is_announce {
            packet
                .to_raw_packet()
                .ok()
                .and_then(|raw| Announce::from_packet(&raw).ok())
                .map_or(0, |a| a.emitted())
        } else {
            0
        };

        let mut sent = false;
        for id in self.outbound_interfaces() {
            if let Some(link_interface) = link_interface
                && link_interface != Some(id)
            {
                continue;
            }
            if attached.is_some_and(|a| a != id) {
                continue;
            }
            if is_announce {
                if attached.is_none()
                    && !self.announce_allowed_by_mode(id, &destination, local_destination, now)
                {
                    continue;
                }
                let queued = QueuedAnnounce {
                    destination,
                    time: now,
                    hops: packet.hops,
                    emitted,
                    raw: raw.clone(),
                };
                if !self.admit_announce(id, queued, now) {
                    continue;
                }
            }
            transmit(actions, id, raw.clone());
            sent = true;
        }
        Ok(sent)
    }

    /// Interface-mode rules for broadcasting announces.
    ///
    /// Access points never broadcast announces. Roaming and boundary
    /// interfaces carry our own announces, and others only when the path
    /// was not itself learned on a roaming (or, for roaming, a boundary)
    /// interface.
    fn announce_allowed_by_mode(
        &self,
        interface: InterfaceId,
        destination: &DestinationHash,
        local_destination: bool,
        now: f64,
    ) -> bool {
        let Some(mode) = self.interfaces.mode(interface) else {
            return false;
        };
        match mode {
            InterfaceMode::AccessPoint => false,
            InterfaceMode::Roaming | InterfaceMode::Boundary => {
                if local_destination {
                    return true;
                }
                let from = self
                    .paths
                    .next_hop_interface(destination, now)
                    .and_then(|id| self.interfaces.mode(id));
                match (mode, from) {
                    (_, None) => false,
                    (_, Some(InterfaceMode::Roaming)) => false,
                    (InterfaceMode::Roaming, Some(InterfaceMode::Boundary)) => false,
                    _ => true,
                }
            }
            _ => true,
        }
    }

    /// Enforce the announce bandwidth cap. Returns whether the announce may
    /// go out now; otherwise it waits in the interface's queue.
    fn admit_announce(&mut self, interface: InterfaceId, announce: QueuedAnnounce, now: f64) -> bool {
        let Some(state) = self.interfaces.get_mut(interface) else {
            return false;
        };
        let Some(wait) = state.info.announce_wait(announce.raw.len()) else {
            return true;
        };
        if state.announce_queue.is_empty() && now >= state.announce_allowed_at {
            state.announce_allowed_at = now + wait;
            return true;
        }
        let destination = announce.destination;
        match state.announce_queue.push(announce) {
            QueueOutcome::Full => {
                tracing::debug!(interface = %interface, "announce queue full, dropping announce");
            }
            outcome => {
                tracing::trace!(interface = %interface, destination = %destination, ?outcome, "announce queued");
            }
        }
        false
    }
}

/// Receipts watch DATA to SINGLE destinations, outside link and resource
/// signalling.
fn wants_receipt(packet: &Packet) -> bool {
    packet.packet_type == PacketType::Data
        && packet.destination_type() == DestinationType::Single
        && !packet.context.is_link_internal()
        && !packet.context.is_resource_internal()
}
