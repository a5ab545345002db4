//! Path discovery: answering, forwarding and issuing path requests.

use bytes::Bytes;
use rand::RngCore;
use reticulum_core::constants::{HEADER_MINSIZE, PacketType, TRUNCATED_HASHLENGTH};
use reticulum_core::packet::builder::Packet;
use reticulum_core::packet::context::ContextType;
use reticulum_core::packet::wire::RawPacket;
use reticulum_core::types::{DestinationHash, IdentityHash};

use super::TransportEngine;
use crate::action::TransportAction;
use crate::announce::{AnnounceEntry, PATHFINDER_R};
use crate::error::TransportError;
use crate::interface::{InterfaceId, InterfaceMode};
use crate::path::request::{ParseResult, build_path_request_data, parse_path_request_data};
use crate::path::{PATH_REQUEST_GRACE, PATH_REQUEST_RG};

impl TransportEngine {
    /// Ask the network for a path to `destination`, on one interface or on
    /// all of them.
    pub fn request_path(
        &mut self,
        destination: &DestinationHash,
        on_interface: Option<InterfaceId>,
        now: f64,
    ) -> Result<Vec<TransportAction>, TransportError> {
        let mut actions = Vec::new();
        self.send_path_request(destination, on_interface, None, false, now, &mut actions)?;
        Ok(actions)
    }

    /// Whether the automatic path request throttle allows a new request.
    pub fn path_request_allowed(&self, destination: &DestinationHash, now: f64) -> bool {
        self.path_requests.allows(destination, now)
    }

    /// Build and send a path request. Recursive requests, sent on behalf of
    /// others, respect the interface's announce cap and are skipped while
    /// announces wait.
    pub(super) fn send_path_request(
        &mut self,
        destination: &DestinationHash,
        on_interface: Option<InterfaceId>,
        tag: Option<Bytes>,
        recursive: bool,
        now: f64,
        actions: &mut Vec<TransportAction>,
    ) -> Result<(), TransportError> {
        let tag = tag.unwrap_or_else(|| {
            let mut tag = [0u8; TRUNCATED_HASHLENGTH];
            self.rng.fill_bytes(&mut tag);
            Bytes::copy_from_slice(&tag)
        });
        let transport_id = self.config.enable_transport.then_some(self.transport_id);
        let data = build_path_request_data(destination, transport_id.as_ref(), &tag);

        if recursive
            && let Some(id) = on_interface
            && let Some(state) = self.interfaces.get_mut(id)
        {
            if !state.announce_queue.is_empty() {
                tracing::debug!(destination = %destination, interface = %id, "recursive path request blocked by queued announces");
                return Ok(());
            }
            if now < state.announce_allowed_at {
                tracing::debug!(destination = %destination, interface = %id, "recursive path request blocked by announce cap");
                return Ok(());
            }
            if let Some(wait) = state.info.announce_wait(data.len() + HEADER_MINSIZE) {
                state.announce_allowed_at = now + wait;
            }
        }

        let mut packet = Packet::new(PacketType::Data, ContextType::None, data);
        packet.pack(Some(&self.path_request_destination))?;
        tracing::debug!(destination = %destination, interface = ?on_interface, recursive, "requesting path");
        actions.extend(self.dispatch(&packet, on_interface, now)?.actions);
        self.path_requests.record(*destination, now);
        Ok(())
    }

    fn forward_path_request(
        &mut self,
        destination: &DestinationHash,
        on_interface: InterfaceId,
        tag: Option<Bytes>,
        recursive: bool,
        now: f64,
        actions: &mut Vec<TransportAction>,
    ) {
        if let Err(err) =
            self.send_path_request(destination, Some(on_interface), tag, recursive, now, actions)
        {
            tracing::warn!(destination = %destination, interface = %on_interface, %err, "could not forward path request");
        }
    }

    pub(super) fn handle_path_request(
        &mut self,
        packet: &RawPacket,
        interface: InterfaceId,
        now: f64,
        actions: &mut Vec<TransportAction>,
    ) {
        let request = match parse_path_request_data(&packet.data) {
            ParseResult::Processed(request) => request,
            ParseResult::Tagless => {
                tracing::trace!(interface = %interface, "ignoring tagless path request");
                return;
            }
            ParseResult::TooShort => return,
        };
        if !self.pr_tags.insert(request.unique_tag()) {
            tracing::trace!(destination = %request.destination_hash, "ignoring duplicate path request");
            return;
        }
        let from_local_client = self.interfaces.is_local_client(interface);
        self.answer_path_request(
            request.destination_hash,
            from_local_client,
            interface,
            request.requesting_transport_id,
            request.tag,
            now,
            actions,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn answer_path_request(
        &mut self,
        destination: DestinationHash,
        from_local_client: bool,
        interface: InterfaceId,
        requestor: Option<IdentityHash>,
        tag: Bytes,
        now: f64,
        actions: &mut Vec<TransportAction>,
    ) {
        let mode = self.interfaces.mode(interface).unwrap_or_default();
        let should_search = self.config.enable_transport && mode.discovers_paths();

        let path_via_local_client = self
            .paths
            .get(&destination)
            .is_some_and(|entry| self.interfaces.is_local_client(entry.receiving_interface));
        if self.config.enable_transport && path_via_local_client {
            self.pending_local_path_requests.insert(destination, (interface, now));
        }

        if self.destinations.contains_key(&destination) {
            if let Err(err) = self.announce_path_response(&destination, tag, interface, now, actions) {
                tracing::warn!(destination = %destination, %err, "could not answer path request");
            }
            return;
        }

        if (self.config.enable_transport || from_local_client) && self.paths.contains(&destination) {
            self.answer_from_path_table(
                destination,
                from_local_client,
                path_via_local_client,
                interface,
                mode,
                requestor,
                now,
            );
            return;
        }

        if from_local_client {
            for id in self.outbound_interfaces() {
                if id != interface {
                    self.forward_path_request(&destination, id, None, false, now, actions);
                }
            }
            return;
        }

        if should_search {
            if !self.discovery.record(destination, interface, now) {
                tracing::trace!(destination = %destination, "already searching for path");
                return;
            }
            tracing::debug!(destination = %destination, interface = %interface, "searching for unknown path");
            for id in self.outbound_interfaces() {
                if id != interface {
                    self.forward_path_request(&destination, id, Some(tag.clone()), true, now, actions);
                }
            }
            return;
        }

        if self.interfaces.has_local_clients() {
            for id in self.interfaces.local_clients() {
                if id != interface {
                    self.forward_path_request(&destination, id, None, false, now, actions);
                }
            }
            return;
        }

        tracing::trace!(destination = %destination, "ignoring path request for unknown destination");
    }

    /// Schedule the cached announce behind a known path as a path response
    /// on the requesting interface.
    #[allow(clippy::too_many_arguments)]
    fn answer_from_path_table(
        &mut self,
        destination: DestinationHash,
        from_local_client: bool,
        path_via_local_client: bool,
        interface: InterfaceId,
        mode: InterfaceMode,
        requestor: Option<IdentityHash>,
        now: f64,
    ) {
        let Some(entry) = self.paths.get(&destination) else {
            return;
        };
        let next_hop = entry.next_hop;
        if mode == InterfaceMode::Roaming && entry.receiving_interface == interface {
            tracing::debug!(destination = %destination, "not answering path request, next hop is on the same roaming interface");
            return;
        }
        if requestor == Some(next_hop) {
            tracing::debug!(destination = %destination, "not answering path request, next hop is the requestor");
            return;
        }
        let Some(packet) = self.cache.get_packet(&entry.packet_hash) else {
            tracing::debug!(destination = %destination, "no cached announce to answer path request with");
            return;
        };

        let mut retransmit_timeout = if from_local_client || path_via_local_client {
            now
        } else {
            now + PATH_REQUEST_GRACE
        };
        if !from_local_client && mode == InterfaceMode::Roaming {
            retransmit_timeout += PATH_REQUEST_RG;
        }

        if self.announces.hold(destination) {
            tracing::trace!(destination = %destination, "holding pending announce for path response");
        }
        let hops = packet.hops;
        let mut response = AnnounceEntry::new(now, 0.0, next_hop, hops, packet);
        response.retransmit_timeout = retransmit_timeout;
        response.retries = PATHFINDER_R;
        response.block_rebroadcasts = true;
        response.attached_interface = Some(interface);
        self.announces.insert(destination, response);
        tracing::debug!(destination = %destination, interface = %interface, hops, "answering path request from path table");
    }
}
