//! The maintenance tick.

use bytes::Bytes;
use rand::RngCore;
use reticulum_core::constants::TRUNCATED_HASHLENGTH;
use reticulum_core::types::DestinationHash;

use super::{TransportEngine, transmit};
use crate::action::TransportAction;
use crate::announce::ANNOUNCES_CHECK_INTERVAL;
use crate::interface::{InterfaceId, InterfaceMode};
use crate::path::{PATH_REQUEST_TIMEOUT, PATHFINDER_E, PathState};
use crate::receipt::RECEIPTS_CHECK_INTERVAL;
use crate::router::{LinkEntry, TABLES_CULL_INTERVAL};

impl TransportEngine {
    /// Run periodic work: tunnel synthesis, receipt timeouts, announce
    /// retransmission, announce queues and table culling. Call at least
    /// every quarter second or so; each job keeps its own interval.
    pub fn tick(&mut self, now: f64) -> Vec<TransportAction> {
        let mut actions = Vec::new();

        self.synthesize_wanted_tunnels(now, &mut actions);

        if now > self.receipts_checked + RECEIPTS_CHECK_INTERVAL {
            self.receipts_checked = now;
            for receipt in self.receipts.check_timeouts(now) {
                tracing::debug!(packet_hash = %receipt.hash, status = ?receipt.status, "receipt timed out");
                actions.push(TransportAction::ReceiptFailed {
                    packet_hash: receipt.hash,
                    destination: receipt.destination,
                    status: receipt.status,
                });
            }
        }

        if now > self.announces_checked + ANNOUNCES_CHECK_INTERVAL {
            self.announces_checked = now;
            self.retransmit_announces(now, &mut actions);
        }

        self.drain_announce_queues(now, &mut actions);

        if now > self.tables_culled + TABLES_CULL_INTERVAL {
            self.tables_culled = now;
            self.cull_tables(now, &mut actions);
        }

        actions
    }

    fn synthesize_wanted_tunnels(&mut self, now: f64, actions: &mut Vec<TransportAction>) {
        let wanted: Vec<InterfaceId> = self
            .interfaces
            .iter()
            .filter(|(_, state)| state.info.wants_tunnel)
            .map(|(id, _)| id)
            .collect();
        for id in wanted {
            match self.synthesize_tunnel(id, now) {
                Ok(sent) => actions.extend(sent),
                Err(err) => tracing::warn!(interface = %id, %err, "tunnel synthesis failed"),
            }
        }
    }

    /// Release queued announces as each interface's cap allows.
    fn drain_announce_queues(&mut self, now: f64, actions: &mut Vec<TransportAction>) {
        for (id, state) in self.interfaces.iter_mut() {
            while !state.announce_queue.is_empty() && now >= state.announce_allowed_at {
                let Some(next) = state.announce_queue.pop_next(now) else {
                    break;
                };
                if let Some(wait) = state.info.announce_wait(next.raw.len()) {
                    state.announce_allowed_at = now + wait;
                }
                tracing::trace!(interface = %id, destination = %next.destination, "releasing queued announce");
                transmit(actions, id, next.raw);
            }
        }
    }

    fn cull_tables(&mut self, now: f64, actions: &mut Vec<TransportAction>) {
        self.paths.cull_states();
        let reverse = self.reverse.cull(now, &self.interfaces);

        let mut rediscover: Vec<(DestinationHash, Option<InterfaceId>)> = Vec::new();
        let stale_links = self.links.drain_stale(now, &self.interfaces);
        for (link_id, entry) in &stale_links {
            if entry.validated || now <= entry.proof_timeout {
                continue;
            }
            if let Some(request) = self.link_rediscovery(entry, now) {
                tracing::debug!(link_id = %link_id, destination = %entry.destination, "link never established, rediscovering path");
                if !rediscover.iter().any(|(dest, _)| *dest == request.0) {
                    rediscover.push(request);
                }
            }
        }

        let culled_paths = self.paths.cull(now, &self.interfaces);
        for (_, entry) in &culled_paths {
            self.release_cached(entry.packet_hash, actions);
        }

        let discovery = self.discovery.cull(now);
        let (tunnels, tunnel_paths) = self.tunnels.cull(now);
        let path_requests = self.path_requests.cull(now);
        let pending_before = self.pending_local_path_requests.len();
        self.pending_local_path_requests
            .retain(|_, (_, requested)| now <= *requested + PATH_REQUEST_TIMEOUT);
        let pending = pending_before - self.pending_local_path_requests.len();

        let paths = &self.paths;
        self.announce_rates.retain(|dest| paths.contains(dest));
        let known_before = self.known.len();
        self.known
            .retain(|dest, known| paths.contains(dest) || now <= known.last_seen + PATHFINDER_E);
        let known = known_before - self.known.len();

        let total = reverse
            + stale_links.len()
            + culled_paths.len()
            + discovery
            + tunnels
            + tunnel_paths
            + path_requests
            + pending
            + known;
        if total > 0 {
            tracing::debug!(
                reverse,
                links = stale_links.len(),
                paths = culled_paths.len(),
                discovery,
                tunnels,
                tunnel_paths,
                path_requests,
                pending,
                known,
                "culled tables"
            );
        }

        for (destination, blocked) in rediscover {
            self.rediscover_path(&destination, blocked, now, actions);
        }
    }

    /// Decide whether a relayed link that never saw its proof warrants a new
    /// path request, returning the destination and an interface to skip.
    fn link_rediscovery(
        &mut self,
        entry: &LinkEntry,
        now: f64,
    ) -> Option<(DestinationHash, Option<InterfaceId>)> {
        let destination = entry.destination;
        if !self.path_requests.allows(&destination, now) {
            return None;
        }

        let request = if !self.paths.has_path(&destination, now) || entry.taken_hops == 0 {
            (destination, None)
        } else if self.paths.hops_to(&destination, now) == 1 || entry.taken_hops == 1 {
            let blocked = entry.received_interface;
            let boundary = self.interfaces.mode(blocked) == Some(InterfaceMode::Boundary);
            if self.config.enable_transport && !boundary {
                self.paths.set_state(destination, PathState::Unresponsive);
            }
            (destination, Some(blocked))
        } else {
            return None;
        };

        if !self.config.enable_transport {
            self.paths.expire_path(&destination);
        }
        Some(request)
    }

    /// Request a path on every interface but `blocked`, sharing one tag.
    fn rediscover_path(
        &mut self,
        destination: &DestinationHash,
        blocked: Option<InterfaceId>,
        now: f64,
        actions: &mut Vec<TransportAction>,
    ) {
        let mut tag = [0u8; TRUNCATED_HASHLENGTH];
        self.rng.fill_bytes(&mut tag);
        let tag = Bytes::copy_from_slice(&tag);
        for id in self.outbound_interfaces() {
            if Some(id) == blocked {
                continue;
            }
            if let Err(err) =
                self.send_path_request(destination, Some(id), Some(tag.clone()), false, now, actions)
            {
                tracing::warn!(destination = %destination, interface = %id, %err, "could not request path");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use reticulum_core::testing::{TestIdentity, TestResolver};

    use super::*;
    use crate::config::TransportConfig;

    fn engine() -> TransportEngine {
        TransportEngine::with_seed(
            Arc::new(TestIdentity::from_seed(1)),
            Arc::new(TestResolver),
            TransportConfig::transport(),
            3,
        )
    }

    #[test]
    fn request_bookkeeping_is_culled_once_stale() {
        let mut node = engine();
        let net = node.register_interface(crate::interface::InterfaceInfo::new("net"));
        let first = DestinationHash::new([1; 16]);
        let second = DestinationHash::new([2; 16]);
        node.path_requests.record(first, 100.0);
        node.path_requests.record(second, 110.0);
        node.pending_local_path_requests.insert(first, (net, 100.0));
        node.pending_local_path_requests.insert(second, (net, 110.0));

        let mut actions = Vec::new();
        node.cull_tables(121.0, &mut actions);
        assert!(node.path_requests.last_request(&first).is_none());
        assert!(node.path_requests.last_request(&second).is_some());
        assert!(!node.pending_local_path_requests.contains_key(&first));
        assert!(node.pending_local_path_requests.contains_key(&second));

        node.cull_tables(131.0, &mut actions);
        assert!(node.path_requests.last_request(&second).is_none());
        assert!(node.pending_local_path_requests.is_empty());
    }

    #[test]
    fn pathless_identities_expire_after_path_lifetime() {
        let mut node = engine();
        let remote = DestinationHash::new([7; 16]);
        node.remember_identity(remote, Arc::new(TestIdentity::from_seed(9).to_public()), None, 100.0);

        let mut actions = Vec::new();
        node.cull_tables(100.0 + PATHFINDER_E, &mut actions);
        assert!(node.recall_identity(&remote).is_some());

        node.cull_tables(101.0 + PATHFINDER_E, &mut actions);
        assert!(node.recall_identity(&remote).is_none());
    }
}
