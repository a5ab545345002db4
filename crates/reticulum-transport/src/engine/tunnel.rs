//! Tunnel synthesis and path restoration.

use rand::RngCore;
use reticulum_core::constants::PacketType;
use reticulum_core::packet::builder::Packet;
use reticulum_core::packet::context::ContextType;
use reticulum_core::packet::wire::RawPacket;
use reticulum_core::types::TunnelId;

use super::TransportEngine;
use crate::action::TransportAction;
use crate::error::TransportError;
use crate::interface::InterfaceId;
use crate::path::PathState;
use crate::router::TunnelSynthesis;

impl TransportEngine {
    /// Broadcast a signed tunnel synthesis on `interface`, so the relay on
    /// the other side keeps our paths across reconnects.
    pub fn synthesize_tunnel(
        &mut self,
        interface: InterfaceId,
        now: f64,
    ) -> Result<Vec<TransportAction>, TransportError> {
        let state = self
            .interfaces
            .get_mut(interface)
            .ok_or(TransportError::UnknownInterface(interface))?;
        state.info.wants_tunnel = false;
        let interface_hash = state.info.interface_hash();

        let mut random = [0u8; 16];
        self.rng.fill_bytes(&mut random);
        let synthesis = TunnelSynthesis::create(self.identity.as_ref(), interface_hash, random)?;

        let mut packet = Packet::new(PacketType::Data, ContextType::None, synthesis.to_bytes());
        packet.pack(Some(&self.tunnel_synthesize_destination))?;
        tracing::debug!(interface = %interface, tunnel_id = %synthesis.tunnel_id(), "synthesizing tunnel");
        Ok(self.dispatch(&packet, Some(interface), now)?.actions)
    }

    pub(super) fn handle_tunnel_synthesis(
        &mut self,
        packet: &RawPacket,
        interface: InterfaceId,
        now: f64,
        actions: &mut Vec<TransportAction>,
    ) {
        let validated = TunnelSynthesis::parse(&packet.data)
            .and_then(|synthesis| synthesis.validate(self.resolver.as_ref()));
        match validated {
            Ok((tunnel_id, _)) => self.handle_tunnel(tunnel_id, interface, now, actions),
            Err(err) => {
                tracing::debug!(interface = %interface, %err, "invalid tunnel synthesis dropped");
            }
        }
    }

    /// Bind `tunnel_id` to `interface`. A tunnel seen before brings its
    /// paths back, unless the path table already holds a better live one.
    fn handle_tunnel(
        &mut self,
        tunnel_id: TunnelId,
        interface: InterfaceId,
        now: f64,
        actions: &mut Vec<TransportAction>,
    ) {
        if let Some(state) = self.interfaces.get_mut(interface) {
            state.tunnel_id = Some(tunnel_id);
        }
        let Some(paths) = self.tunnels.bind(tunnel_id, interface, now) else {
            tracing::debug!(tunnel_id = %tunnel_id, interface = %interface, "tunnel created");
            return;
        };
        tracing::debug!(tunnel_id = %tunnel_id, interface = %interface, paths = paths.len(), "tunnel re-established");

        for (destination, path) in paths {
            let restore = match self.paths.get(&destination) {
                Some(current) => path.hops <= current.hops || current.is_expired(now),
                None => now < path.expires,
            };
            if !restore {
                tracing::trace!(destination = %destination, "tunnel path not restored");
                self.tunnels.forget_path(&tunnel_id, &destination);
                continue;
            }

            let replaced = self.paths.get(&destination).map(|old| old.packet_hash);
            let evicted = self.paths.insert(destination, path.to_entry(now, interface));
            self.paths.set_state(destination, PathState::Unknown);
            for (_, old) in evicted {
                self.release_cached(old.packet_hash, actions);
            }
            if let Some(old) = replaced
                && old != path.packet_hash
            {
                self.release_cached(old, actions);
            }
            tracing::debug!(destination = %destination, hops = path.hops, "path restored from tunnel");
        }
    }
}
