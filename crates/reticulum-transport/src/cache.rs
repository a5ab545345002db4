//! In-memory packet cache.
//!
//! Holds the raw announces that back path table entries, so path requests
//! can be answered and cache requests served. The host mirrors it to disk.

use std::collections::HashMap;

use bytes::Bytes;
use reticulum_core::packet::wire::RawPacket;
use reticulum_core::types::PacketHash;

#[derive(Debug, Default)]
pub struct PacketCache {
    packets: HashMap<PacketHash, Bytes>,
}

impl PacketCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache a raw packet under its hash. Returns the hash.
    pub fn insert(&mut self, raw: Bytes) -> Option<PacketHash> {
        let hash = RawPacket::parse_bytes(raw.clone()).ok()?.packet_hash();
        self.packets.insert(hash, raw);
        Some(hash)
    }

    pub fn insert_with_hash(&mut self, hash: PacketHash, raw: Bytes) {
        self.packets.insert(hash, raw);
    }

    pub fn get(&self, hash: &PacketHash) -> Option<&Bytes> {
        self.packets.get(hash)
    }

    /// The cached packet, parsed.
    pub fn get_packet(&self, hash: &PacketHash) -> Option<RawPacket> {
        self.packets
            .get(hash)
            .and_then(|raw| RawPacket::parse_bytes(raw.clone()).ok())
    }

    pub fn remove(&mut self, hash: &PacketHash) -> Option<Bytes> {
        self.packets.remove(hash)
    }

    pub fn contains(&self, hash: &PacketHash) -> bool {
        self.packets.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reticulum_core::constants::{DestinationType, PacketType, PropagationType};
    use reticulum_core::packet::context::ContextType;
    use reticulum_core::packet::flags::PacketFlags;
    use reticulum_core::types::DestinationHash;

    #[test]
    fn caches_by_packet_hash() {
        let packet = RawPacket {
            flags: PacketFlags::header1(
                PropagationType::Broadcast,
                DestinationType::Single,
                PacketType::Announce,
            ),
            hops: 4,
            transport_id: None,
            destination: DestinationHash::new([1; 16]),
            context: ContextType::None,
            data: Bytes::from_static(b"announce"),
        };
        let mut cache = PacketCache::new();
        let hash = cache.insert(packet.serialize()).unwrap();
        assert_eq!(hash, packet.packet_hash());
        assert_eq!(cache.get_packet(&hash).unwrap().hops, 4);

        assert!(cache.insert(Bytes::from_static(&[1, 2])).is_none());
        assert!(cache.remove(&hash).is_some());
        assert!(cache.is_empty());
    }
}
