//! Header rewriting for relayed packets.
//!
//! Only the header type, propagation type, hop count and transport id ever
//! change. The hashed part of the packet is untouched, so a rewritten packet
//! keeps its identity.

use reticulum_core::packet::wire::RawPacket;
use reticulum_core::types::IdentityHash;

/// Convert a header-1 packet to header 2, addressed through `next_hop`.
pub fn inject_transport_header(packet: &RawPacket, next_hop: IdentityHash) -> RawPacket {
    RawPacket {
        flags: packet.flags.into_transport(),
        transport_id: Some(next_hop),
        ..packet.clone()
    }
}

/// Keep header 2 but hand the packet to the next relay, with `hops` set.
pub fn replace_transport_id(packet: &RawPacket, next_hop: IdentityHash, hops: u8) -> RawPacket {
    RawPacket {
        flags: packet.flags.into_transport(),
        hops,
        transport_id: Some(next_hop),
        ..packet.clone()
    }
}

/// Drop the transport id for the final hop, with `hops` set.
pub fn strip_transport_header(packet: &RawPacket, hops: u8) -> RawPacket {
    RawPacket {
        flags: packet.flags.into_broadcast(),
        hops,
        transport_id: None,
        ..packet.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use reticulum_core::constants::{
        DestinationType, HEADER_1_SIZE, HEADER_2_SIZE, HeaderType, PacketType, PropagationType,
    };
    use reticulum_core::packet::context::ContextType;
    use reticulum_core::packet::flags::PacketFlags;
    use reticulum_core::types::DestinationHash;

    fn data_packet() -> RawPacket {
        RawPacket {
            flags: PacketFlags::header1(
                PropagationType::Broadcast,
                DestinationType::Single,
                PacketType::Data,
            ),
            hops: 0,
            transport_id: None,
            destination: DestinationHash::new([0x33; 16]),
            context: ContextType::None,
            data: Bytes::from_static(b"payload"),
        }
    }

    #[test]
    fn inject_grows_by_one_address() {
        let original = data_packet();
        let next_hop = IdentityHash::new([0x44; 16]);
        let injected = inject_transport_header(&original, next_hop);

        let raw = injected.serialize();
        assert_eq!(raw.len(), original.serialize().len() + (HEADER_2_SIZE - HEADER_1_SIZE));
        assert_eq!(raw[0] & 0xF0, 0x50);
        assert_eq!(&raw[2..18], next_hop.as_ref());
        assert_eq!(&raw[18..34], original.destination.as_ref());

        let parsed = RawPacket::parse(&raw).unwrap();
        assert_eq!(parsed.flags.header_type, HeaderType::Header2);
        assert_eq!(parsed.packet_hash(), original.packet_hash());
    }

    #[test]
    fn replace_and_strip_keep_identity() {
        let original = data_packet();
        let relayed = inject_transport_header(&original, IdentityHash::new([1; 16]));

        let next = replace_transport_id(&relayed, IdentityHash::new([2; 16]), 3);
        assert_eq!(next.transport_id, Some(IdentityHash::new([2; 16])));
        assert_eq!(next.hops, 3);

        let last = strip_transport_header(&next, 4);
        assert_eq!(last.flags, original.flags);
        assert_eq!(last.hops, 4);
        assert!(last.transport_id.is_none());
        assert_eq!(last.packet_hash(), original.packet_hash());
        assert_eq!(last.serialize()[2..], original.serialize()[2..]);
    }
}
