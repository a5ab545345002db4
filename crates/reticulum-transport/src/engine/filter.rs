//! Inbound packet filter.
//!
//! Decides, before any table is touched, whether an inbound packet is
//! processed at all. Kept free of engine state so each rule can be tested
//! on its own.

use reticulum_core::constants::{DestinationType, PacketType};
use reticulum_core::packet::wire::RawPacket;
use reticulum_core::types::IdentityHash;

/// Why a packet was filtered out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVerdict {
    Accept,
    /// Addressed through a different relay.
    ForeignTransport,
    /// PLAIN or GROUP traffic from further than one hop.
    TooFar,
    /// PLAIN and GROUP destinations never announce.
    InvalidAnnounce,
    Duplicate,
}

impl FilterVerdict {
    pub fn accepted(self) -> bool {
        self == FilterVerdict::Accept
    }
}

/// Apply the inbound filter. `hops` on `packet` must already reflect the
/// hop just taken; `seen` is whether its hash is in the hashlist.
///
/// Rules, in order:
///
/// 1. non-announces addressed through a relay other than us are dropped;
/// 2. contexts with their own sequencing always pass;
/// 3. PLAIN and GROUP packets are dropped beyond one hop, announces always;
/// 4. unseen packets pass;
/// 5. seen SINGLE announces pass, so rebroadcasts can be counted;
/// 6. everything else is a duplicate.
pub fn packet_filter(packet: &RawPacket, transport_id: &IdentityHash, seen: bool) -> FilterVerdict {
    let packet_type = packet.flags.packet_type;
    if let Some(tid) = &packet.transport_id
        && packet_type != PacketType::Announce
        && tid != transport_id
    {
        return FilterVerdict::ForeignTransport;
    }

    if packet.context.bypasses_dedup() {
        return FilterVerdict::Accept;
    }

    if matches!(
        packet.flags.destination_type,
        DestinationType::Plain | DestinationType::Group
    ) {
        if packet_type == PacketType::Announce {
            return FilterVerdict::InvalidAnnounce;
        }
        if packet.hops > 1 {
            return FilterVerdict::TooFar;
        }
    }

    if !seen {
        return FilterVerdict::Accept;
    }

    if packet_type == PacketType::Announce
        && packet.flags.destination_type == DestinationType::Single
    {
        return FilterVerdict::Accept;
    }

    FilterVerdict::Duplicate
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use reticulum_core::constants::PropagationType;
    use reticulum_core::packet::context::ContextType;
    use reticulum_core::packet::flags::PacketFlags;
    use reticulum_core::types::DestinationHash;

    const US: IdentityHash = IdentityHash::new([0x55; 16]);

    fn packet(dtype: DestinationType, ptype: PacketType, hops: u8) -> RawPacket {
        RawPacket {
            flags: PacketFlags::header1(PropagationType::Broadcast, dtype, ptype),
            hops,
            transport_id: None,
            destination: DestinationHash::new([1; 16]),
            context: ContextType::None,
            data: Bytes::from_static(b"x"),
        }
    }

    #[test]
    fn foreign_relay_dropped_unless_announce() {
        let mut p = packet(DestinationType::Single, PacketType::Data, 1);
        p.flags = p.flags.into_transport();
        p.transport_id = Some(IdentityHash::new([0x66; 16]));
        assert_eq!(packet_filter(&p, &US, false), FilterVerdict::ForeignTransport);

        p.transport_id = Some(US);
        assert!(packet_filter(&p, &US, false).accepted());

        let mut a = packet(DestinationType::Single, PacketType::Announce, 1);
        a.transport_id = Some(IdentityHash::new([0x66; 16]));
        assert!(packet_filter(&a, &US, false).accepted());
    }

    #[test]
    fn plain_limited_to_one_hop() {
        let p = packet(DestinationType::Plain, PacketType::Data, 1);
        assert!(packet_filter(&p, &US, false).accepted());
        let p = packet(DestinationType::Plain, PacketType::Data, 2);
        assert_eq!(packet_filter(&p, &US, false), FilterVerdict::TooFar);
        let g = packet(DestinationType::Group, PacketType::Data, 3);
        assert_eq!(packet_filter(&g, &US, false), FilterVerdict::TooFar);
    }

    #[test]
    fn seen_plain_and_group_are_duplicates() {
        let p = packet(DestinationType::Plain, PacketType::Data, 0);
        assert_eq!(packet_filter(&p, &US, true), FilterVerdict::Duplicate);
        let g = packet(DestinationType::Group, PacketType::Data, 1);
        assert_eq!(packet_filter(&g, &US, true), FilterVerdict::Duplicate);
    }

    #[test]
    fn plain_announce_invalid() {
        let p = packet(DestinationType::Plain, PacketType::Announce, 0);
        assert_eq!(packet_filter(&p, &US, false), FilterVerdict::InvalidAnnounce);
    }

    #[test]
    fn seen_hashes() {
        let d = packet(DestinationType::Single, PacketType::Data, 1);
        assert!(packet_filter(&d, &US, false).accepted());
        assert_eq!(packet_filter(&d, &US, true), FilterVerdict::Duplicate);

        let a = packet(DestinationType::Single, PacketType::Announce, 1);
        assert!(packet_filter(&a, &US, true).accepted());

        let mut k = packet(DestinationType::Link, PacketType::Data, 1);
        k.context = ContextType::Keepalive;
        assert!(packet_filter(&k, &US, true).accepted());
    }
}
