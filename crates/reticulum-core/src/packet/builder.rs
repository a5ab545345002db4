//! Outbound packet construction and packing.

use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::{
    CONTEXT_SIZE, DestinationType, ENCRYPTED_MDU, HeaderType, MDU, MTU, PacketType,
    PropagationType,
};
use crate::destination::PacketTarget;
use crate::error::PacketError;
use crate::packet::context::ContextType;
use crate::packet::flags::PacketFlags;
use crate::packet::wire::RawPacket;
use crate::types::{DestinationHash, IdentityHash, LinkId, PacketHash};

/// Whether a payload goes on the wire without passing through the target's
/// `encrypt`.
pub fn payload_is_plaintext(
    packet_type: PacketType,
    context: ContextType,
    destination_type: DestinationType,
) -> bool {
    match packet_type {
        PacketType::Announce | PacketType::LinkRequest => true,
        PacketType::Proof
            if context == ContextType::ResourcePrf || destination_type == DestinationType::Link =>
        {
            true
        }
        _ => matches!(
            context,
            ContextType::Resource | ContextType::Keepalive | ContextType::CacheRequest
        ),
    }
}

/// A packet being built for transmission.
///
/// `data` is the plaintext payload. After [`Packet::pack`] the frame and
/// its hash are fixed; mutating fields afterwards requires packing again.
#[derive(Debug, Clone)]
pub struct Packet {
    pub header_type: HeaderType,
    pub propagation_type: PropagationType,
    pub packet_type: PacketType,
    pub context: ContextType,
    pub hops: u8,
    pub transport_id: Option<IdentityHash>,
    pub data: Bytes,
    /// Set when the payload was cut down to [`MDU`] at construction, or to
    /// [`ENCRYPTED_MDU`] when packed for encryption.
    pub truncated: bool,
    destination: Option<DestinationHash>,
    destination_type: DestinationType,
    raw: Option<Bytes>,
    packet_hash: Option<PacketHash>,
}

impl Packet {
    /// A single-address broadcast packet. Payloads longer than [`MDU`] are
    /// truncated and flagged.
    pub fn new(packet_type: PacketType, context: ContextType, data: impl Into<Bytes>) -> Self {
        let mut data: Bytes = data.into();
        let truncated = data.len() > MDU;
        if truncated {
            data.truncate(MDU);
        }
        Packet {
            header_type: HeaderType::Header1,
            propagation_type: PropagationType::Broadcast,
            packet_type,
            context,
            hops: 0,
            transport_id: None,
            data,
            truncated,
            destination: None,
            destination_type: DestinationType::Single,
            raw: None,
            packet_hash: None,
        }
    }

    pub fn data(data: impl Into<Bytes>) -> Self {
        Self::new(PacketType::Data, ContextType::None, data)
    }

    /// A link request proof, addressed by link id rather than a destination.
    pub fn link_request_proof(link_id: LinkId, data: impl Into<Bytes>) -> Self {
        let mut packet = Self::new(PacketType::Proof, ContextType::Lrproof, data);
        packet.destination = Some(link_id.into());
        packet.destination_type = DestinationType::Link;
        packet
    }

    /// Address the packet through a relay: header type 2, transport propagation.
    pub fn via_transport(mut self, transport_id: IdentityHash) -> Self {
        self.header_type = HeaderType::Header2;
        self.propagation_type = PropagationType::Transport;
        self.transport_id = Some(transport_id);
        self
    }

    /// Pack against `target`. `None` is accepted only for link request proofs.
    pub fn pack(&mut self, target: Option<&dyn PacketTarget>) -> Result<&Bytes, PacketError> {
        let (destination, destination_type) = match target {
            Some(t) => (t.hash(), t.destination_type()),
            None if self.context == ContextType::Lrproof => {
                let dest = self.destination.ok_or(PacketError::NoDestination)?;
                (dest, self.destination_type)
            }
            None => return Err(PacketError::NoDestination),
        };

        if self.header_type == HeaderType::Header2 && self.transport_id.is_none() {
            return Err(PacketError::MissingTransportId);
        }

        let payload: Bytes = match target {
            Some(t) if !payload_is_plaintext(self.packet_type, self.context, destination_type) => {
                if self.data.len() > ENCRYPTED_MDU {
                    self.data.truncate(ENCRYPTED_MDU);
                    self.truncated = true;
                }
                Bytes::from(t.encrypt(&self.data)?)
            }
            _ => self.data.clone(),
        };

        let flags = PacketFlags {
            ifac: false,
            header_type: self.header_type,
            propagation_type: self.propagation_type,
            destination_type,
            packet_type: self.packet_type,
        };
        let size = self.header_type.size() + CONTEXT_SIZE + payload.len();
        if size > MTU {
            return Err(PacketError::ExceedsMtu {
                mtu: MTU,
                actual: size,
            });
        }

        let mut out = BytesMut::with_capacity(size);
        out.put_u8(flags.to_byte());
        out.put_u8(self.hops);
        if let Some(tid) = self.transport_id.filter(|_| self.header_type == HeaderType::Header2) {
            out.put_slice(tid.as_ref());
        }
        out.put_slice(destination.as_ref());
        out.put_u8(self.context.to_byte());
        out.put_slice(&payload);

        let wire = RawPacket {
            flags,
            hops: self.hops,
            transport_id: None,
            destination,
            context: self.context,
            data: payload,
        };
        self.packet_hash = Some(wire.packet_hash());
        self.destination = Some(destination);
        self.destination_type = destination_type;
        let raw: &Bytes = self.raw.insert(out.freeze());
        Ok(raw)
    }

    pub fn is_packed(&self) -> bool {
        self.raw.is_some()
    }

    pub fn raw(&self) -> Option<&Bytes> {
        self.raw.as_ref()
    }

    pub fn packet_hash(&self) -> Option<PacketHash> {
        self.packet_hash
    }

    pub fn destination(&self) -> Option<DestinationHash> {
        self.destination
    }

    pub fn destination_type(&self) -> DestinationType {
        self.destination_type
    }

    /// The packed frame re-read as a [`RawPacket`].
    pub fn to_raw_packet(&self) -> Result<RawPacket, PacketError> {
        let raw = self.raw.clone().ok_or(PacketError::NotPacked)?;
        RawPacket::parse_bytes(raw)
    }
}

#[cfg(test)]
mod tests {
    extern crate alloc;
    use alloc::vec;
    use alloc::vec::Vec;

    use super::*;
    use crate::error::IdentityError;

    struct XorTarget;

    impl PacketTarget for XorTarget {
        fn hash(&self) -> DestinationHash {
            DestinationHash::new([0x11; 16])
        }

        fn destination_type(&self) -> DestinationType {
            DestinationType::Single
        }

        fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, IdentityError> {
            Ok(plaintext.iter().map(|b| b ^ 0xFF).collect())
        }
    }

    struct Growing;

    impl PacketTarget for Growing {
        fn hash(&self) -> DestinationHash {
            DestinationHash::new([0x22; 16])
        }

        fn destination_type(&self) -> DestinationType {
            DestinationType::Single
        }

        fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, IdentityError> {
            let mut out = vec![0u8; 128];
            out.extend_from_slice(plaintext);
            Ok(out)
        }
    }

    #[test]
    fn data_is_encrypted_for_single_destination() {
        let mut packet = Packet::data(&b"abc"[..]);
        let raw = packet.pack(Some(&XorTarget)).unwrap().clone();
        assert_eq!(&raw[19..], &[0x9e, 0x9d, 0x9c]);
        assert_eq!(packet.destination(), Some(DestinationHash::new([0x11; 16])));
    }

    #[test]
    fn plaintext_contexts_skip_encryption() {
        for (ptype, ctx) in [
            (PacketType::Announce, ContextType::None),
            (PacketType::LinkRequest, ContextType::None),
            (PacketType::Proof, ContextType::ResourcePrf),
            (PacketType::Data, ContextType::Resource),
            (PacketType::Data, ContextType::Keepalive),
            (PacketType::Data, ContextType::CacheRequest),
        ] {
            let mut packet = Packet::new(ptype, ctx, &b"abc"[..]);
            let raw = packet.pack(Some(&XorTarget)).unwrap();
            assert_eq!(&raw[19..], b"abc", "{ptype:?}/{ctx:?} should be plaintext");
        }
    }

    #[test]
    fn proof_on_link_is_plaintext() {
        assert!(payload_is_plaintext(
            PacketType::Proof,
            ContextType::None,
            DestinationType::Link
        ));
        assert!(!payload_is_plaintext(
            PacketType::Proof,
            ContextType::None,
            DestinationType::Single
        ));
        assert!(!payload_is_plaintext(
            PacketType::Data,
            ContextType::Request,
            DestinationType::Single
        ));
    }

    #[test]
    fn pack_without_destination_fails() {
        let mut packet = Packet::data(&b"x"[..]);
        assert_eq!(packet.pack(None).unwrap_err(), PacketError::NoDestination);
    }

    #[test]
    fn link_request_proof_packs_without_target() {
        let link = LinkId::new([0x33; 16]);
        let mut packet = Packet::link_request_proof(link, vec![1u8; 96]);
        let raw = packet.pack(None).unwrap().clone();
        let parsed = RawPacket::parse(&raw).unwrap();
        assert_eq!(parsed.destination.as_ref(), link.as_ref());
        assert_eq!(parsed.flags.destination_type, DestinationType::Link);
        assert_eq!(parsed.context, ContextType::Lrproof);
        assert_eq!(parsed.data.len(), 96);
    }

    #[test]
    fn header2_requires_transport_id() {
        let mut packet = Packet::data(&b"x"[..]);
        packet.header_type = HeaderType::Header2;
        assert_eq!(
            packet.pack(Some(&XorTarget)).unwrap_err(),
            PacketError::MissingTransportId
        );
    }

    #[test]
    fn header2_places_transport_id_first() {
        let mut packet = Packet::new(PacketType::Announce, ContextType::None, &b"x"[..])
            .via_transport(IdentityHash::new([0x44; 16]));
        let raw = packet.pack(Some(&XorTarget)).unwrap().clone();
        assert_eq!(raw[0], 0x51);
        assert_eq!(&raw[2..18], &[0x44; 16]);
        assert_eq!(&raw[18..34], &[0x11; 16]);
    }

    #[test]
    fn oversized_application_payload_is_truncated_and_flagged() {
        let packet = Packet::data(vec![0u8; MDU + 20]);
        assert!(packet.truncated);
        assert_eq!(packet.data.len(), MDU);
        assert!(!Packet::data(vec![0u8; MDU]).truncated);
    }

    #[test]
    fn encrypted_payload_is_cut_to_encrypted_mdu() {
        let mut packet = Packet::data(vec![7u8; MDU]);
        assert!(!packet.truncated);
        let raw = packet.pack(Some(&XorTarget)).unwrap().clone();
        assert!(packet.truncated);
        assert_eq!(packet.data.len(), ENCRYPTED_MDU);
        assert_eq!(raw.len(), 19 + ENCRYPTED_MDU);

        let mut plain = Packet::new(PacketType::Data, ContextType::Keepalive, vec![7u8; MDU]);
        plain.pack(Some(&XorTarget)).unwrap();
        assert!(!plain.truncated);
        assert_eq!(plain.data.len(), MDU);
    }

    #[test]
    fn ciphertext_beyond_mtu_is_a_length_error() {
        let mut packet = Packet::data(vec![0u8; MDU]);
        let err = packet.pack(Some(&Growing)).unwrap_err();
        assert!(matches!(err, PacketError::ExceedsMtu { mtu: 500, .. }));
        assert!(!packet.is_packed());
    }

    #[test]
    fn packed_hash_matches_parsed_hash() {
        let mut packet = Packet::data(&b"payload"[..]);
        packet.pack(Some(&XorTarget)).unwrap();
        let parsed = packet.to_raw_packet().unwrap();
        assert_eq!(packet.packet_hash(), Some(parsed.packet_hash()));
    }
}
