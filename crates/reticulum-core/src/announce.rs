//! Announce payload framing, signing and validation.
//!
//! # Payload layout
//!
//! ```text
//! public_key(64) + name_hash(10) + random_blob(10) + signature(64) [+ app_data]
//! ```
//!
//! # Signed data
//!
//! ```text
//! destination_hash(16) + public_key(64) + name_hash(10) + random_blob(10) [+ app_data]
//! ```
//!
//! The random blob carries the emission time; see [`RandomBlob`].

extern crate alloc;
use alloc::sync::Arc;
use alloc::vec::Vec;

use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::{
    ANNOUNCE_MIN_PAYLOAD, DestinationType, KEYSIZE, NAME_HASH_LENGTH, PacketType,
    RANDOM_HASH_LENGTH, SIGLENGTH, TRUNCATED_HASHLENGTH,
};
use crate::destination::{PacketTarget, destination_hash};
use crate::error::{AnnounceError, IdentityError};
use crate::identity::{Identity, IdentityResolver};
use crate::packet::builder::Packet;
use crate::packet::context::ContextType;
use crate::packet::wire::RawPacket;
use crate::types::{DestinationHash, IdentityHash, NameHash, RandomBlob, Signature};

/// A parsed or constructed announce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announce {
    pub destination_hash: DestinationHash,
    pub public_key: [u8; KEYSIZE],
    pub name_hash: NameHash,
    pub random_blob: RandomBlob,
    pub signature: Signature,
    pub app_data: Option<Bytes>,
}

/// Fresh random blob stamped with `emitted` (seconds).
#[cfg(feature = "std")]
pub fn make_random_blob(emitted: u64) -> RandomBlob {
    use rand::RngCore;
    let mut nonce = [0u8; 5];
    rand::thread_rng().fill_bytes(&mut nonce);
    RandomBlob::from_parts(nonce, emitted)
}

fn split<const N: usize>(cursor: &mut &[u8]) -> [u8; N] {
    let (chunk, rest) = cursor.split_at(N);
    let mut out = [0u8; N];
    out.copy_from_slice(chunk);
    *cursor = rest;
    out
}

impl Announce {
    /// Sign a new announce with `identity`, which must hold its private key.
    pub fn create(
        identity: &dyn Identity,
        name_hash: NameHash,
        destination_hash: DestinationHash,
        random_blob: RandomBlob,
        app_data: Option<Bytes>,
    ) -> Result<Self, AnnounceError> {
        let mut announce = Announce {
            destination_hash,
            public_key: identity.public_key(),
            name_hash,
            random_blob,
            signature: Signature::new([0u8; SIGLENGTH]),
            app_data,
        };
        announce.signature = identity.sign(&announce.signed_data())?;
        Ok(announce)
    }

    /// Parse the announce carried in `payload`; the address comes from the
    /// packet header.
    pub fn from_payload(
        destination_hash: DestinationHash,
        payload: &Bytes,
    ) -> Result<Self, AnnounceError> {
        if payload.len() < ANNOUNCE_MIN_PAYLOAD {
            return Err(AnnounceError::PayloadTooShort {
                min: ANNOUNCE_MIN_PAYLOAD,
                actual: payload.len(),
            });
        }

        let mut cursor: &[u8] = payload;
        let public_key = split::<KEYSIZE>(&mut cursor);
        let name_hash = NameHash::new(split::<NAME_HASH_LENGTH>(&mut cursor));
        let random_blob = RandomBlob::new(split::<RANDOM_HASH_LENGTH>(&mut cursor));
        let signature = Signature::new(split::<SIGLENGTH>(&mut cursor));
        let app_data = (!cursor.is_empty()).then(|| payload.slice(ANNOUNCE_MIN_PAYLOAD..));

        Ok(Announce {
            destination_hash,
            public_key,
            name_hash,
            random_blob,
            signature,
            app_data,
        })
    }

    pub fn from_packet(packet: &RawPacket) -> Result<Self, AnnounceError> {
        if packet.flags.packet_type != PacketType::Announce {
            return Err(AnnounceError::NotAnAnnounce);
        }
        Self::from_payload(packet.destination, &packet.data)
    }

    pub fn signed_data(&self) -> Vec<u8> {
        let app_len = self.app_data.as_ref().map_or(0, Bytes::len);
        let mut data = Vec::with_capacity(
            TRUNCATED_HASHLENGTH + KEYSIZE + NAME_HASH_LENGTH + RANDOM_HASH_LENGTH + app_len,
        );
        data.extend_from_slice(self.destination_hash.as_ref());
        data.extend_from_slice(&self.public_key);
        data.extend_from_slice(self.name_hash.as_ref());
        data.extend_from_slice(self.random_blob.as_ref());
        if let Some(app_data) = &self.app_data {
            data.extend_from_slice(app_data);
        }
        data
    }

    /// Check the signature and that the address belongs to the announced key.
    /// Returns the announcing identity for later recall.
    pub fn validate(
        &self,
        resolver: &dyn IdentityResolver,
    ) -> Result<Arc<dyn Identity>, AnnounceError> {
        let identity = resolver.from_public_key(&self.public_key)?;
        if !identity.verify(&self.signed_data(), &self.signature) {
            return Err(AnnounceError::InvalidSignature);
        }
        if destination_hash(&self.name_hash, &identity.hash()) != self.destination_hash {
            return Err(AnnounceError::InvalidDestinationHash);
        }
        Ok(identity)
    }

    pub fn identity_hash(&self) -> IdentityHash {
        crate::identity::identity_hash(&self.public_key)
    }

    /// Emission time in seconds, as stamped by the announcing node.
    pub fn emitted(&self) -> u64 {
        self.random_blob.emitted()
    }

    pub fn to_payload(&self) -> Bytes {
        let app_len = self.app_data.as_ref().map_or(0, Bytes::len);
        let mut out = BytesMut::with_capacity(ANNOUNCE_MIN_PAYLOAD + app_len);
        out.put_slice(&self.public_key);
        out.put_slice(self.name_hash.as_ref());
        out.put_slice(self.random_blob.as_ref());
        out.put_slice(self.signature.as_ref());
        if let Some(app_data) = &self.app_data {
            out.put_slice(app_data);
        }
        out.freeze()
    }

    /// Pack this announce into a broadcast packet with the given context.
    pub fn pack(&self, context: ContextType) -> Result<Packet, AnnounceError> {
        pack_announce_payload(self.destination_hash, self.to_payload(), context, None, 0)
    }
}

/// Announces are never encrypted, so packing one needs only its address.
struct AnnounceTarget(DestinationHash);

impl PacketTarget for AnnounceTarget {
    fn hash(&self) -> DestinationHash {
        self.0
    }

    fn destination_type(&self) -> DestinationType {
        DestinationType::Single
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, IdentityError> {
        Ok(plaintext.to_vec())
    }
}

/// Pack an existing announce payload, optionally through a relay.
pub fn pack_announce_payload(
    destination: DestinationHash,
    payload: Bytes,
    context: ContextType,
    transport_id: Option<IdentityHash>,
    hops: u8,
) -> Result<Packet, AnnounceError> {
    let mut packet = Packet::new(PacketType::Announce, context, payload);
    if let Some(tid) = transport_id {
        packet = packet.via_transport(tid);
    }
    packet.hops = hops;
    packet.pack(Some(&AnnounceTarget(destination)))?;
    Ok(packet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::{Destination, name_hash};
    use crate::testing::{TestIdentity, TestResolver};

    fn signed(app_data: Option<&'static [u8]>) -> (Arc<TestIdentity>, Announce) {
        let identity = Arc::new(TestIdentity::from_seed(7));
        let dest = Destination::single(identity.clone(), "app", &["svc"]);
        let announce = Announce::create(
            identity.as_ref(),
            name_hash("app", &["svc"]),
            *dest.hash(),
            RandomBlob::from_parts([1; 5], 1_700_000_000),
            app_data.map(Bytes::from_static),
        )
        .unwrap();
        (identity, announce)
    }

    #[test]
    fn payload_roundtrip_with_app_data() {
        let (_, announce) = signed(Some(b"hello"));
        let payload = announce.to_payload();
        assert_eq!(payload.len(), ANNOUNCE_MIN_PAYLOAD + 5);
        let parsed = Announce::from_payload(announce.destination_hash, &payload).unwrap();
        assert_eq!(parsed, announce);
    }

    #[test]
    fn empty_app_data_parses_as_none() {
        let (_, announce) = signed(None);
        let parsed =
            Announce::from_payload(announce.destination_hash, &announce.to_payload()).unwrap();
        assert!(parsed.app_data.is_none());
    }

    #[test]
    fn validates_and_returns_identity() {
        let (identity, announce) = signed(Some(b"x"));
        let recalled = announce.validate(&TestResolver).unwrap();
        assert_eq!(recalled.hash(), identity.hash());
        assert_eq!(announce.emitted(), 1_700_000_000);
    }

    #[test]
    fn tampered_app_data_fails_signature() {
        let (_, mut announce) = signed(Some(b"x"));
        announce.app_data = Some(Bytes::from_static(b"y"));
        assert_eq!(
            announce.validate(&TestResolver).unwrap_err(),
            AnnounceError::InvalidSignature
        );
    }

    #[test]
    fn foreign_address_is_rejected() {
        let (identity, mut announce) = signed(None);
        announce.destination_hash = DestinationHash::new([0x11; 16]);
        announce.signature = identity.sign(&announce.signed_data()).unwrap();
        assert_eq!(
            announce.validate(&TestResolver).unwrap_err(),
            AnnounceError::InvalidDestinationHash
        );
    }

    #[test]
    fn short_payload_rejected() {
        let err = Announce::from_payload(DestinationHash::new([0; 16]), &Bytes::from(vec![0u8; 100]))
            .unwrap_err();
        assert_eq!(err, AnnounceError::PayloadTooShort { min: 148, actual: 100 });
    }

    #[test]
    fn packs_as_plain_announce_and_parses_back() {
        let (_, announce) = signed(Some(b"data"));
        let packet = announce.pack(ContextType::PathResponse).unwrap();
        let raw = packet.to_raw_packet().unwrap();
        assert_eq!(raw.flags.packet_type, PacketType::Announce);
        assert_eq!(raw.context, ContextType::PathResponse);
        assert_eq!(Announce::from_packet(&raw).unwrap(), announce);
    }
}
