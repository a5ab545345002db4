//! Destination addressing and the packet target boundary.
//!
//! A destination hash is derived from a dotted application name and, for
//! SINGLE destinations, the owning identity. Packing a packet needs only a
//! [`PacketTarget`]: something with an address, a type, and an `encrypt`.

extern crate alloc;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::constants::{DestinationType, NAME_HASH_LENGTH};
use crate::error::IdentityError;
use crate::hash::{full_hash, full_hash_parts};
use crate::identity::Identity;
use crate::types::{DestinationHash, IdentityHash, NameHash, PacketHash};

/// `SHA-256("app_name.aspect1.aspect2")[:10]`
#[must_use = "returns the computed name hash"]
pub fn name_hash(app_name: &str, aspects: &[&str]) -> NameHash {
    let digest = full_hash(expand_name(app_name, aspects).as_bytes());
    let mut out = [0u8; NAME_HASH_LENGTH];
    out.copy_from_slice(&digest.as_ref()[..NAME_HASH_LENGTH]);
    NameHash::new(out)
}

/// `SHA-256(name_hash || identity_hash)[:16]`
#[must_use = "returns the computed destination hash"]
pub fn destination_hash(name_hash: &NameHash, identity_hash: &IdentityHash) -> DestinationHash {
    let digest = full_hash_parts(&[name_hash.as_ref(), identity_hash.as_ref()]);
    truncate(digest.as_ref())
}

/// `SHA-256(name_hash)[:16]`, for destinations without an identity.
#[must_use = "returns the computed destination hash"]
pub fn plain_destination_hash(name_hash: &NameHash) -> DestinationHash {
    truncate(full_hash(name_hash.as_ref()).as_ref())
}

fn truncate(digest: &[u8]) -> DestinationHash {
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest[..16]);
    DestinationHash::new(out)
}

fn expand_name(app_name: &str, aspects: &[&str]) -> String {
    let mut name = String::from(app_name);
    for aspect in aspects {
        name.push('.');
        name.push_str(aspect);
    }
    name
}

/// Whatever a packet is addressed to when it is packed.
pub trait PacketTarget {
    fn hash(&self) -> DestinationHash;

    fn destination_type(&self) -> DestinationType;

    /// Transform a payload for transmission. Plaintext targets return it as is.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, IdentityError>;
}

/// When a destination proves packets it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProofStrategy {
    #[default]
    None,
    All,
    /// Ask the application for each packet.
    App,
}

/// An addressable endpoint.
#[derive(Clone)]
#[must_use]
pub struct Destination {
    hash: DestinationHash,
    name_hash: Option<NameHash>,
    dtype: DestinationType,
    identity: Option<Arc<dyn Identity>>,
    pub app_name: String,
    pub aspects: Vec<String>,
    pub proof_strategy: ProofStrategy,
}

impl core::fmt::Debug for Destination {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Destination")
            .field("hash", &self.hash)
            .field("type", &self.dtype)
            .field("app_name", &self.app_name)
            .field("aspects", &self.aspects)
            .field("proof_strategy", &self.proof_strategy)
            .finish()
    }
}

impl Destination {
    /// A SINGLE destination owned by (or encrypting to) `identity`.
    pub fn single(identity: Arc<dyn Identity>, app_name: &str, aspects: &[&str]) -> Self {
        let nh = name_hash(app_name, aspects);
        Destination {
            hash: destination_hash(&nh, &identity.hash()),
            name_hash: Some(nh),
            dtype: DestinationType::Single,
            identity: Some(identity),
            app_name: String::from(app_name),
            aspects: aspects.iter().map(|s| String::from(*s)).collect(),
            proof_strategy: ProofStrategy::None,
        }
    }

    /// A PLAIN destination. Payloads travel unencrypted.
    pub fn plain(app_name: &str, aspects: &[&str]) -> Self {
        let nh = name_hash(app_name, aspects);
        Destination {
            hash: plain_destination_hash(&nh),
            name_hash: Some(nh),
            dtype: DestinationType::Plain,
            identity: None,
            app_name: String::from(app_name),
            aspects: aspects.iter().map(|s| String::from(*s)).collect(),
            proof_strategy: ProofStrategy::None,
        }
    }

    /// A SINGLE destination known only by address and identity, as learned
    /// from an announce.
    pub fn remote(identity: Arc<dyn Identity>, hash: DestinationHash) -> Self {
        Destination {
            hash,
            name_hash: None,
            dtype: DestinationType::Single,
            identity: Some(identity),
            app_name: String::new(),
            aspects: Vec::new(),
            proof_strategy: ProofStrategy::None,
        }
    }

    pub fn with_proof_strategy(mut self, strategy: ProofStrategy) -> Self {
        self.proof_strategy = strategy;
        self
    }

    #[must_use = "returns the destination hash without side effects"]
    pub fn hash(&self) -> &DestinationHash {
        &self.hash
    }

    pub fn name_hash(&self) -> Option<&NameHash> {
        self.name_hash.as_ref()
    }

    pub fn dtype(&self) -> DestinationType {
        self.dtype
    }

    pub fn identity(&self) -> Option<&Arc<dyn Identity>> {
        self.identity.as_ref()
    }

    /// Recover an inbound payload. PLAIN payloads are returned unchanged.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, IdentityError> {
        match (self.dtype, &self.identity) {
            (DestinationType::Single, Some(identity)) => identity.decrypt(ciphertext),
            (DestinationType::Single, None) => Err(IdentityError::NoPrivateKey),
            _ => Ok(ciphertext.to_vec()),
        }
    }

    /// The dotted name this destination was derived from.
    pub fn expanded_name(&self) -> String {
        let aspects: Vec<&str> = self.aspects.iter().map(String::as_str).collect();
        expand_name(&self.app_name, &aspects)
    }
}

impl PacketTarget for Destination {
    fn hash(&self) -> DestinationHash {
        self.hash
    }

    fn destination_type(&self) -> DestinationType {
        self.dtype
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, IdentityError> {
        match (self.dtype, &self.identity) {
            (DestinationType::Single, Some(identity)) => identity.encrypt(plaintext),
            (DestinationType::Single, None) => Err(IdentityError::EncryptionFailed),
            _ => Ok(plaintext.to_vec()),
        }
    }
}

/// Address of a delivery proof: the truncated hash of the proven packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofDestination {
    hash: DestinationHash,
}

impl ProofDestination {
    pub fn for_packet(packet_hash: &PacketHash) -> Self {
        Self {
            hash: packet_hash.truncated().into(),
        }
    }
}

impl PacketTarget for ProofDestination {
    fn hash(&self) -> DestinationHash {
        self.hash
    }

    fn destination_type(&self) -> DestinationType {
        DestinationType::Single
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, IdentityError> {
        Ok(plaintext.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_request_control_destination_hash() {
        let nh = name_hash("rnstransport", &["path", "request"]);
        assert_eq!(
            hex::encode(plain_destination_hash(&nh)),
            "6b9f66014d9853faab220fba47d02761"
        );
    }

    #[test]
    fn plain_destination_uses_name_only() {
        let dest = Destination::plain("app", &["a", "b"]);
        assert_eq!(dest.dtype(), DestinationType::Plain);
        assert_eq!(
            *dest.hash(),
            plain_destination_hash(&name_hash("app", &["a", "b"]))
        );
        assert_eq!(dest.expanded_name(), "app.a.b");
    }

    #[test]
    fn plain_destination_passes_payload_through() {
        let dest = Destination::plain("app", &[]);
        assert_eq!(dest.encrypt(b"abc").unwrap(), b"abc");
        assert_eq!(dest.decrypt(b"abc").unwrap(), b"abc");
    }

    #[test]
    fn name_hash_is_ten_byte_prefix() {
        let nh = name_hash("app", &["x"]);
        assert_eq!(nh.as_ref(), &full_hash(b"app.x").as_ref()[..10]);
    }

    #[test]
    fn proof_destination_addresses_truncated_packet_hash() {
        let ph = PacketHash::new([5; 32]);
        let proof = ProofDestination::for_packet(&ph);
        assert_eq!(proof.hash().as_ref(), &[5; 16]);
        assert_eq!(proof.encrypt(b"sig").unwrap(), b"sig");
    }
}
