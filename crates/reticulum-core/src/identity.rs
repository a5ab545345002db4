//! The identity boundary.
//!
//! Key generation, signatures and asymmetric encryption live outside the
//! routing core. The core consumes them through [`Identity`], and turns a
//! public key seen on the wire into a usable identity through
//! [`IdentityResolver`].

extern crate alloc;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::constants::KEYSIZE;
use crate::error::IdentityError;
use crate::hash::truncated_hash;
use crate::types::{IdentityHash, Signature};

/// A network identity: a 64-byte public key and, optionally, its private half.
pub trait Identity: core::fmt::Debug + Send + Sync {
    /// Truncated hash of [`Identity::public_key`].
    fn hash(&self) -> IdentityHash;

    fn public_key(&self) -> [u8; KEYSIZE];

    fn has_private_key(&self) -> bool;

    fn sign(&self, data: &[u8]) -> Result<Signature, IdentityError>;

    fn verify(&self, data: &[u8], signature: &Signature) -> bool;

    /// Encrypt to the holder of this identity.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, IdentityError>;

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, IdentityError>;
}

/// Builds public-only identities from keys carried in announces and
/// tunnel synthesis packets.
pub trait IdentityResolver: Send + Sync {
    fn from_public_key(&self, public_key: &[u8; KEYSIZE]) -> Result<Arc<dyn Identity>, IdentityError>;
}

/// Identity hash for a raw public key.
pub fn identity_hash(public_key: &[u8]) -> IdentityHash {
    truncated_hash(public_key).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_hash_is_truncated_sha256() {
        let key = [0x42u8; KEYSIZE];
        assert_eq!(
            identity_hash(&key).as_ref(),
            &crate::hash::full_hash(&key).as_ref()[..16]
        );
    }
}
