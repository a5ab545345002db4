//! Deterministic identities for tests.
//!
//! [`TestIdentity`] is not cryptographically meaningful. Its "signature" is a
//! keyed digest any holder of the public key can recompute, and its cipher
//! is a SHA-256 keystream. Both are enough to exercise routing, which only
//! needs to tell a valid signature from a forged one.

extern crate alloc;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::constants::{KEYSIZE, SIGLENGTH};
use crate::error::IdentityError;
use crate::hash::full_hash_parts;
use crate::identity::{Identity, IdentityResolver, identity_hash};
use crate::types::{IdentityHash, Signature};

const CIPHER_TAG: &[u8; 4] = b"TSTC";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestIdentity {
    public_key: [u8; KEYSIZE],
    private: bool,
}

impl TestIdentity {
    /// Identity with a private key derived from `seed`.
    pub fn from_seed(seed: u64) -> Self {
        let seed = seed.to_be_bytes();
        let mut public_key = [0u8; KEYSIZE];
        public_key[..32].copy_from_slice(full_hash_parts(&[b"enc", &seed]).as_ref());
        public_key[32..].copy_from_slice(full_hash_parts(&[b"sig", &seed]).as_ref());
        TestIdentity {
            public_key,
            private: true,
        }
    }

    pub fn public_only(public_key: [u8; KEYSIZE]) -> Self {
        TestIdentity {
            public_key,
            private: false,
        }
    }

    /// A copy without the private half.
    pub fn to_public(&self) -> Self {
        Self::public_only(self.public_key)
    }

    fn digest(&self, data: &[u8]) -> [u8; SIGLENGTH] {
        let mut out = [0u8; SIGLENGTH];
        out[..32].copy_from_slice(full_hash_parts(&[&self.public_key, data]).as_ref());
        out[32..].copy_from_slice(full_hash_parts(&[data, &self.public_key]).as_ref());
        out
    }

    fn keystream_apply(&self, data: &mut [u8]) {
        for (block, chunk) in data.chunks_mut(32).enumerate() {
            let counter = (block as u32).to_be_bytes();
            let pad = full_hash_parts(&[&self.public_key, &counter]);
            for (byte, key) in chunk.iter_mut().zip(pad.as_ref()) {
                *byte ^= key;
            }
        }
    }
}

impl Identity for TestIdentity {
    fn hash(&self) -> IdentityHash {
        identity_hash(&self.public_key)
    }

    fn public_key(&self) -> [u8; KEYSIZE] {
        self.public_key
    }

    fn has_private_key(&self) -> bool {
        self.private
    }

    fn sign(&self, data: &[u8]) -> Result<Signature, IdentityError> {
        if !self.private {
            return Err(IdentityError::NoPrivateKey);
        }
        Ok(Signature::new(self.digest(data)))
    }

    fn verify(&self, data: &[u8], signature: &Signature) -> bool {
        self.digest(data) == signature.to_bytes()
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, IdentityError> {
        let mut out = Vec::with_capacity(CIPHER_TAG.len() + plaintext.len());
        out.extend_from_slice(CIPHER_TAG);
        out.extend_from_slice(plaintext);
        self.keystream_apply(&mut out[CIPHER_TAG.len()..]);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, IdentityError> {
        if !self.private {
            return Err(IdentityError::NoPrivateKey);
        }
        let body = ciphertext
            .strip_prefix(CIPHER_TAG.as_slice())
            .ok_or(IdentityError::DecryptionFailed)?;
        let mut out = body.to_vec();
        self.keystream_apply(&mut out);
        Ok(out)
    }
}

/// Resolves any 64-byte key to a public-only [`TestIdentity`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TestResolver;

impl IdentityResolver for TestResolver {
    fn from_public_key(
        &self,
        public_key: &[u8; KEYSIZE],
    ) -> Result<Arc<dyn Identity>, IdentityError> {
        Ok(Arc::new(TestIdentity::public_only(*public_key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_verifies_from_public_half() {
        let identity = TestIdentity::from_seed(1);
        let sig = identity.sign(b"message").unwrap();
        let public = identity.to_public();
        assert!(public.verify(b"message", &sig));
        assert!(!public.verify(b"messagf", &sig));
        assert!(!TestIdentity::from_seed(2).verify(b"message", &sig));
    }

    #[test]
    fn public_only_cannot_sign_or_decrypt() {
        let public = TestIdentity::from_seed(3).to_public();
        assert_eq!(public.sign(b"x").unwrap_err(), IdentityError::NoPrivateKey);
        let ct = public.encrypt(b"x").unwrap();
        assert_eq!(public.decrypt(&ct).unwrap_err(), IdentityError::NoPrivateKey);
    }

    #[test]
    fn cipher_roundtrip_across_blocks() {
        let identity = TestIdentity::from_seed(4);
        let plaintext = [0x5Au8; 100];
        let ct = identity.to_public().encrypt(&plaintext).unwrap();
        assert_ne!(&ct[4..], &plaintext[..]);
        assert_eq!(identity.decrypt(&ct).unwrap(), plaintext);
        assert_eq!(
            identity.decrypt(b"junk").unwrap_err(),
            IdentityError::DecryptionFailed
        );
    }
}
