//! SHA-256 helpers shared by addressing and packet identity.

use sha2::{Digest, Sha256};

use crate::types::{FullHash, TruncatedHash};

pub fn full_hash(data: &[u8]) -> FullHash {
    FullHash::new(Sha256::digest(data).into())
}

pub fn truncated_hash(data: &[u8]) -> TruncatedHash {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest[..16]);
    TruncatedHash::new(out)
}

/// Hash several byte strings as if they were concatenated.
pub fn full_hash_parts(parts: &[&[u8]]) -> FullHash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    FullHash::new(hasher.finalize().into())
}
