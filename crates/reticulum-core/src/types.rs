//! Fixed-width byte newtypes used for addressing and packet identity.
//!
//! Every address-like value on the wire is a plain byte array. Wrapping each
//! role in its own type keeps a destination hash from being passed where a
//! link id or transport id is expected, even though all three are 16 bytes.

use core::fmt;

fn fmt_hex(bytes: &[u8], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for byte in bytes {
        write!(f, "{:02x}", byte)?;
    }
    Ok(())
}

/// Error returned when a byte slice has the wrong length for a newtype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidLength {
    pub expected: usize,
    pub actual: usize,
}

impl fmt::Display for InvalidLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid length: expected {} bytes, got {}",
            self.expected, self.actual
        )
    }
}

#[cfg(feature = "std")]
impl std::error::Error for InvalidLength {}

macro_rules! byte_newtype {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[must_use]
        pub struct $name([u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub const fn to_bytes(self) -> [u8; $len] {
                self.0
            }

            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = InvalidLength;

            fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
                let arr: [u8; $len] = bytes.try_into().map_err(|_| InvalidLength {
                    expected: $len,
                    actual: bytes.len(),
                })?;
                Ok(Self(arr))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt_hex(&self.0, f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "("))?;
                fmt_hex(&self.0[..4], f)?;
                write!(f, "..)")
            }
        }
    };
}

/// Lets 16-byte address roles be reinterpreted where the protocol does so,
/// e.g. a proof addressed to the truncated hash of the packet it proves.
macro_rules! truncated_role {
    ($name:ident) => {
        impl From<TruncatedHash> for $name {
            fn from(hash: TruncatedHash) -> Self {
                Self(hash.0)
            }
        }

        impl From<$name> for TruncatedHash {
            fn from(value: $name) -> Self {
                TruncatedHash(value.0)
            }
        }
    };
}

byte_newtype!(
    /// First 16 bytes of a SHA-256 digest.
    TruncatedHash,
    16
);
byte_newtype!(
    /// A full 32-byte SHA-256 digest.
    FullHash,
    32
);
byte_newtype!(
    /// First 10 bytes of SHA-256 over a dotted application name.
    NameHash,
    10
);
byte_newtype!(
    /// Address of a destination on the network.
    DestinationHash,
    16
);
byte_newtype!(
    /// Truncated hash of an identity's public key. Doubles as a transport id.
    IdentityHash,
    16
);
byte_newtype!(
    /// Identifier of an encrypted link, derived from its link request.
    LinkId,
    16
);
byte_newtype!(
    /// Content hash of a packet's hashable part.
    PacketHash,
    32
);
byte_newtype!(
    /// Identifier of a relay tunnel, SHA-256 of public key and interface hash.
    TunnelId,
    32
);
byte_newtype!(
    /// A 64-byte signature produced by the identity boundary.
    Signature,
    64
);
byte_newtype!(
    /// The 10-byte announce nonce.
    ///
    /// Layout: five random bytes followed by the emission time as a 40-bit
    /// big-endian count of seconds. The emission time is read only through
    /// [`RandomBlob::emitted`].
    RandomBlob,
    10
);

truncated_role!(DestinationHash);
truncated_role!(IdentityHash);
truncated_role!(LinkId);

impl PacketHash {
    /// The first 16 bytes, used as the key of reverse-table entries and as
    /// the address of proofs.
    pub fn truncated(&self) -> TruncatedHash {
        let mut arr = [0u8; 16];
        arr.copy_from_slice(&self.0[..16]);
        TruncatedHash(arr)
    }
}

impl From<IdentityHash> for DestinationHash {
    fn from(id: IdentityHash) -> Self {
        DestinationHash(id.0)
    }
}

impl From<LinkId> for DestinationHash {
    fn from(id: LinkId) -> Self {
        DestinationHash(id.0)
    }
}

impl From<DestinationHash> for LinkId {
    fn from(dest: DestinationHash) -> Self {
        LinkId(dest.0)
    }
}

impl From<DestinationHash> for IdentityHash {
    fn from(dest: DestinationHash) -> Self {
        IdentityHash(dest.0)
    }
}

impl From<FullHash> for PacketHash {
    fn from(hash: FullHash) -> Self {
        PacketHash(hash.0)
    }
}

impl From<FullHash> for TunnelId {
    fn from(hash: FullHash) -> Self {
        TunnelId(hash.0)
    }
}

/// Largest value representable in the 40-bit emission field.
const EMISSION_MASK: u64 = (1 << 40) - 1;

impl RandomBlob {
    /// Build a blob from its random prefix and an emission time in seconds.
    ///
    /// Only the low 40 bits of `emitted` are kept.
    pub fn from_parts(nonce: [u8; 5], emitted: u64) -> Self {
        let mut bytes = [0u8; 10];
        bytes[..5].copy_from_slice(&nonce);
        bytes[5..].copy_from_slice(&(emitted & EMISSION_MASK).to_be_bytes()[3..]);
        Self(bytes)
    }

    /// Emission time of the announce that carried this blob, in seconds.
    pub fn emitted(&self) -> u64 {
        let mut be = [0u8; 8];
        be[3..].copy_from_slice(&self.0[5..]);
        u64::from_be_bytes(be)
    }

    pub fn nonce(&self) -> [u8; 5] {
        let mut nonce = [0u8; 5];
        nonce.copy_from_slice(&self.0[..5]);
        nonce
    }
}

#[cfg(test)]
mod tests {
    extern crate alloc;
    use alloc::format;

    use super::*;

    #[test]
    fn display_is_full_lowercase_hex() {
        let hash = DestinationHash::new([0xAB; 16]);
        assert_eq!(format!("{hash}"), "abababababababababababababababab");
    }

    #[test]
    fn debug_shows_name_and_prefix() {
        let hash = LinkId::new([0x01, 0x02, 0x03, 0x04, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(format!("{hash:?}"), "LinkId(01020304..)");
    }

    #[test]
    fn try_from_rejects_wrong_length() {
        let err = PacketHash::try_from(&[0u8; 16][..]).unwrap_err();
        assert_eq!(
            err,
            InvalidLength {
                expected: 32,
                actual: 16
            }
        );
        assert!(TruncatedHash::try_from(&[7u8; 16][..]).is_ok());
    }

    #[test]
    fn packet_hash_truncates_to_prefix() {
        let mut bytes = [0u8; 32];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        let truncated = PacketHash::new(bytes).truncated();
        assert_eq!(truncated.as_ref(), &bytes[..16]);
    }

    #[test]
    fn truncated_roles_convert_without_copying_semantics() {
        let t = TruncatedHash::new([9; 16]);
        let dest: DestinationHash = t.into();
        let link: LinkId = dest.into();
        assert_eq!(TruncatedHash::from(link), t);
    }

    #[test]
    fn random_blob_emission_roundtrip() {
        let blob = RandomBlob::from_parts([1, 2, 3, 4, 5], 1_700_000_000);
        assert_eq!(blob.emitted(), 1_700_000_000);
        assert_eq!(blob.nonce(), [1, 2, 3, 4, 5]);
        assert_eq!(&blob.as_bytes()[5..], &[0x00, 0x65, 0x53, 0xf1, 0x00]);
    }

    #[test]
    fn random_blob_emission_keeps_low_40_bits() {
        let blob = RandomBlob::from_parts([0; 5], u64::MAX);
        assert_eq!(blob.emitted(), (1 << 40) - 1);
    }
}
