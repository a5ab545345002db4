//! Error types for the reticulum-core crate.

use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    TooShort { min: usize, actual: usize },
    InvalidHeaderType(u8),
    InvalidPropagationType(u8),
    InvalidDestinationType(u8),
    InvalidPacketType(u8),
    InvalidContextType(u8),
    /// Packing was attempted without a bound destination.
    NoDestination,
    /// A header-2 packet needs a transport id to address.
    MissingTransportId,
    ExceedsMtu { mtu: usize, actual: usize },
    /// The packet has not been packed yet.
    NotPacked,
    Encryption(IdentityError),
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketError::TooShort { min, actual } => {
                write!(
                    f,
                    "packet too short: need at least {min} bytes, got {actual}"
                )
            }
            PacketError::InvalidHeaderType(v) => write!(f, "invalid header type: {v}"),
            PacketError::InvalidPropagationType(v) => write!(f, "invalid propagation type: {v}"),
            PacketError::InvalidDestinationType(v) => {
                write!(f, "invalid destination type: {v}")
            }
            PacketError::InvalidPacketType(v) => write!(f, "invalid packet type: {v}"),
            PacketError::InvalidContextType(v) => write!(f, "invalid context type: {v}"),
            PacketError::NoDestination => write!(f, "no destination bound to packet"),
            PacketError::MissingTransportId => {
                write!(f, "header type 2 packet has no transport id")
            }
            PacketError::ExceedsMtu { mtu, actual } => {
                write!(f, "packed size {actual} exceeds MTU of {mtu} bytes")
            }
            PacketError::NotPacked => write!(f, "packet has not been packed"),
            PacketError::Encryption(e) => write!(f, "payload encryption failed: {e}"),
        }
    }
}

impl From<IdentityError> for PacketError {
    fn from(e: IdentityError) -> Self {
        PacketError::Encryption(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PacketError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    NoPrivateKey,
    DecryptionFailed,
    EncryptionFailed,
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityError::NoPrivateKey => write!(f, "no private key available"),
            IdentityError::DecryptionFailed => write!(f, "decryption failed"),
            IdentityError::EncryptionFailed => write!(f, "encryption failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for IdentityError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnounceError {
    PayloadTooShort { min: usize, actual: usize },
    NotAnAnnounce,
    InvalidSignature,
    InvalidDestinationHash,
    IdentityError(IdentityError),
    PacketError(PacketError),
}

impl fmt::Display for AnnounceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnounceError::PayloadTooShort { min, actual } => {
                write!(
                    f,
                    "announce payload too short: need at least {min} bytes, got {actual}"
                )
            }
            AnnounceError::NotAnAnnounce => write!(f, "packet is not an announce"),
            AnnounceError::InvalidSignature => write!(f, "invalid announce signature"),
            AnnounceError::InvalidDestinationHash => {
                write!(f, "destination hash does not match identity")
            }
            AnnounceError::IdentityError(e) => write!(f, "identity error: {e}"),
            AnnounceError::PacketError(e) => write!(f, "packet error: {e}"),
        }
    }
}

impl From<IdentityError> for AnnounceError {
    fn from(e: IdentityError) -> Self {
        AnnounceError::IdentityError(e)
    }
}

impl From<PacketError> for AnnounceError {
    fn from(e: PacketError) -> Self {
        AnnounceError::PacketError(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AnnounceError {}

#[cfg(test)]
mod tests {
    extern crate alloc;
    use alloc::string::ToString;

    use super::*;

    #[test]
    fn packet_error_display() {
        let err = PacketError::ExceedsMtu {
            mtu: 500,
            actual: 512,
        };
        assert_eq!(err.to_string(), "packed size 512 exceeds MTU of 500 bytes");
        assert_eq!(
            PacketError::NoDestination.to_string(),
            "no destination bound to packet"
        );
    }

    #[test]
    fn identity_error_converts_into_packet_error() {
        let err: PacketError = IdentityError::EncryptionFailed.into();
        assert!(matches!(err, PacketError::Encryption(_)));
        assert!(err.to_string().contains("encryption failed"));
    }

    #[test]
    fn announce_error_wraps_packet_error() {
        let err: AnnounceError = PacketError::InvalidPacketType(9).into();
        assert_eq!(err.to_string(), "packet error: invalid packet type: 9");
    }
}
