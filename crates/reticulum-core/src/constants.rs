//! Wire-contract constants and the enumerations packed into the flags byte.

use crate::error::PacketError;

// Frame sizes
pub const MTU: usize = 500;
/// Flags + hops + one 16-byte address.
pub const HEADER_1_SIZE: usize = 18;
/// Flags + hops + transport id + destination.
pub const HEADER_2_SIZE: usize = 34;
pub const CONTEXT_SIZE: usize = 1;
pub const HEADER_MINSIZE: usize = HEADER_1_SIZE + CONTEXT_SIZE;
pub const HEADER_MAXSIZE: usize = HEADER_2_SIZE + CONTEXT_SIZE;
pub const IFAC_MIN_SIZE: usize = 1;
pub const MDU: usize = MTU - HEADER_MAXSIZE - IFAC_MIN_SIZE;
pub const ENCRYPTED_MDU: usize = 383;

// Hash and key sizes
pub const TRUNCATED_HASHLENGTH: usize = 16;
pub const HASHLENGTH: usize = 32;
pub const KEYSIZE: usize = 64;
pub const SIGLENGTH: usize = 64;
pub const NAME_HASH_LENGTH: usize = 10;
pub const RANDOM_HASH_LENGTH: usize = 10;

/// public_key + name_hash + random_hash + signature
pub const ANNOUNCE_MIN_PAYLOAD: usize = KEYSIZE + NAME_HASH_LENGTH + RANDOM_HASH_LENGTH + SIGLENGTH;

/// Application name used by the transport control destinations.
pub const TRANSPORT_APP_NAME: &str = "rnstransport";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HeaderType {
    Header1 = 0,
    Header2 = 1,
}

impl HeaderType {
    pub fn from_u8(v: u8) -> Result<Self, PacketError> {
        match v {
            0 => Ok(HeaderType::Header1),
            1 => Ok(HeaderType::Header2),
            _ => Err(PacketError::InvalidHeaderType(v)),
        }
    }

    /// Size of the address block plus flags and hops.
    pub const fn size(self) -> usize {
        match self {
            HeaderType::Header1 => HEADER_1_SIZE,
            HeaderType::Header2 => HEADER_2_SIZE,
        }
    }
}

/// How a packet travels: flooded, through a named relay, or via a tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PropagationType {
    Broadcast = 0,
    Transport = 1,
    Relay = 2,
    Tunnel = 3,
}

impl PropagationType {
    pub fn from_u8(v: u8) -> Result<Self, PacketError> {
        match v {
            0 => Ok(PropagationType::Broadcast),
            1 => Ok(PropagationType::Transport),
            2 => Ok(PropagationType::Relay),
            3 => Ok(PropagationType::Tunnel),
            _ => Err(PacketError::InvalidPropagationType(v)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DestinationType {
    Single = 0,
    Group = 1,
    Plain = 2,
    Link = 3,
}

impl DestinationType {
    pub fn from_u8(v: u8) -> Result<Self, PacketError> {
        match v {
            0 => Ok(DestinationType::Single),
            1 => Ok(DestinationType::Group),
            2 => Ok(DestinationType::Plain),
            3 => Ok(DestinationType::Link),
            _ => Err(PacketError::InvalidDestinationType(v)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Data = 0,
    Announce = 1,
    LinkRequest = 2,
    Proof = 3,
}

impl PacketType {
    pub fn from_u8(v: u8) -> Result<Self, PacketError> {
        match v {
            0 => Ok(PacketType::Data),
            1 => Ok(PacketType::Announce),
            2 => Ok(PacketType::LinkRequest),
            3 => Ok(PacketType::Proof),
            _ => Err(PacketError::InvalidPacketType(v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_contract_sizes() {
        assert_eq!(MTU, 500);
        assert_eq!(HEADER_1_SIZE, 18);
        assert_eq!(HEADER_2_SIZE, 34);
        assert_eq!(HEADER_MINSIZE, 19);
        assert_eq!(HEADER_MAXSIZE, 35);
        assert_eq!(MDU, 464);
        assert_eq!(ANNOUNCE_MIN_PAYLOAD, 148);
    }

    #[test]
    fn header_type_sizes() {
        assert_eq!(HeaderType::Header1.size(), 18);
        assert_eq!(HeaderType::Header2.size(), 34);
    }

    #[test]
    fn enum_decoding_rejects_out_of_range() {
        assert!(HeaderType::from_u8(2).is_err());
        assert!(PropagationType::from_u8(4).is_err());
        assert!(DestinationType::from_u8(4).is_err());
        assert!(PacketType::from_u8(4).is_err());
    }

    #[test]
    fn test_enum_values() {
        assert_eq!(PropagationType::Broadcast as u8, 0);
        assert_eq!(PropagationType::Transport as u8, 1);
        assert_eq!(PropagationType::Relay as u8, 2);
        assert_eq!(PropagationType::Tunnel as u8, 3);
        assert_eq!(DestinationType::Link as u8, 3);
        assert_eq!(PacketType::Proof as u8, 3);
    }
}
