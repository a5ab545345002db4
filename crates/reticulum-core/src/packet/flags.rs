//! The packet flags byte.
//!
//! ```text
//! Bit 7:    IFAC present
//! Bit 6:    header type (0 = one address, 1 = transport id + destination)
//! Bits 5-4: propagation type (broadcast, transport, relay, tunnel)
//! Bits 3-2: destination type (single, group, plain, link)
//! Bits 1-0: packet type (data, announce, link request, proof)
//! ```
//!
//! Only the low nibble participates in the packet hash, so a relay may flip
//! the header and propagation bits without changing packet identity.

use crate::constants::{DestinationType, HeaderType, PacketType, PropagationType};
use crate::error::PacketError;

/// Mask selecting the bits of the flags byte that are part of the packet hash.
pub const HASHED_FLAGS_MASK: u8 = 0x0F;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketFlags {
    pub ifac: bool,
    pub header_type: HeaderType,
    pub propagation_type: PropagationType,
    pub destination_type: DestinationType,
    pub packet_type: PacketType,
}

impl PacketFlags {
    /// Flags for a single-address packet with no interface access code.
    pub const fn header1(
        propagation_type: PropagationType,
        destination_type: DestinationType,
        packet_type: PacketType,
    ) -> Self {
        Self {
            ifac: false,
            header_type: HeaderType::Header1,
            propagation_type,
            destination_type,
            packet_type,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self, PacketError> {
        Ok(PacketFlags {
            ifac: byte & 0x80 != 0,
            header_type: HeaderType::from_u8((byte >> 6) & 0x01)?,
            propagation_type: PropagationType::from_u8((byte >> 4) & 0x03)?,
            destination_type: DestinationType::from_u8((byte >> 2) & 0x03)?,
            packet_type: PacketType::from_u8(byte & 0x03)?,
        })
    }

    pub fn to_byte(&self) -> u8 {
        ((self.ifac as u8) << 7)
            | ((self.header_type as u8) << 6)
            | ((self.propagation_type as u8) << 4)
            | ((self.destination_type as u8) << 2)
            | (self.packet_type as u8)
    }

    /// The same flags re-addressed for transport through a named relay.
    pub fn into_transport(self) -> Self {
        Self {
            header_type: HeaderType::Header2,
            propagation_type: PropagationType::Transport,
            ..self
        }
    }

    /// The same flags with the relay address dropped.
    pub fn into_broadcast(self) -> Self {
        Self {
            header_type: HeaderType::Header1,
            propagation_type: PropagationType::Broadcast,
            ..self
        }
    }
}
