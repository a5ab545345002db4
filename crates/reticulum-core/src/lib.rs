//! Core types, constants, and wire formats for the Reticulum routing core.
//!
//! This crate defines the newtype wrappers, packet wire format, addressing,
//! announce payloads and the identity boundary used by transport.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod announce;
pub mod constants;
pub mod destination;
pub mod error;
pub mod hash;
pub mod identity;
pub mod packet;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use announce::Announce;
pub use constants::{DestinationType, HeaderType, PacketType, PropagationType};
pub use destination::{Destination, PacketTarget, ProofDestination, ProofStrategy};
pub use error::{AnnounceError, IdentityError, PacketError};
pub use identity::{Identity, IdentityResolver};
pub use packet::builder::Packet;
pub use packet::context::ContextType;
pub use packet::flags::PacketFlags;
pub use packet::wire::RawPacket;
pub use types::{
    DestinationHash, FullHash, IdentityHash, InvalidLength, LinkId, NameHash, PacketHash,
    RandomBlob, Signature, TruncatedHash, TunnelId,
};
