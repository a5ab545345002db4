//! Transport layer error types.

use reticulum_core::error::{AnnounceError, IdentityError, PacketError};
use reticulum_core::types::DestinationHash;

use crate::interface::InterfaceId;

/// Errors returned by [`TransportEngine`](crate::engine::TransportEngine)
/// entry points. Inbound traffic never produces one; malformed input is
/// logged and dropped.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("packet error: {0}")]
    Packet(#[from] PacketError),

    #[error("announce error: {0}")]
    Announce(#[from] AnnounceError),

    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("router error: {0}")]
    Router(#[from] RouterError),

    #[error("packet must be packed before dispatch")]
    NotPacked,

    #[error("unknown interface: {0}")]
    UnknownInterface(InterfaceId),

    #[error("destination {0} is not registered")]
    UnknownDestination(DestinationHash),

    #[error("destination {0} has no private identity to announce with")]
    CannotAnnounce(DestinationHash),

    #[error("destination {0} is already registered")]
    DuplicateDestination(DestinationHash),
}

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("path not found: {0}")]
    NotFound(DestinationHash),

    #[error("invalid interface mode: {0}")]
    InvalidInterfaceMode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("packet error: {0}")]
    Packet(#[from] PacketError),

    #[error("tunnel synthesis payload must be {expected} bytes, got {actual}")]
    TunnelPayloadLength { expected: usize, actual: usize },

    #[error("tunnel synthesis signature is invalid")]
    TunnelSignature,

    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),
}
