//! Pure serialization for persisted node state.
//!
//! Each table of a [`TransportSnapshot`] is stored as its own postcard blob
//! behind a one-byte format version, so the storage layer can skip writing
//! tables that did not change. Nothing here touches the filesystem.

use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

use reticulum_transport::engine::persist::TransportSnapshot;

/// Bumped when a persisted layout changes. Blobs of another version are
/// rejected rather than misread.
pub const FORMAT_VERSION: u8 = 1;

/// Errors from pure codec operations (no I/O variants).
#[derive(Debug, thiserror::Error)]
pub enum StorageCodecError {
    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("unsupported format version {found}, expected {FORMAT_VERSION}")]
    Version { found: u8 },
}

/// One persisted table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Paths,
    PacketHashes,
    Tunnels,
    Identities,
}

impl Table {
    pub const ALL: [Table; 4] = [
        Table::Paths,
        Table::PacketHashes,
        Table::Tunnels,
        Table::Identities,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Table::Paths => "destination_table",
            Table::PacketHashes => "packet_hashlist",
            Table::Tunnels => "tunnels",
            Table::Identities => "known_destinations",
        }
    }
}

/// SHA-256 of an encoded blob.
#[must_use]
pub fn checksum(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageCodecError> {
    postcard::to_extend(value, vec![FORMAT_VERSION])
        .map_err(|e| StorageCodecError::Serialize(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageCodecError> {
    let (&version, body) = bytes
        .split_first()
        .ok_or_else(|| StorageCodecError::Deserialize("empty blob".into()))?;
    if version != FORMAT_VERSION {
        return Err(StorageCodecError::Version { found: version });
    }
    postcard::from_bytes(body).map_err(|e| StorageCodecError::Deserialize(e.to_string()))
}

/// Encode one table of `snapshot`.
pub fn encode_table(table: Table, snapshot: &TransportSnapshot) -> Result<Vec<u8>, StorageCodecError> {
    match table {
        Table::Paths => encode(&snapshot.paths),
        Table::PacketHashes => encode(&snapshot.packet_hashes),
        Table::Tunnels => encode(&snapshot.tunnels),
        Table::Identities => encode(&snapshot.identities),
    }
}

/// Decode one table's blob into its place in `snapshot`.
pub fn decode_table(
    table: Table,
    bytes: &[u8],
    snapshot: &mut TransportSnapshot,
) -> Result<(), StorageCodecError> {
    match table {
        Table::Paths => snapshot.paths = decode(bytes)?,
        Table::PacketHashes => snapshot.packet_hashes = decode(bytes)?,
        Table::Tunnels => snapshot.tunnels = decode(bytes)?,
        Table::Identities => snapshot.identities = decode(bytes)?,
    }
    Ok(())
}
