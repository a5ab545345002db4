//! Error types for the node runtime.

use std::path::PathBuf;

use reticulum_transport::TransportError;

pub use crate::storage::StorageError;
pub use crate::storage_codec::StorageCodecError;

/// Errors surfaced by [`Node`](crate::node::Node) and
/// [`NodeHandle`](crate::handle::NodeHandle).
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("node is not running")]
    NotRunning,
    #[error("node already started")]
    AlreadyStarted,
}

/// Errors from loading or validating a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("interface '{name}': {reason}")]
    Interface { name: String, reason: String },
    #[error("{0}")]
    Invalid(String),
}
