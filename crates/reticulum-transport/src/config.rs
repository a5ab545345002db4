//! Transport engine configuration.

use serde::{Deserialize, Serialize};

use crate::dedup::{HASHLIST_MAX_SIZE, MAX_PR_TAGS};
use crate::path::PATH_TABLE_MAX_SIZE;
use crate::receipt::MAX_RECEIPTS;

/// Knobs for one [`TransportEngine`](crate::engine::TransportEngine).
///
/// Deserializes from the `[transport]` table of the node configuration;
/// every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Relay packets and rebroadcast announces for others.
    #[serde(default)]
    pub enable_transport: bool,

    /// This engine is a client of a shared instance reached over an
    /// interface with role `shared_instance`.
    #[serde(default)]
    pub connected_to_shared_instance: bool,

    #[serde(default = "default_hashlist_max_size")]
    pub hashlist_max_size: usize,

    #[serde(default = "default_max_pr_tags")]
    pub max_pr_tags: usize,

    /// Path table cap. The oldest paths are evicted beyond it.
    #[serde(default = "default_path_table_max_size")]
    pub path_table_max_size: usize,

    /// Prove packets with a bare signature rather than hash + signature.
    #[serde(default = "default_true")]
    pub use_implicit_proof: bool,

    #[serde(default = "default_max_receipts")]
    pub max_receipts: usize,
}

fn default_hashlist_max_size() -> usize {
    HASHLIST_MAX_SIZE
}

fn default_max_pr_tags() -> usize {
    MAX_PR_TAGS
}

fn default_path_table_max_size() -> usize {
    PATH_TABLE_MAX_SIZE
}

fn default_true() -> bool {
    true
}

fn default_max_receipts() -> usize {
    MAX_RECEIPTS
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            enable_transport: false,
            connected_to_shared_instance: false,
            hashlist_max_size: default_hashlist_max_size(),
            max_pr_tags: default_max_pr_tags(),
            path_table_max_size: default_path_table_max_size(),
            use_implicit_proof: true,
            max_receipts: default_max_receipts(),
        }
    }
}

impl TransportConfig {
    /// Configuration of a transport node.
    pub fn transport() -> Self {
        Self {
            enable_transport: true,
            ..Self::default()
        }
    }
}
