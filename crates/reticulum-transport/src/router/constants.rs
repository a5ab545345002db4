//! Router constants. Times are in seconds.

/// Lifetime of reverse table entries (8 minutes).
pub const REVERSE_TIMEOUT: f64 = 8.0 * 60.0;

/// Validated link table entries expire after this much silence.
pub const LINK_TIMEOUT: f64 = 900.0;

/// Proof wait per remaining hop for relayed link requests.
pub const LINK_PROOF_TIMEOUT_PER_HOP: f64 = 6.0;

/// How often reverse, link, path and tunnel tables are culled.
pub const TABLES_CULL_INTERVAL: f64 = 5.0;

/// `public_key(64) + interface_hash(32) + random(16) + signature(64)`
pub const TUNNEL_SYNTHESIS_LEN: usize = 64 + 32 + 16 + 64;
