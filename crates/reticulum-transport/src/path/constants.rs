//! Path table constants. Times are in seconds.

/// Default path expiration (7 days).
pub const PATHFINDER_E: f64 = 60.0 * 60.0 * 24.0 * 7.0;

/// Access point path time (1 day).
pub const AP_PATH_TIME: f64 = 60.0 * 60.0 * 24.0;

/// Roaming path time (6 hours).
pub const ROAMING_PATH_TIME: f64 = 60.0 * 60.0 * 6.0;

/// Hop ceiling; also reported as the hop count of unknown destinations.
pub const PATHFINDER_M: u8 = 128;

/// Default path table cap.
pub const PATH_TABLE_MAX_SIZE: usize = 100_000;

/// Random blobs remembered per path entry.
pub const MAX_RANDOM_BLOBS: usize = 64;

/// Minimum interval between automatic path requests for one destination.
pub const PATH_REQUEST_MI: f64 = 20.0;

/// How long a discovery request waits for an answer.
pub const PATH_REQUEST_TIMEOUT: f64 = 15.0;

/// Delay before answering a path request from the network.
pub const PATH_REQUEST_GRACE: f64 = 0.4;

/// Extra delay for path requests answered on roaming interfaces.
pub const PATH_REQUEST_RG: f64 = 1.5;

/// How long a path-response announce for one tag is reused.
pub const PR_TAG_WINDOW: f64 = 30.0;

/// Lifetime of tunnel entries (7 days).
pub const DESTINATION_TIMEOUT: f64 = 60.0 * 60.0 * 24.0 * 7.0;
