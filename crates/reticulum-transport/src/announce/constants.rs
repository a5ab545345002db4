//! Announce propagation constants. Times are in seconds.

/// Retransmissions of a relayed announce beyond the first.
pub const PATHFINDER_R: u32 = 1;

/// Grace period between retransmissions.
pub const PATHFINDER_G: f64 = 5.0;

/// Upper bound of the random rebroadcast delay.
pub const PATHFINDER_RW: f64 = 0.5;

/// Neighbour rebroadcasts heard before our own retransmission is dropped.
pub const LOCAL_REBROADCASTS_MAX: u32 = 2;

/// Default share of interface bandwidth available to announces.
pub const ANNOUNCE_CAP: f64 = 0.02;

/// Announces waiting on one interface before new ones are dropped.
pub const MAX_QUEUED_ANNOUNCES: usize = 16_384;

/// Queued announces older than this are discarded (1 day).
pub const QUEUED_ANNOUNCE_LIFE: f64 = 60.0 * 60.0 * 24.0;

/// Arrival timestamps kept per destination for rate control.
pub const MAX_RATE_TIMESTAMPS: usize = 16;

/// How often the announce table is processed.
pub const ANNOUNCES_CHECK_INTERVAL: f64 = 1.0;
