//! Announce propagation and rate limiting.
//!
//! Relayed announces wait in the [`AnnounceTable`] for a jittered
//! retransmission. Announces that exceed an interface's bandwidth cap wait
//! in that interface's [`AnnounceQueue`]. Ingress floods from a single
//! destination are throttled by the [`AnnounceRateTable`].

pub mod constants;
pub mod queue;
pub mod rate;
pub mod table;

pub use constants::*;
pub use queue::{AnnounceQueue, QueuedAnnounce};
pub use rate::{AnnounceRateEntry, AnnounceRateTable};
pub use table::{AnnounceAction, AnnounceEntry, AnnounceTable};
