//! Path table management for destination routing.
//!
//! Tracks known paths to destinations, their hop counts, TTLs, and the
//! interfaces through which they were learned, plus the bookkeeping of the
//! path discovery protocol.

pub mod constants;
pub mod discovery;
pub mod request;
pub mod table;
pub mod types;

pub use constants::*;
pub use table::PathTable;
pub use types::{PathEntry, PathState};
