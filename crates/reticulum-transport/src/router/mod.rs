//! Relay state: header rewriting, reverse and link tables, tunnels.
//!
//! Everything a node needs to carry packets that are not addressed to it,
//! and to route their proofs back along the way they came.

pub mod constants;
pub mod header;
pub mod tables;
pub mod tunnel;
pub mod types;

pub use constants::*;
pub use header::{inject_transport_header, replace_transport_id, strip_transport_header};
pub use tables::{LinkTable, ReverseTable};
pub use tunnel::{TunnelEntry, TunnelPath, TunnelSynthesis, TunnelTable};
pub use types::{LinkEntry, ReverseEntry};
