//! Routing tables and the transport engine for the Reticulum routing core.
//!
//! [`TransportEngine`] is the entry point: feed it received frames, packets
//! to send and clock ticks, and carry out the [`TransportAction`]s it
//! returns. The table modules are usable on their own and hold no engine
//! state.

pub mod action;
pub mod announce;
pub mod cache;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod interface;
pub mod path;
pub mod path_decision;
pub mod receipt;
pub mod router;

pub use action::{Dispatch, TransportAction};
pub use config::TransportConfig;
pub use engine::TransportEngine;
pub use error::TransportError;
pub use interface::{InterfaceId, InterfaceInfo, InterfaceMode, InterfaceRole};
