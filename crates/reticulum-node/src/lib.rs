//! Node orchestration for the Reticulum routing core.
//!
//! This crate hosts a [`TransportEngine`](reticulum_transport::TransportEngine)
//! on a tokio task, providing configuration, persistence, and the handler
//! callbacks applications use to receive traffic.

pub mod announce_cache;
pub mod config;
pub mod error;
pub mod handle;
pub mod handler;
pub mod logging;
pub mod node;
pub mod storage;
pub mod storage_codec;

pub use announce_cache::AnnounceCache;
pub use config::NodeConfig;
pub use error::NodeError;
pub use handle::{NodeHandle, PathInfo, SendOutcome};
pub use handler::{
    AnnounceHandler, DeliveredPacket, DestinationHandler, LinkEvent, LinkHandler, ReceiptHandler,
    ReceivedAnnounce,
};
pub use node::Node;
pub use storage::Storage;
