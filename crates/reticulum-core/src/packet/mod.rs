//! Packet framing and construction.
//!
//! [`wire`] parses and serializes frames as they travel. [`builder`] packs
//! outbound packets against a destination.

pub mod builder;
pub mod context;
pub mod flags;
pub mod wire;
