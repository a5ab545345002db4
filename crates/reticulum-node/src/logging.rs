//! Tracing subscriber configuration for Reticulum nodes.
//!
//! Log levels follow these conventions:
//! - ERROR: Unrecoverable failures
//! - WARN: Recoverable errors, failed persistence, closed interface channels
//! - INFO: Lifecycle events (node started, state restored, interface attached)
//! - DEBUG: Routing decisions and dropped packets
//! - TRACE: Wire-level data

use tracing_subscriber::EnvFilter;

use crate::config::LoggingSection;

/// `RUST_LOG` when set, otherwise `default`.
fn filter_or(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the tracing subscriber with sensible defaults.
///
/// Log level can be controlled via the `RUST_LOG` environment variable.
/// Defaults to `info` if not set.
pub fn init() {
    tracing_subscriber::fmt().with_env_filter(filter_or("info")).init();
}

/// Initialize the tracing subscriber with JSON output.
///
/// Useful for structured logging in containerized environments.
pub fn init_json() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter_or("info"))
        .init();
}

/// Initialize from the `[logging]` section. `RUST_LOG` still wins over the
/// configured level; an unparsable level falls back to `info`.
pub fn init_from_config(logging: &LoggingSection) {
    let filter = filter_or(&logging.level);
    if logging.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Initialize the tracing subscriber for tests.
///
/// Uses `try_init` to avoid panicking if called multiple times.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_or("debug"))
        .with_test_writer()
        .try_init();
}
