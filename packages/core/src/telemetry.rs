//! Logging setup
//!
//! `RUST_LOG` selects what is logged; without it only this crate's `info`
//! events and above are shown.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "contentforge_core=info";

/// Filter from `RUST_LOG`, falling back to `default`
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global `fmt` subscriber
///
/// Returns `false` when a subscriber was already installed, which happens
/// when several tests initialise logging in one process.
pub fn init_tracing(default: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default))
        .try_init()
        .is_ok()
}
