//! Tracing subscriber setup
//!
//! Library code only emits `tracing` events; binaries and tests that want to
//! see them call [`init_tracing`] (human-readable) or [`init_json_tracing`].
//! The filter comes from `CONFMGR_LOG`, e.g. `CONFMGR_LOG=confmgr_core=debug`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "CONFMGR_LOG";

/// Filter used when `CONFMGR_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "info";

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| DEFAULT_FILTER.into())
}

/// Install a human-readable global subscriber
///
/// Returns false if a global subscriber was already installed.
pub fn init_tracing() -> bool {
    tracing_subscriber::registry()
        .with(filter())
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

/// Install a JSON-lines global subscriber
///
/// Returns false if a global subscriber was already installed.
pub fn init_json_tracing() -> bool {
    tracing_subscriber::registry()
        .with(filter())
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .is_ok()
}
