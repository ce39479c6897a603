//! Tracing bootstrap for the pool's structured logging.
//!
//! Pool lifecycle events, task faults, and steals are emitted through
//! [`tracing`]. Embedders that install their own subscriber keep it; this
//! helper only fills the gap when none is set.

use tracing_subscriber::EnvFilter;

/// Filter applied when `RUST_LOG` is unset: warnings from this crate only.
const FALLBACK_FILTER: &str = "conveyor=warn";

/// Install a formatting subscriber if no global dispatcher is set yet.
///
/// The filter honors `RUST_LOG` and falls back to crate-level warnings.
/// Calling this more than once is harmless.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
