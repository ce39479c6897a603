//! Shared utilities.

pub mod telemetry;
pub mod timing;

pub use timing::{ScopeTimer, TimeUnit};
