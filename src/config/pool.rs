//! Worker pool configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Minimum stack size accepted for worker threads.
const MIN_STACK_SIZE: usize = 64 * 1024;

/// Configuration for a [`WorkerPool`](crate::WorkerPool).
///
/// The worker count is fixed for the pool's lifetime; there is no dynamic
/// resizing. All fields have sensible defaults, so `PoolConfig::new()` with
/// builder-style `with_*` overrides is the usual way to construct one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker threads (and queues). Defaults to the number of
    /// logical CPUs.
    pub worker_count: usize,
    /// Prefix for worker thread names; the worker index is appended.
    pub thread_name_prefix: String,
    /// Stack size per worker thread, in bytes.
    pub thread_stack_size: usize,
    /// Whether idle workers steal from busy siblings' queues.
    pub enable_stealing: bool,
    /// When set, each task execution is wrapped in a
    /// [`ScopeTimer`](crate::util::timing::ScopeTimer) with this name, which
    /// appends one elapsed-time line per task to the timer's log file.
    /// Diagnostics only.
    pub timing_scope: Option<String>,
    /// Directory for timing-scope log files. When unset, timers write to
    /// their standard directory.
    pub timing_log_dir: Option<PathBuf>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            thread_name_prefix: "conveyor-worker".to_string(),
            thread_stack_size: 2 * 1024 * 1024,
            enable_stealing: true,
            timing_scope: None,
            timing_log_dir: None,
        }
    }
}

impl PoolConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads.
    #[must_use]
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the per-thread stack size in bytes.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Enable or disable work stealing.
    #[must_use]
    pub const fn with_stealing(mut self, enabled: bool) -> Self {
        self.enable_stealing = enabled;
        self
    }

    /// Wrap every task execution in a named timing scope.
    #[must_use]
    pub fn with_timing_scope(mut self, name: impl Into<String>) -> Self {
        self.timing_scope = Some(name.into());
        self
    }

    /// Direct timing-scope log files to an explicit directory.
    #[must_use]
    pub fn with_timing_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.timing_log_dir = Some(dir.into());
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// A message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.thread_stack_size < MIN_STACK_SIZE {
            return Err(format!("thread_stack_size must be at least {MIN_STACK_SIZE} bytes"));
        }
        if self.thread_name_prefix.is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        Ok(())
    }

    /// Parse a configuration from a JSON string and validate it.
    ///
    /// # Errors
    ///
    /// A parse error message, or the first validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = PoolConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(cfg.worker_count >= 1);
        assert!(cfg.enable_stealing);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let cfg = PoolConfig::new().with_worker_count(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn tiny_stack_is_rejected() {
        let cfg = PoolConfig::new().with_thread_stack_size(4096);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn builder_methods_override_defaults() {
        let cfg = PoolConfig::new()
            .with_worker_count(8)
            .with_thread_name_prefix("crunch")
            .with_stealing(false)
            .with_timing_scope("task")
            .with_timing_log_dir("/tmp/crunch-timers");
        assert_eq!(cfg.worker_count, 8);
        assert_eq!(cfg.thread_name_prefix, "crunch");
        assert!(!cfg.enable_stealing);
        assert_eq!(cfg.timing_scope.as_deref(), Some("task"));
        assert_eq!(cfg.timing_log_dir, Some(PathBuf::from("/tmp/crunch-timers")));
    }

    #[test]
    fn parses_partial_json_with_defaults() {
        let cfg = PoolConfig::from_json_str(r#"{"worker_count": 3}"#).unwrap();
        assert_eq!(cfg.worker_count, 3);
        assert_eq!(cfg.thread_name_prefix, "conveyor-worker");
    }

    #[test]
    fn invalid_json_values_fail_validation() {
        assert!(PoolConfig::from_json_str(r#"{"worker_count": 0}"#).is_err());
        assert!(PoolConfig::from_json_str("not json").is_err());
    }
}
