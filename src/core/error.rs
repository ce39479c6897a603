//! Error types for pool operations and task outcomes.

use thiserror::Error;

/// Errors produced by the pool's public surface.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool has been shut down; no further submissions are accepted.
    #[error("pool has been shut down")]
    Shutdown,
    /// A worker thread failed to start during construction. Any threads that
    /// did start have already been joined.
    #[error("failed to start worker thread: {0}")]
    Startup(#[from] std::io::Error),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Outcomes a [`TaskHandle`](crate::TaskHandle) can resolve to besides the
/// task's return value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The task panicked while executing; the payload is the panic message.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// The task was still queued when the pool tore down and never ran.
    #[error("task abandoned before execution")]
    Abandoned,
    /// A bounded wait on the handle expired before the task resolved.
    #[error("timed out waiting for task result")]
    Timeout,
}
