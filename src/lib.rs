//! # Conveyor
//!
//! A fixed-size pool of dedicated OS worker threads with per-worker task
//! queues, least-loaded dispatch, and work stealing.
//!
//! Each worker owns exactly one double-ended queue guarded by its own mutex
//! and condition variable. Submissions are placed on the least-loaded queue
//! and return a [`TaskHandle`] that resolves to the closure's return value,
//! its captured panic, or an explicit abandonment marker if the pool is shut
//! down before the task ever ran.
//!
//! ## Guarantees
//!
//! - **Exactly-once execution**: every accepted task runs at most once, and
//!   runs exactly once unless discarded by an explicit shutdown.
//! - **Per-queue FIFO**: tasks dispatched to the same queue execute in
//!   submission order. There is no pool-wide ordering.
//! - **Panic isolation**: a panicking task resolves its own handle to an
//!   error and never takes down its worker thread or the pool.
//! - **Deterministic teardown**: dropping the pool waits for queued work,
//!   requests shutdown, and joins every worker thread.
//!
//! ## Example
//!
//! ```rust
//! use conveyor::{PoolConfig, WorkerPool};
//!
//! let pool = WorkerPool::new(PoolConfig::new().with_worker_count(4)).unwrap();
//!
//! let handle = pool.submit(|| 2 + 2).unwrap();
//! assert_eq!(handle.wait().unwrap(), 4);
//!
//! // Block until every queue has drained, then tear down.
//! pool.wait();
//! pool.shutdown();
//! ```
//!
//! ## Instrumentation
//!
//! The pool emits structured [`tracing`] events throughout its lifecycle.
//! [`util::timing::ScopeTimer`] is a standalone duration logger that appends
//! one elapsed-time line to a per-name log file on drop; setting
//! [`PoolConfig::timing_scope`] wraps every task execution in such a scope.
//! Neither is a correctness dependency.

/// Configuration models for the worker pool.
pub mod config;
/// Core scheduling engine: tasks, queues, dispatch, workers, and lifecycle.
pub mod core;
/// Shared utilities: telemetry bootstrap and the scope timer.
pub mod util;

pub use config::PoolConfig;
pub use core::{PoolError, PoolStats, TaskError, TaskHandle, WorkerPool};
