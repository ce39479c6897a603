//! Core scheduling engine.
//!
//! The pieces, leaf first: [`task::Task`] type-erases one unit of work;
//! [`queue::WorkerQueue`] is the per-worker lock-guarded deque;
//! [`dispatch::Dispatcher`] picks the least-loaded queue for each submission;
//! [`worker`] holds the shared pool state and the worker run loop (including
//! stealing); [`pool::WorkerPool`] owns everything and exposes the public
//! submit/wait/shutdown surface.

mod dispatch;
mod error;
mod handle;
mod pool;
mod queue;
mod task;
mod worker;

pub use error::{PoolError, TaskError};
pub use handle::TaskHandle;
pub use pool::{PoolStats, WorkerPool};
