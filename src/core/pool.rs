//! Pool lifecycle: construction, submission, wait, shutdown, teardown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::core::dispatch::Dispatcher;
use crate::core::error::PoolError;
use crate::core::handle::{self, TaskHandle};
use crate::core::queue::WorkerQueue;
use crate::core::task::Task;
use crate::core::worker::{self, Shared};
use crate::util::timing::{ScopeTimer, TimeUnit};

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Workers currently executing a task.
    pub active_workers: usize,
    /// Tasks queued and not yet dequeued, across all queues.
    pub queued_tasks: u64,
    /// Total tasks accepted by `submit`.
    pub submitted_tasks: u64,
    /// Tasks that completed without panicking.
    pub completed_tasks: u64,
    /// Tasks that panicked during execution.
    pub failed_tasks: u64,
    /// Tasks moved between queues by idle workers.
    pub stolen_tasks: u64,
    /// Tasks discarded unexecuted at teardown.
    pub abandoned_tasks: u64,
}

/// Thread-safe counters behind [`PoolStats`].
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub submitted_tasks: AtomicU64,
    pub queued_tasks: AtomicU64,
    pub completed_tasks: AtomicU64,
    pub failed_tasks: AtomicU64,
    pub stolen_tasks: AtomicU64,
    pub abandoned_tasks: AtomicU64,
}

impl PoolCounters {
    fn snapshot(&self, worker_count: usize, active_workers: usize) -> PoolStats {
        PoolStats {
            worker_count,
            active_workers,
            queued_tasks: self.queued_tasks.load(Ordering::Relaxed),
            submitted_tasks: self.submitted_tasks.load(Ordering::Relaxed),
            completed_tasks: self.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
            stolen_tasks: self.stolen_tasks.load(Ordering::Relaxed),
            abandoned_tasks: self.abandoned_tasks.load(Ordering::Relaxed),
        }
    }
}

/// A fixed-size pool of dedicated OS worker threads.
///
/// The worker count is set at construction and never changes. Each worker is
/// bound to exactly one queue for the pool's lifetime; submissions land on
/// the least-loaded queue and idle workers steal from busy siblings.
///
/// Dropping the pool performs the full teardown sequence: wait for queued
/// work (unless shutdown was already requested), request shutdown, join every
/// worker thread, and resolve any still-queued task's handle to
/// [`TaskError::Abandoned`](crate::TaskError::Abandoned).
pub struct WorkerPool {
    shared: Arc<Shared>,
    dispatcher: Dispatcher,
    workers: Mutex<Vec<JoinHandle<()>>>,
    config: PoolConfig,
}

impl WorkerPool {
    /// Create a pool and start its worker threads.
    ///
    /// Construction is atomic from the caller's perspective: if any thread
    /// fails to start, the threads that did start are shut down and joined
    /// before the error is returned.
    ///
    /// # Errors
    ///
    /// [`PoolError::InvalidConfig`] if the configuration fails validation,
    /// [`PoolError::Startup`] if a worker thread could not be spawned.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let queues: Vec<Arc<WorkerQueue>> =
            (0..config.worker_count).map(|_| Arc::new(WorkerQueue::new())).collect();
        let shared = Arc::new(Shared::new(queues.clone(), config.enable_stealing));

        let mut workers = Vec::with_capacity(config.worker_count);
        for index in 0..config.worker_count {
            let worker_shared = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("{}-{index}", config.thread_name_prefix))
                .stack_size(config.thread_stack_size)
                .spawn(move || worker::run(&worker_shared, index));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(source) => {
                    // Abort construction as a unit: stop and join whatever
                    // already started so no thread leaks past the error.
                    shared.done.store(true, Ordering::Release);
                    for queue in &shared.queues {
                        queue.wake_all();
                    }
                    for handle in workers {
                        let _ = handle.join();
                    }
                    warn!(worker = index, error = %source, "worker thread failed to start");
                    return Err(PoolError::Startup(source));
                }
            }
        }

        info!(
            worker_count = config.worker_count,
            stealing = config.enable_stealing,
            "worker pool started"
        );

        Ok(Self {
            shared,
            dispatcher: Dispatcher::new(queues),
            workers: Mutex::new(workers),
            config,
        })
    }

    /// Convenience constructor with the default configuration and an explicit
    /// worker count.
    ///
    /// # Errors
    ///
    /// As [`WorkerPool::new`].
    pub fn with_workers(worker_count: usize) -> Result<Self, PoolError> {
        Self::new(PoolConfig::new().with_worker_count(worker_count))
    }

    /// Submit a closure for asynchronous execution.
    ///
    /// Returns immediately with a [`TaskHandle`] that resolves to the
    /// closure's return value once a worker has executed it. Submission never
    /// blocks.
    ///
    /// # Errors
    ///
    /// [`PoolError::Shutdown`] once [`WorkerPool::shutdown`] has been called;
    /// the task is not enqueued.
    pub fn submit<F, T>(&self, job: F) -> Result<TaskHandle<T>, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.shared.done.load(Ordering::Acquire) {
            return Err(PoolError::Shutdown);
        }

        let (promise, task_handle) = handle::pair();
        let counters = Arc::clone(&self.shared.counters);
        let timing_scope = self.config.timing_scope.clone();
        let timing_dir = self.config.timing_log_dir.clone();

        let task = Task::new(move || {
            let _scope = timing_scope.map(|name| match timing_dir {
                Some(dir) => ScopeTimer::start_in(dir, name, TimeUnit::Microseconds),
                None => ScopeTimer::start(name, TimeUnit::Microseconds),
            });
            promise.complete_with(job, &counters);
        });

        self.shared.note_enqueued();
        let target = self.dispatcher.dispatch(task);
        debug!(queue = target, "task submitted");
        Ok(task_handle)
    }

    /// Block until every worker queue is observably empty.
    ///
    /// This only means no queued, not-yet-dequeued tasks remain; executions
    /// already in flight may still be running. Callers requiring full
    /// completion should additionally wait on their task handles. Returns
    /// immediately once shutdown has been requested, since a discarded
    /// backlog can never drain.
    pub fn wait(&self) {
        let mut guard = self.shared.drained_lock.lock();
        while self.shared.pending.load(Ordering::Acquire) != 0
            && !self.shared.done.load(Ordering::Acquire)
        {
            self.shared.drained.wait(&mut guard);
        }
    }

    /// Request shutdown: reject further submissions and let every worker
    /// stop. Idempotent.
    ///
    /// Tasks still queued when shutdown is requested are discarded; their
    /// handles resolve to [`TaskError::Abandoned`](crate::TaskError::Abandoned)
    /// during teardown.
    pub fn shutdown(&self) {
        if self.shared.done.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("worker pool shutting down");
        for queue in &self.shared.queues {
            queue.wake_all();
        }
        // Release wait()ers stuck behind a backlog that will never drain.
        let _guard = self.shared.drained_lock.lock();
        self.shared.drained.notify_all();
    }

    /// Snapshot of the pool's statistics counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.shared
            .counters
            .snapshot(self.config.worker_count, self.shared.active_count())
    }

    /// The fixed number of worker threads.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.config.worker_count
    }

    /// Drop every still-queued task. Dropping a task drops its promise,
    /// which resolves the matching handle to `Abandoned`.
    fn drain_queues(&self) -> usize {
        let mut discarded = 0;
        for queue in &self.shared.queues {
            let leftover = queue.drain();
            discarded += leftover.len();
            drop(leftover);
        }
        if discarded > 0 {
            self.shared.counters.queued_tasks.fetch_sub(discarded as u64, Ordering::Relaxed);
            self.shared
                .counters
                .abandoned_tasks
                .fetch_add(discarded as u64, Ordering::Relaxed);
            self.shared.pending.fetch_sub(discarded, Ordering::AcqRel);
            let _guard = self.shared.drained_lock.lock();
            self.shared.drained.notify_all();
        }
        discarded
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Graceful path: let queued work drain first. Skipped when shutdown
        // was already requested, because discarded tasks never dequeue.
        if !self.shared.done.load(Ordering::Acquire) {
            self.wait();
        }
        self.shutdown();

        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            if handle.join().is_err() {
                // Task panics are caught at the promise layer, so this only
                // fires for a defect inside the worker loop itself.
                warn!("worker thread panicked during join");
            }
        }

        let discarded = self.drain_queues();
        if discarded > 0 {
            warn!(discarded, "discarded queued tasks at teardown");
        }
        info!("worker pool destroyed");
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("worker_count", &self.config.worker_count)
            .field("queued", &self.shared.pending.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
