//! Per-worker task queue: a deque guarded by its own mutex/condvar pair.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::core::task::Task;

/// One double-ended task queue, exclusively owned by a single worker thread.
///
/// Every mutation of the deque happens under the queue's own lock. The
/// `depth` counter is a relaxed snapshot maintained alongside the deque; it
/// exists purely so the dispatcher and stealers can compare backlogs without
/// taking the lock. It is advisory, never a source of truth.
///
/// Enqueue and its `notify_one` happen while the lock is held, so a worker
/// blocked on [`WorkerQueue::wait_for_work`] can never observe "non-empty but
/// not yet notified" and miss a wakeup.
pub(crate) struct WorkerQueue {
    tasks: Mutex<VecDeque<Task>>,
    ready: Condvar,
    depth: AtomicUsize,
}

impl WorkerQueue {
    pub(crate) fn new() -> Self {
        Self {
            tasks: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
            depth: AtomicUsize::new(0),
        }
    }

    /// Append a task at the back (dispatch path) and wake the owning worker.
    pub(crate) fn push_back(&self, task: Task) {
        let mut tasks = self.tasks.lock();
        tasks.push_back(task);
        self.depth.store(tasks.len(), Ordering::Relaxed);
        self.ready.notify_one();
    }

    /// Prepend a task at the front (steal landing path) and wake the owning
    /// worker.
    pub(crate) fn push_front(&self, task: Task) {
        let mut tasks = self.tasks.lock();
        tasks.push_front(task);
        self.depth.store(tasks.len(), Ordering::Relaxed);
        self.ready.notify_one();
    }

    /// Take the oldest task, if any. Test convenience; the worker loop uses
    /// [`WorkerQueue::pop_front_locked`] inside its wait loop instead.
    #[cfg(test)]
    pub(crate) fn pop_front(&self) -> Option<Task> {
        let mut tasks = self.tasks.lock();
        let task = tasks.pop_front();
        self.depth.store(tasks.len(), Ordering::Relaxed);
        task
    }

    /// Pop the front of an already-locked deque, keeping the depth snapshot
    /// in step. Used inside the worker's wait loop.
    pub(crate) fn pop_front_locked(&self, tasks: &mut MutexGuard<'_, VecDeque<Task>>) -> Option<Task> {
        let task = tasks.pop_front();
        self.depth.store(tasks.len(), Ordering::Relaxed);
        task
    }

    /// Take the newest task from an already-locked deque (steal victim side).
    pub(crate) fn pop_back_locked(&self, tasks: &mut MutexGuard<'_, VecDeque<Task>>) -> Option<Task> {
        let task = tasks.pop_back();
        self.depth.store(tasks.len(), Ordering::Relaxed);
        task
    }

    /// Lock the deque. Workers hold this only across the dequeue step, never
    /// across task execution.
    pub(crate) fn lock(&self) -> MutexGuard<'_, VecDeque<Task>> {
        self.tasks.lock()
    }

    /// Try to lock the deque without blocking. Stealers use this so a
    /// contended victim is skipped rather than waited on.
    pub(crate) fn try_lock(&self) -> Option<MutexGuard<'_, VecDeque<Task>>> {
        self.tasks.try_lock()
    }

    /// Block the owning worker until woken by an enqueue or [`wake_all`].
    ///
    /// Spurious wakeups are possible; callers re-check their condition under
    /// the lock.
    ///
    /// [`wake_all`]: WorkerQueue::wake_all
    pub(crate) fn wait_for_work(&self, tasks: &mut MutexGuard<'_, VecDeque<Task>>) {
        self.ready.wait(tasks);
    }

    /// Block like [`WorkerQueue::wait_for_work`], but give up after
    /// `timeout`. Returns `true` when woken by a notification, `false` on
    /// timeout. Idle stealing workers use this to bound how long they park
    /// between sibling scans.
    pub(crate) fn wait_for_work_for(
        &self,
        tasks: &mut MutexGuard<'_, VecDeque<Task>>,
        timeout: Duration,
    ) -> bool {
        !self.ready.wait_for(tasks, timeout).timed_out()
    }

    /// Wake every thread blocked on this queue. Acquires the lock first so a
    /// worker between its condition check and its wait cannot miss the
    /// notification.
    pub(crate) fn wake_all(&self) {
        let _tasks = self.tasks.lock();
        self.ready.notify_all();
    }

    /// Advisory backlog snapshot, read without the lock.
    pub(crate) fn len(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Advisory emptiness snapshot, read without the lock.
    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return every queued task. Teardown drain path; dropping
    /// the returned tasks resolves their handles.
    pub(crate) fn drain(&self) -> Vec<Task> {
        let mut tasks = self.tasks.lock();
        let drained = tasks.drain(..).collect();
        self.depth.store(0, Ordering::Relaxed);
        drained
    }
}

impl std::fmt::Debug for WorkerQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerQueue").field("depth", &self.len()).finish()
    }
}
