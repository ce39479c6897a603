//! Promise/handle pair carrying one task's outcome to its submitter.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::warn;

use crate::core::error::TaskError;
use crate::core::pool::PoolCounters;

/// Shared one-shot slot between a [`Promise`] and its [`TaskHandle`].
struct Slot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
}

enum SlotState<T> {
    /// The task has not resolved yet.
    Pending,
    /// The task resolved; the outcome is waiting to be taken.
    Done(Result<T, TaskError>),
    /// The outcome was consumed by the handle.
    Taken,
}

/// Create a connected promise/handle pair.
pub(crate) fn pair<T>() -> (Promise<T>, TaskHandle<T>) {
    let slot = Arc::new(Slot {
        state: Mutex::new(SlotState::Pending),
        ready: Condvar::new(),
    });
    (
        Promise { slot: Arc::clone(&slot), fulfilled: false },
        TaskHandle { slot },
    )
}

/// The producing side of a result slot. Owned by the task closure.
///
/// This is the single fault-capture layer of the pool:
/// [`Promise::complete_with`] runs the callable under `catch_unwind`, so a
/// panicking task resolves its own handle and the worker loop never unwinds.
/// Dropping an unfulfilled promise (a task discarded at teardown) resolves
/// the handle to [`TaskError::Abandoned`] instead of leaving it unset.
pub(crate) struct Promise<T> {
    slot: Arc<Slot<T>>,
    fulfilled: bool,
}

impl<T> Promise<T> {
    /// Run `job`, record the outcome in `counters`, store it, and wake the
    /// handle.
    ///
    /// The counter update happens before the slot resolves: a caller that has
    /// drained a handle is guaranteed to see the matching completion or
    /// failure in the pool's statistics.
    pub(crate) fn complete_with<F>(mut self, job: F, counters: &PoolCounters)
    where
        F: FnOnce() -> T,
    {
        let outcome = panic::catch_unwind(AssertUnwindSafe(job))
            .map_err(|payload| TaskError::Panicked(panic_message(payload.as_ref())));
        if let Err(TaskError::Panicked(message)) = &outcome {
            counters.failed_tasks.fetch_add(1, Ordering::Relaxed);
            warn!(
                thread = std::thread::current().name().unwrap_or("<unnamed>"),
                %message,
                "task panicked; worker continues"
            );
        } else {
            counters.completed_tasks.fetch_add(1, Ordering::Relaxed);
        }
        self.resolve(outcome);
    }

    fn resolve(&mut self, outcome: Result<T, TaskError>) {
        let mut state = self.slot.state.lock();
        *state = SlotState::Done(outcome);
        self.fulfilled = true;
        self.slot.ready.notify_all();
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if !self.fulfilled {
            self.resolve(Err(TaskError::Abandoned));
        }
    }
}

/// The caller-visible side of a submission: resolves to the task's return
/// value, its captured panic, or [`TaskError::Abandoned`].
///
/// Dropping the handle without waiting is allowed; the task still runs.
pub struct TaskHandle<T> {
    slot: Arc<Slot<T>>,
}

impl<T> TaskHandle<T> {
    /// Whether the task has already resolved. Non-consuming probe.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        !matches!(*self.slot.state.lock(), SlotState::Pending)
    }

    /// Block until the task resolves and take the outcome.
    ///
    /// # Errors
    ///
    /// [`TaskError::Panicked`] if the task panicked, [`TaskError::Abandoned`]
    /// if the pool discarded it before execution.
    pub fn wait(self) -> Result<T, TaskError> {
        let mut state = self.slot.state.lock();
        loop {
            match std::mem::replace(&mut *state, SlotState::Taken) {
                SlotState::Done(outcome) => return outcome,
                SlotState::Pending => {
                    *state = SlotState::Pending;
                    self.slot.ready.wait(&mut state);
                }
                SlotState::Taken => unreachable!("outcome taken while handle still held"),
            }
        }
    }

    /// Block until the task resolves or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// As [`TaskHandle::wait`], plus [`TaskError::Timeout`] when the deadline
    /// passes with the task still pending.
    pub fn wait_timeout(self, timeout: Duration) -> Result<T, TaskError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.slot.state.lock();
        loop {
            match std::mem::replace(&mut *state, SlotState::Taken) {
                SlotState::Done(outcome) => return outcome,
                SlotState::Pending => {
                    *state = SlotState::Pending;
                    if self.slot.ready.wait_until(&mut state, deadline).timed_out() {
                        return Err(TaskError::Timeout);
                    }
                }
                SlotState::Taken => unreachable!("outcome taken while handle still held"),
            }
        }
    }
}

impl<T> std::fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Best-effort extraction of a human-readable panic message.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn wait_returns_the_value() {
        let (promise, handle) = pair();
        let counters = PoolCounters::default();
        assert!(!handle.is_ready());
        promise.complete_with(|| 42, &counters);
        assert!(handle.is_ready());
        assert_eq!(handle.wait(), Ok(42));
        assert_eq!(counters.completed_tasks.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn panic_is_captured_in_the_handle() {
        let (promise, handle) = pair::<i32>();
        let counters = PoolCounters::default();
        promise.complete_with(|| panic!("boom"), &counters);
        assert_eq!(handle.wait(), Err(TaskError::Panicked("boom".into())));
        assert_eq!(counters.failed_tasks.load(Ordering::Relaxed), 1);
        assert_eq!(counters.completed_tasks.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn dropped_promise_resolves_to_abandoned() {
        let (promise, handle) = pair::<i32>();
        drop(promise);
        assert_eq!(handle.wait(), Err(TaskError::Abandoned));
    }

    #[test]
    fn wait_blocks_until_resolved_across_threads() {
        let (promise, handle) = pair();
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            promise.complete_with(|| "done", &PoolCounters::default());
        });
        assert_eq!(handle.wait(), Ok("done"));
        producer.join().unwrap();
    }

    #[test]
    fn counters_are_visible_once_the_handle_resolves() {
        // A waiter that reads the counters right after wait() returns must
        // already see this task counted.
        let (promise, handle) = pair();
        let counters = Arc::new(PoolCounters::default());
        let producer_counters = Arc::clone(&counters);
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            promise.complete_with(|| 7, &producer_counters);
        });
        assert_eq!(handle.wait(), Ok(7));
        assert_eq!(counters.completed_tasks.load(Ordering::Relaxed), 1);
        producer.join().unwrap();
    }

    #[test]
    fn wait_timeout_expires_on_a_pending_slot() {
        let (promise, handle) = pair::<i32>();
        assert_eq!(
            handle.wait_timeout(Duration::from_millis(10)),
            Err(TaskError::Timeout)
        );
        drop(promise);
    }
}
