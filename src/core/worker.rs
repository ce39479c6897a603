//! Shared pool state and the per-thread worker run loop.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::core::pool::PoolCounters;
use crate::core::queue::WorkerQueue;
use crate::core::task::Task;

/// How long an idle stealing worker parks before rescanning siblings.
///
/// A task can land on a busy sibling's queue after this worker's last scan,
/// and nothing notifies this worker's own condvar when that happens. The
/// timed park bounds how long such backlog waits for a thief.
const STEAL_RESCAN_PARK: Duration = Duration::from_millis(1);

/// State shared between the pool handle and every worker thread.
pub(crate) struct Shared {
    /// One queue per worker, bound by index at construction.
    pub(crate) queues: Vec<Arc<WorkerQueue>>,
    /// Global stop flag. One-way false-to-true transition, never reset.
    pub(crate) done: AtomicBool,
    /// Per-worker "currently executing a task" flags; each is written only by
    /// its owning worker and read by stealers.
    pub(crate) active: Vec<AtomicBool>,
    /// Pool-wide count of queued, not-yet-dequeued tasks. Backs `wait()`.
    pub(crate) pending: AtomicUsize,
    /// Guards the drained condvar below.
    pub(crate) drained_lock: Mutex<()>,
    /// Signalled when `pending` reaches zero (or shutdown is requested).
    pub(crate) drained: Condvar,
    /// Statistics counters, shared with submitted task closures.
    pub(crate) counters: Arc<PoolCounters>,
    /// Whether idle workers scan sibling queues for work.
    pub(crate) stealing: bool,
}

impl Shared {
    pub(crate) fn new(queues: Vec<Arc<WorkerQueue>>, stealing: bool) -> Self {
        let worker_count = queues.len();
        Self {
            queues,
            done: AtomicBool::new(false),
            active: (0..worker_count).map(|_| AtomicBool::new(false)).collect(),
            pending: AtomicUsize::new(0),
            drained_lock: Mutex::new(()),
            drained: Condvar::new(),
            counters: Arc::new(PoolCounters::default()),
            stealing,
        }
    }

    /// Record that one queued task left a queue for execution, waking any
    /// `wait()`er once the last one is gone.
    pub(crate) fn note_dequeued(&self) {
        self.counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = self.drained_lock.lock();
            self.drained.notify_all();
        }
    }

    /// Record one new queued task before it is dispatched.
    pub(crate) fn note_enqueued(&self) {
        self.counters.submitted_tasks.fetch_add(1, Ordering::Relaxed);
        self.counters.queued_tasks.fetch_add(1, Ordering::Relaxed);
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    /// Number of workers currently executing a task.
    pub(crate) fn active_count(&self) -> usize {
        self.active.iter().filter(|flag| flag.load(Ordering::Relaxed)).count()
    }
}

/// Outcome of one pass through the worker's dequeue loop.
enum Step {
    /// A task was dequeued from the own queue.
    Run(Task),
    /// The timed park expired with the own queue still empty; drop the lock
    /// and scan siblings for stealable backlog.
    Rescan,
    /// The stop flag was observed.
    Stop,
}

/// The worker state machine, one instance per thread.
///
/// WAITING: blocked on the own queue's condvar. RUNNING: executing a dequeued
/// task with `active[index]` raised. STOPPED: the stop flag was observed;
/// terminal, the thread exits its loop.
///
/// The stop flag is checked before dequeuing, so a shutdown with backlog
/// discards queued tasks rather than draining them; the pool's teardown drain
/// resolves their handles. The queue lock is held only across the dequeue
/// step, never across `invoke()`, so producers can keep enqueuing into this
/// queue while a task runs.
///
/// With stealing enabled the idle wait is a timed park: a task dispatched
/// onto a busy sibling's queue notifies that sibling's condvar, not this
/// one, so an already-parked worker would otherwise never see it. Each park
/// expiry releases the own lock and runs one sibling scan.
pub(crate) fn run(shared: &Arc<Shared>, index: usize) {
    let queue = Arc::clone(&shared.queues[index]);
    debug!(worker = index, "worker thread started");

    loop {
        let step = {
            let mut tasks = queue.lock();
            loop {
                if shared.done.load(Ordering::Acquire) {
                    break Step::Stop;
                }
                if let Some(task) = queue.pop_front_locked(&mut tasks) {
                    break Step::Run(task);
                }
                if shared.stealing {
                    if !queue.wait_for_work_for(&mut tasks, STEAL_RESCAN_PARK) {
                        break Step::Rescan;
                    }
                } else {
                    // Spurious wakeups land back here and re-wait.
                    queue.wait_for_work(&mut tasks);
                }
            }
        };

        match step {
            Step::Stop => break,
            Step::Rescan => {
                steal_into(shared, index);
            }
            Step::Run(mut task) => {
                shared.note_dequeued();

                shared.active[index].store(true, Ordering::Release);
                task.invoke();
                shared.active[index].store(false, Ordering::Release);

                if shared.stealing && queue.is_empty() {
                    steal_into(shared, index);
                }
            }
        }
    }

    debug!(worker = index, "worker thread stopped");
}

/// One steal pass for an idle worker: scan siblings in index order starting
/// just after our own, looking for one that is actively executing and still
/// has backlog. Take one task from the *back* of the victim's queue (away
/// from its front-popping owner) and land it at the *front* of our own.
/// Victims whose lock is contended are skipped, never waited on.
pub(crate) fn steal_into(shared: &Shared, index: usize) -> bool {
    let worker_count = shared.queues.len();
    for offset in 1..worker_count {
        let victim_index = (index + offset) % worker_count;
        if !shared.active[victim_index].load(Ordering::Acquire) {
            continue;
        }
        let victim = &shared.queues[victim_index];
        if victim.is_empty() {
            continue;
        }
        let Some(mut victim_tasks) = victim.try_lock() else {
            continue;
        };
        let Some(task) = victim.pop_back_locked(&mut victim_tasks) else {
            continue;
        };
        drop(victim_tasks);

        shared.queues[index].push_front(task);
        shared.counters.stolen_tasks.fetch_add(1, Ordering::Relaxed);
        trace!(thief = index, victim = victim_index, "stole one task");
        return true;
    }
    false
}
