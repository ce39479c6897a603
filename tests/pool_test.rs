//! Integration tests for the worker pool.
//!
//! These cover the pool's observable contract end to end:
//! - Exactly-once execution under concurrent submission
//! - Result handles resolving after execution, not before
//! - Submission rejection after shutdown
//! - Per-queue FIFO ordering
//! - Panic isolation between tasks
//! - Progress past a blocked worker (stealing or independent queues)
//! - Abandonment of tasks discarded by shutdown

use conveyor::util::telemetry;
use conveyor::{PoolConfig, PoolError, TaskError, WorkerPool};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier, Mutex};
use std::thread;
use std::time::{Duration, Instant};

// ============================================================================
// EXACTLY-ONCE EXECUTION
// ============================================================================

/// 100 increment tasks submitted concurrently from 8 caller threads onto 4
/// workers: after wait() and draining every handle, the counter is exactly
/// 100, with no lost tasks and no double execution.
#[test]
fn concurrent_submitters_count_to_exactly_100() {
    telemetry::init_tracing();

    let pool = Arc::new(WorkerPool::with_workers(4).expect("failed to create pool"));
    let counter = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(8));

    let submitters: Vec<_> = (0..8)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let counter = Arc::clone(&counter);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                let mut handles = Vec::with_capacity(100 / 8 + 1);
                for _ in 0..(100 / 8) {
                    let c = Arc::clone(&counter);
                    handles.push(pool.submit(move || {
                        c.fetch_add(1, Ordering::SeqCst);
                    }));
                }
                handles
            })
        })
        .collect();

    let mut handles = Vec::new();
    for submitter in submitters {
        handles.extend(submitter.join().unwrap());
    }
    // 8 threads x 12 tasks = 96; top up to 100 from this thread.
    for _ in handles.len()..100 {
        let c = Arc::clone(&counter);
        handles.push(pool.submit(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
    }
    assert_eq!(handles.len(), 100);

    pool.wait();
    for handle in handles {
        handle.unwrap().wait().unwrap();
    }

    assert_eq!(counter.load(Ordering::SeqCst), 100);
    let stats = pool.stats();
    assert_eq!(stats.submitted_tasks, 100);
    assert_eq!(stats.completed_tasks, 100);
    assert_eq!(stats.failed_tasks, 0);
}

// ============================================================================
// RESULT HANDLES
// ============================================================================

/// A task that sleeps 50ms then returns 42: the handle yields 42 after
/// waiting, and is not ready before the task has had time to run.
#[test]
fn handle_resolves_after_execution_not_before() {
    let pool = WorkerPool::with_workers(2).unwrap();

    let started = Instant::now();
    let handle = pool
        .submit(|| {
            thread::sleep(Duration::from_millis(50));
            42
        })
        .unwrap();

    assert!(!handle.is_ready(), "handle resolved before the task could run");
    assert_eq!(handle.wait(), Ok(42));
    assert!(started.elapsed() >= Duration::from_millis(50));
}

#[test]
fn wait_timeout_expires_while_a_task_still_runs() {
    let pool = WorkerPool::with_workers(1).unwrap();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let handle = pool
        .submit(move || {
            release_rx.recv().ok();
            "late"
        })
        .unwrap();

    assert_eq!(
        handle.wait_timeout(Duration::from_millis(20)),
        Err(TaskError::Timeout)
    );
    release_tx.send(()).unwrap();
}

// ============================================================================
// SHUTDOWN
// ============================================================================

/// Submission after shutdown fails synchronously with the shutdown error and
/// never enqueues.
#[test]
fn submit_after_shutdown_is_rejected() {
    let pool = WorkerPool::with_workers(2).unwrap();
    pool.shutdown();

    let attempt = pool.submit(|| ());
    assert!(matches!(attempt, Err(PoolError::Shutdown)));
    assert_eq!(pool.stats().submitted_tasks, 0);
}

/// Tasks still queued when shutdown fires are discarded, and their handles
/// resolve to an explicit abandonment error rather than hanging forever.
#[test]
fn queued_tasks_are_abandoned_at_forced_teardown() {
    let config = PoolConfig::new().with_worker_count(1).with_stealing(false);
    let pool = WorkerPool::new(config).unwrap();

    let (release_tx, release_rx) = mpsc::channel::<()>();
    let blocker = pool
        .submit(move || {
            release_rx.recv().ok();
        })
        .unwrap();

    // Let the single worker dequeue the blocker before piling up a backlog.
    while pool.stats().queued_tasks > 0 {
        thread::sleep(Duration::from_millis(1));
    }

    let queued_a = pool.submit(|| 1).unwrap();
    let queued_b = pool.submit(|| 2).unwrap();

    pool.shutdown();
    release_tx.send(()).unwrap();

    assert_eq!(blocker.wait(), Ok(()));
    drop(pool); // joins the worker and drains the discarded backlog

    assert_eq!(queued_a.wait(), Err(TaskError::Abandoned));
    assert_eq!(queued_b.wait(), Err(TaskError::Abandoned));
}

// ============================================================================
// ORDERING
// ============================================================================

/// With a single worker (hence a single queue), tasks execute in submission
/// order.
#[test]
fn single_queue_executes_fifo() {
    let config = PoolConfig::new().with_worker_count(1).with_stealing(false);
    let pool = WorkerPool::new(config).unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    let handles: Vec<_> = (0..10)
        .map(|id| {
            let order = Arc::clone(&order);
            pool.submit(move || order.lock().unwrap().push(id)).unwrap()
        })
        .collect();

    for handle in handles {
        handle.wait().unwrap();
    }
    assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<_>>());
}

// ============================================================================
// PANIC ISOLATION
// ============================================================================

/// A panicking task resolves its own handle to an error and does not prevent
/// subsequently queued tasks from executing, on any queue.
#[test]
fn panicking_task_does_not_poison_the_pool() {
    let pool = WorkerPool::with_workers(2).unwrap();

    let bad = pool.submit(|| panic!("task exploded")).unwrap();
    let good: Vec<_> = (0..8).map(|n| pool.submit(move || n + 1).unwrap()).collect();

    assert_eq!(bad.wait(), Err(TaskError::Panicked("task exploded".into())));
    for (n, handle) in good.into_iter().enumerate() {
        assert_eq!(handle.wait(), Ok(n + 1));
    }

    let stats = pool.stats();
    assert_eq!(stats.failed_tasks, 1);
    assert_eq!(stats.completed_tasks, 8);
}

// ============================================================================
// PROGRESS PAST A BLOCKED WORKER
// ============================================================================

/// 2 workers, 3 tasks, the first of which blocks until signaled: tasks 2 and
/// 3 still execute (via the sibling worker or a steal) without waiting for
/// task 1.
#[test]
fn blocked_worker_does_not_stall_other_tasks() {
    let pool = WorkerPool::with_workers(2).unwrap();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let blocked = pool
        .submit(move || {
            release_rx.recv().ok();
            1
        })
        .unwrap();

    let second = pool.submit(|| 2).unwrap();
    let third = pool.submit(|| 3).unwrap();

    // Both must complete while task 1 is still blocked.
    assert_eq!(second.wait_timeout(Duration::from_secs(2)), Ok(2));
    assert_eq!(third.wait_timeout(Duration::from_secs(2)), Ok(3));
    assert!(!blocked.is_ready());

    release_tx.send(()).unwrap();
    assert_eq!(blocked.wait(), Ok(1));
}

/// A task that lands on the blocked worker's queue only after the idle
/// sibling has already parked still executes: the parked worker rescans
/// sibling queues and steals it.
#[test]
fn parked_sibling_steals_late_backlog_behind_a_blocked_worker() {
    let pool = WorkerPool::with_workers(2).unwrap();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let blocked = pool
        .submit(move || {
            release_rx.recv().ok();
        })
        .unwrap();

    // Give worker 1 time to go idle before any backlog exists.
    thread::sleep(Duration::from_millis(50));

    // Both queues are empty, so the tie-break sends this onto queue 0, the
    // blocked worker's queue. Nothing notifies worker 1 about it.
    let late = pool.submit(|| 7).unwrap();
    assert_eq!(late.wait_timeout(Duration::from_secs(2)), Ok(7));

    release_tx.send(()).unwrap();
    assert_eq!(blocked.wait(), Ok(()));
}

// ============================================================================
// WAIT / DRAIN
// ============================================================================

/// wait() returns only once every queue is observably empty; in-flight
/// executions may still be running, so full completion needs the handles.
#[test]
fn wait_drains_all_queues() {
    let pool = WorkerPool::with_workers(4).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..64)
        .map(|_| {
            let c = Arc::clone(&counter);
            pool.submit(move || {
                thread::sleep(Duration::from_micros(200));
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap()
        })
        .collect();

    pool.wait();
    assert_eq!(pool.stats().queued_tasks, 0);

    for handle in handles {
        handle.wait().unwrap();
    }
    assert_eq!(counter.load(Ordering::SeqCst), 64);
}

/// Dropping the pool performs the graceful teardown: queued work runs to
/// completion first.
#[test]
fn drop_waits_for_queued_work() {
    let counter = Arc::new(AtomicUsize::new(0));
    {
        let pool = WorkerPool::with_workers(2).unwrap();
        for _ in 0..32 {
            let c = Arc::clone(&counter);
            drop(pool.submit(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }));
        }
    }
    // Pool dropped: every queued task was dequeued before shutdown. The
    // final increments may race the drop only if execution were cut short,
    // which the teardown sequence forbids for dequeued tasks.
    assert_eq!(counter.load(Ordering::SeqCst), 32);
}

// ============================================================================
// TIMING SCOPE
// ============================================================================

/// With a timing scope configured, every executed task appends one elapsed
/// time line to the scope's log file.
#[test]
fn timing_scope_logs_one_line_per_task() {
    let dir = std::env::temp_dir().join(format!("conveyor-pool-timing-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);

    let config = PoolConfig::new()
        .with_worker_count(2)
        .with_timing_scope("pool-task")
        .with_timing_log_dir(&dir);
    let pool = WorkerPool::new(config).unwrap();

    let handles: Vec<_> = (0..5_usize).map(|n| pool.submit(move || n).unwrap()).collect();
    for (n, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.wait(), Ok(n));
    }
    drop(pool); // joins the workers, so every timer line has been flushed

    let contents = fs::read_to_string(dir.join("pool-task.log")).unwrap();
    assert_eq!(contents.lines().count(), 5);
    for line in contents.lines() {
        assert!(line.starts_with("pool-task Elapsed time: "));
        assert!(line.ends_with(" microseconds"));
    }
    let _ = fs::remove_dir_all(&dir);
}
