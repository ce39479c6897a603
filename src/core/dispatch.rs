//! Load-balancing placement policy for incoming tasks.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

use tracing::trace;

use crate::core::queue::WorkerQueue;
use crate::core::task::Task;

/// Chooses which worker queue receives each new task.
///
/// Policy: rebuild an advisory ordering over `(backlog, index)` snapshots on
/// every submission and append to the least-loaded queue. The heap is a hint
/// built from relaxed depth reads, never a source of truth; for the small,
/// fixed queue counts a pool runs with, the O(N log N) rebuild per submission
/// is acceptable. The enqueue itself (and the wakeup of the owning worker)
/// happens under the chosen queue's lock inside
/// [`WorkerQueue::push_back`].
pub(crate) struct Dispatcher {
    queues: Vec<Arc<WorkerQueue>>,
}

impl Dispatcher {
    pub(crate) fn new(queues: Vec<Arc<WorkerQueue>>) -> Self {
        debug_assert!(!queues.is_empty());
        Self { queues }
    }

    /// Enqueue `task` on the least-loaded queue and return its index.
    pub(crate) fn dispatch(&self, task: Task) -> usize {
        let target = self.least_loaded();
        self.queues[target].push_back(task);
        trace!(queue = target, depth = self.queues[target].len(), "task dispatched");
        target
    }

    /// Index of the queue with the smallest backlog snapshot. Ties break
    /// toward the lowest index, which keeps single-task bursts spreading
    /// across distinct queues instead of piling onto one.
    fn least_loaded(&self) -> usize {
        let mut view: BinaryHeap<Reverse<(usize, usize)>> = self
            .queues
            .iter()
            .enumerate()
            .map(|(index, queue)| Reverse((queue.len(), index)))
            .collect();

        // The heap always holds at least one entry; see the constructor.
        view.pop().map_or(0, |Reverse((_, index))| index)
    }
}
