//! Type-erased, one-shot unit of work.

/// A move-only wrapper around one zero-argument closure.
///
/// The closure runs at most once, via [`Task::invoke`]. A `Task` carries no
/// return value at this layer; results travel through the promise/handle pair
/// the closure itself closes over (see [`crate::core::handle`]).
///
/// Invoking an empty task (default-constructed, or already invoked) is a
/// no-op rather than an error, so the teardown drain path can process any
/// task it finds without special cases.
pub(crate) struct Task {
    job: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl Task {
    /// Wrap a closure into a task.
    pub(crate) fn new<F>(job: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self { job: Some(Box::new(job)) }
    }

    /// Run the wrapped closure, consuming it. No-op when empty.
    pub(crate) fn invoke(&mut self) {
        if let Some(job) = self.job.take() {
            job();
        }
    }
}

impl Default for Task {
    fn default() -> Self {
        Self { job: None }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("empty", &self.job.is_none())
            .finish()
    }
}
