//! Units of work executed by a [`WorkerPool`](crate::worker_pool::WorkerPool), and
//! handles for their outcome.

use std::sync::{Arc, Mutex};

use crate::{
    error::{Error, Result},
    signal::{self, CompletionSignal, SignalCloser},
};

/// A unit of work that can be executed by a worker pool.
///
/// A task is executed at most once, for its side effects only. Any
/// `FnOnce() + Send + 'static` closure is a task.
pub trait Task: Send + 'static {
    /// Performs the work of the task.
    fn execute(self: Box<Self>);
}

impl<F> Task for F
where
    F: FnOnce() + Send + 'static,
{
    fn execute(self: Box<Self>) {
        (*self)()
    }
}

/// A handle for waiting on the outcome of a closure spawned on a worker pool.
///
/// The outcome is the closure's return value, or an error if the closure panicked
/// ([`ErrorKind::TaskPanicked`](crate::error::ErrorKind::TaskPanicked)) or was dropped
/// without ever running
/// ([`ErrorKind::TaskAbandoned`](crate::error::ErrorKind::TaskAbandoned)).
pub struct TaskHandle<R> {
    done: CompletionSignal,
    slot: Arc<Mutex<Option<Result<R>>>>,
}

impl<R> TaskHandle<R> {
    /// Creates a connected pair: the completer goes with the work, the handle stays
    /// with the caller.
    pub(crate) fn new() -> (TaskCompleter<R>, TaskHandle<R>) {
        let (closer, done) = signal::pair();
        let slot = Arc::new(Mutex::new(None));
        (
            TaskCompleter {
                closer,
                slot: slot.clone(),
            },
            TaskHandle { done, slot },
        )
    }

    /// Checks whether the outcome is available, without blocking.
    pub fn is_ready(&self) -> bool {
        self.done.is_closed()
    }

    /// Returns a signal that closes when the outcome becomes available.
    pub fn done(&self) -> CompletionSignal {
        self.done.clone()
    }

    /// Waits for the task to finish and returns its outcome.
    pub fn join(self) -> Result<R> {
        self.done.wait();
        self.slot
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(Error::task_abandoned()))
    }

    /// Waits for all handles and collects their outcomes, in the order given.
    pub fn join_all(handles: impl IntoIterator<Item = TaskHandle<R>>) -> Vec<Result<R>> {
        handles.into_iter().map(|h| h.join()).collect()
    }
}

/// The producing side of a [`TaskHandle`].
///
/// Dropping it without calling [`complete`](Self::complete) marks the task abandoned.
pub(crate) struct TaskCompleter<R> {
    closer: SignalCloser,
    slot: Arc<Mutex<Option<Result<R>>>>,
}

impl<R> TaskCompleter<R> {
    pub(crate) fn complete(self, outcome: Result<R>) {
        *self.slot.lock().unwrap() = Some(outcome);
        self.closer.close();
    }
}
