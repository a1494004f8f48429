//! Bounded worker pool for executing tasks on a fixed set of threads.
//!
//! A [`WorkerPool`] owns a FIFO task queue whose capacity equals the number of workers,
//! and that many persistent worker threads pulling from it. Submitting into a full
//! queue blocks the submitter (backpressure rather than rejection).
//!
//! ## Lifecycle
//!
//! 1. **Running**: workers are started by the constructor and accept submissions
//! 2. **Stopping**: [`WorkerPool::stop`] has closed the queue; workers drain what is left
//! 3. **Stopped**: every worker has exited and been joined
//!
//! A pool is not restartable. Submitting after `stop` and calling `stop` twice are
//! reported as errors.
//!
//! ## Failure Isolation
//!
//! Each task runs inside an unwind-catching scope. A panicking task is counted in
//! [`WorkerPool::failed_tasks`] (and reported through its [`TaskHandle`] when spawned
//! with [`WorkerPool::spawn`]); the worker that ran it carries on with the next task,
//! so pool capacity is preserved.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU8, AtomicUsize, Ordering},
    },
    thread,
};

use crate::{
    error::{Error, Result},
    stream::{self, Receiver, Sender},
    task::{Task, TaskHandle},
    verify_arg,
};

/// Observable lifecycle state of a [`WorkerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PoolState {
    Running = 0,
    Stopping = 1,
    Stopped = 2,
}

impl PoolState {
    fn from_u8(value: u8) -> PoolState {
        match value {
            0 => PoolState::Running,
            1 => PoolState::Stopping,
            _ => PoolState::Stopped,
        }
    }
}

type BoxedTask = Box<dyn Task>;

/// A fixed-size pool of worker threads executing [`Task`]s.
///
/// ## Thread Safety
///
/// All methods take `&self` and may be called concurrently; share the pool between
/// threads with an `Arc`.
pub struct WorkerPool {
    /// Sending side of the task queue; `None` once the pool is stopping.
    queue: Mutex<Option<Sender<BoxedTask>>>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    counters: Arc<Counters>,
    state: AtomicU8,
    num_workers: usize,
}

impl WorkerPool {
    /// Creates a pool with `num_workers` worker threads and starts them.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::error::ErrorKind::InvalidArgument)
    /// if `num_workers` is zero.
    pub fn new(num_workers: usize) -> Result<WorkerPool> {
        Self::with_thread_name(num_workers, |_| String::new())
    }

    /// Creates a pool like [`new`](Self::new), naming each worker thread.
    ///
    /// `thread_name` is called with the 0-based worker index; an empty name leaves that
    /// thread unnamed. Names show up in debuggers, profilers and panic messages.
    pub fn with_thread_name(
        num_workers: usize,
        thread_name: impl Fn(usize) -> String,
    ) -> Result<WorkerPool> {
        verify_arg!(num_workers, num_workers > 0);

        let (tx, rx) = stream::bounded::<BoxedTask>(num_workers);
        let counters = Arc::new(Counters::default());

        let mut workers = Vec::with_capacity(num_workers);
        for index in 0..num_workers {
            let rx = rx.clone();
            let counters = counters.clone();
            let mut builder = thread::Builder::new();
            let name = thread_name(index);
            if !name.is_empty() {
                builder = builder.name(name);
            }
            let handle = builder
                .spawn(move || Self::worker_fn(index, rx, counters))
                .map_err(|e| Error::io(format!("spawn worker {index}"), e))?;
            workers.push(handle);
        }
        log::debug!("worker pool started with {num_workers} workers");

        Ok(WorkerPool {
            queue: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            counters,
            state: AtomicU8::new(PoolState::Running as u8),
            num_workers,
        })
    }

    /// Adds a task to the queue, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::PoolClosed`](crate::error::ErrorKind::PoolClosed) once
    /// [`stop`](Self::stop) has been called.
    pub fn submit(&self, task: impl Task) -> Result<()> {
        self.submit_boxed(Box::new(task))
    }

    /// Like [`submit`](Self::submit), for an already boxed task.
    pub fn submit_boxed(&self, task: BoxedTask) -> Result<()> {
        // Clone the sender so a blocking send does not hold the lock and `stop` can
        // close the queue concurrently; values sent through the clone still reach the
        // workers before they drain out.
        let tx = self
            .queue
            .lock()
            .unwrap()
            .as_ref()
            .cloned()
            .ok_or_else(Error::pool_closed)?;
        tx.send(task).map_err(|_| Error::pool_closed())
    }

    /// Submits a closure and returns a handle to its outcome.
    ///
    /// If the closure panics, the handle reports
    /// [`ErrorKind::TaskPanicked`](crate::error::ErrorKind::TaskPanicked).
    pub fn spawn<F, R>(&self, f: F) -> Result<TaskHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (completer, handle) = TaskHandle::new();
        self.submit(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(f)).map_err(Error::from_panic);
            let failed = outcome.is_err();
            completer.complete(outcome);
            if failed {
                // Let the worker account for it as a failed task.
                panic::resume_unwind(Box::new("spawned task panicked"));
            }
        })?;
        Ok(handle)
    }

    /// Closes the queue and waits for the workers to finish every queued task.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::AlreadyStopped`](crate::error::ErrorKind::AlreadyStopped)
    /// if the pool was already stopped (or is being stopped by another thread).
    pub fn stop(&self) -> Result<()> {
        let tx = self
            .queue
            .lock()
            .unwrap()
            .take()
            .ok_or_else(Error::already_stopped)?;
        self.set_state(PoolState::Stopping);
        tx.close();

        let workers = std::mem::take(&mut *self.workers.lock().unwrap());
        for (index, worker) in workers.into_iter().enumerate() {
            if worker.join().is_err() {
                log::error!("worker {index} terminated abnormally");
            }
        }

        self.set_state(PoolState::Stopped);
        log::debug!(
            "worker pool stopped: {} tasks completed, {} failed",
            self.completed_tasks(),
            self.failed_tasks()
        );
        Ok(())
    }

    /// Returns the number of tasks currently being executed.
    ///
    /// This is a snapshot for observability; it may be outdated by the time it is
    /// returned and must not be used for synchronization.
    pub fn active_tasks(&self) -> usize {
        self.counters.active.load(Ordering::SeqCst)
    }

    /// Returns `true` if no task is currently being executed. Same caveats as
    /// [`active_tasks`](Self::active_tasks).
    pub fn is_idle(&self) -> bool {
        self.active_tasks() == 0
    }

    /// Total number of tasks that ran to completion.
    pub fn completed_tasks(&self) -> usize {
        self.counters.completed.load(Ordering::SeqCst)
    }

    /// Total number of tasks that panicked.
    pub fn failed_tasks(&self) -> usize {
        self.counters.failed.load(Ordering::SeqCst)
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    pub fn state(&self) -> PoolState {
        PoolState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: PoolState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

impl WorkerPool {
    /// Worker thread function: runs tasks until the queue is closed and drained.
    fn worker_fn(index: usize, rx: Receiver<BoxedTask>, counters: Arc<Counters>) {
        log::trace!("worker {index} started");
        while let Ok(task) = rx.recv() {
            counters.active.fetch_add(1, Ordering::SeqCst);
            let res = panic::catch_unwind(AssertUnwindSafe(|| task.execute()));
            counters.active.fetch_sub(1, Ordering::SeqCst);
            match res {
                Ok(()) => {
                    counters.completed.fetch_add(1, Ordering::SeqCst);
                }
                Err(_) => {
                    counters.failed.fetch_add(1, Ordering::SeqCst);
                    log::warn!("worker {index}: task panicked");
                }
            }
        }
        log::trace!("worker {index} exiting");
    }
}

impl Drop for WorkerPool {
    /// Closes the queue if the pool was not stopped. Workers finish the queued tasks
    /// and exit on their own; they are not joined.
    fn drop(&mut self) {
        if let Ok(mut queue) = self.queue.lock() {
            if queue.take().is_some() {
                self.set_state(PoolState::Stopping);
            }
        }
    }
}

#[derive(Default)]
struct Counters {
    active: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}
