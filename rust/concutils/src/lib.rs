//! Composable, thread-based concurrency primitives.
//!
//! This crate packages a handful of synchronization patterns that application code
//! otherwise keeps re-implementing by hand with mutexes, condition variables and ad hoc
//! thread bookkeeping.
//!
//! # Key Components
//!
//! ## Completion Combinators
//!
//! - [`and::AndCombiner`] - Waits for *all* of several completion signals
//! - [`or::OrCombiner`] - Waits for the *first* of several completion signals
//!
//! ## Stream Multiplexers
//!
//! - [`fan_in::FanInMerger`] - Merges several streams into one, preserving per-source
//!   order
//! - [`fan_out::FanOutDistributor`] - Splits one stream into several by strict
//!   round-robin
//!
//! ## Worker Pool
//!
//! - [`worker_pool::WorkerPool`] - A fixed number of workers pulling [`task::Task`]s from
//!   a bounded queue, with per-task failure isolation
//!
//! ## Building Blocks
//!
//! - [`signal`] - One-shot, broadcastable completion signals and `select`
//! - [`stream`] - Blocking MPMC streams (rendezvous, bounded and unbounded)
//!
//! The primitives are independent of each other and are combined only by caller code.
//! Every primitive runs until its natural termination condition: none of them can be
//! resized, restarted or cancelled from the outside.

pub mod and;
pub mod error;
pub mod fan_in;
pub mod fan_out;
pub mod or;
pub mod signal;
pub mod stream;
pub mod task;
pub mod worker_pool;

pub use and::AndCombiner;
pub use error::{Error, ErrorKind, Result};
pub use fan_in::FanInMerger;
pub use fan_out::FanOutDistributor;
pub use or::OrCombiner;
pub use signal::{CompletionSignal, SignalCloser};
pub use task::{Task, TaskHandle};
pub use worker_pool::{PoolState, WorkerPool};
