//! One-shot, value-less, broadcastable completion signals.
//!
//! A [`CompletionSignal`] marks that some operation has finished. It carries no value:
//! the only observable fact is whether it has been closed. The transition from open to
//! closed happens at most once and is permanent, and any number of cloned observers can
//! detect it, each observation being idempotent.
//!
//! The writer side is a [`SignalCloser`]. Closing is explicit via
//! [`SignalCloser::close`], and also happens automatically when the closer is dropped,
//! so a producer thread that exits (normally or by unwinding) always releases whoever
//! is waiting on it.
//!
//! ## Signal Lifecycle
//!
//! 1. Open: created by [`pair`], observers block in [`CompletionSignal::wait`]
//! 2. Closed: the closer was closed or dropped, all observers are woken and every
//!    subsequent wait returns immediately
//!
//! A signal created by [`CompletionSignal::never`] has no closer and stays open forever.
//!
//! ## Waiting on Several Signals
//!
//! [`select`] blocks until at least one of several signals is closed and reports which
//! one, the blocking counterpart of a race between completion events.
//!
//! ## Thread Safety
//!
//! The closed state is an atomic flag, so [`CompletionSignal::is_closed`] never takes a
//! lock. Blocking waits use a `Mutex`/`Condvar` pair; the flag is only ever set while
//! the mutex is held, so a waiter cannot miss the wakeup.

use std::{
    sync::{
        Arc, Condvar, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

/// Creates a new open signal, returning the closer and an observer.
pub fn pair() -> (SignalCloser, CompletionSignal) {
    let cell = Arc::new(SignalCell::new());
    (SignalCloser(cell.clone()), CompletionSignal(cell))
}

/// Returns a signal that closes once `delay` has elapsed.
///
/// The delay is measured by a dedicated sleeping thread.
pub fn after(delay: Duration) -> CompletionSignal {
    spawn(move || thread::sleep(delay))
}

/// Runs `f` on a new thread and returns a signal that closes when it returns.
///
/// The signal is also closed if `f` panics.
pub fn spawn<F>(f: F) -> CompletionSignal
where
    F: FnOnce() + Send + 'static,
{
    let (closer, signal) = pair();
    thread::spawn(move || {
        let _closer = closer;
        f();
    });
    signal
}

/// Blocks until at least one of `signals` is closed and returns the index of the
/// first closed one (lowest index among those closed at the time of the check).
///
/// # Panics
///
/// Panics if `signals` is empty: there would be nothing to wait for.
pub fn select(signals: &[&CompletionSignal]) -> usize {
    assert!(!signals.is_empty(), "select requires at least one signal");

    if let Some(index) = first_closed(signals) {
        return index;
    }

    let wakeup = Arc::new(Wakeup::new());
    for signal in signals {
        if !signal.0.subscribe(&wakeup) {
            // Closed while we were registering.
            wakeup.notify();
            break;
        }
    }

    loop {
        wakeup.wait();
        if let Some(index) = first_closed(signals) {
            signals.iter().for_each(|s| s.0.unsubscribe(&wakeup));
            return index;
        }
    }
}

fn first_closed(signals: &[&CompletionSignal]) -> Option<usize> {
    signals.iter().position(|s| s.is_closed())
}

/// The observing side of a completion signal.
///
/// Cloning is cheap and all clones observe the same underlying signal.
#[derive(Clone)]
pub struct CompletionSignal(Arc<SignalCell>);

impl CompletionSignal {
    /// Returns a signal that never closes.
    ///
    /// Waiting on it blocks forever; [`wait_timeout`](Self::wait_timeout) always
    /// times out.
    pub fn never() -> CompletionSignal {
        CompletionSignal(Arc::new(SignalCell::new()))
    }

    /// Returns a signal that is already closed.
    pub fn closed() -> CompletionSignal {
        let cell = SignalCell::new();
        cell.close();
        CompletionSignal(Arc::new(cell))
    }

    /// Checks whether the signal has been closed, without blocking.
    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }

    /// Blocks until the signal is closed. Returns immediately if it already is.
    pub fn wait(&self) {
        self.0.wait()
    }

    /// Blocks until the signal is closed or `timeout` elapses.
    ///
    /// Returns `true` if the signal is closed, `false` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.0.wait_for(timeout)
    }

    /// Checks whether two handles observe the same signal.
    pub fn same_as(&self, other: &CompletionSignal) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for CompletionSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionSignal")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// The closing side of a completion signal.
///
/// There is exactly one closer per signal. Dropping it closes the signal.
pub struct SignalCloser(Arc<SignalCell>);

impl SignalCloser {
    /// Closes the signal and wakes all observers.
    ///
    /// Returns `true` if this call performed the transition, `false` if the signal
    /// was already closed.
    pub fn close(&self) -> bool {
        self.0.close()
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }

    /// Returns a new observer of this closer's signal.
    pub fn signal(&self) -> CompletionSignal {
        CompletionSignal(self.0.clone())
    }
}

impl Drop for SignalCloser {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Shared state behind a signal.
struct SignalCell {
    closed: AtomicBool,
    /// Wakeups registered by [`select`] callers. Emptied on close.
    listeners: Mutex<Vec<Arc<Wakeup>>>,
    condvar: Condvar,
}

impl SignalCell {
    fn new() -> SignalCell {
        SignalCell {
            closed: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
            condvar: Condvar::new(),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) -> bool {
        let listeners = {
            let mut guard = self.listeners.lock().unwrap();
            if self.closed.load(Ordering::Acquire) {
                return false;
            }
            self.closed.store(true, Ordering::Release);
            std::mem::take(&mut *guard)
        };
        self.condvar.notify_all();
        listeners.iter().for_each(|l| l.notify());
        true
    }

    fn wait(&self) {
        if self.is_closed() {
            return;
        }
        let guard = self.listeners.lock().unwrap();
        let _guard = self
            .condvar
            .wait_while(guard, |_| !self.closed.load(Ordering::Acquire))
            .unwrap();
    }

    fn wait_for(&self, timeout: Duration) -> bool {
        if self.is_closed() {
            return true;
        }
        let guard = self.listeners.lock().unwrap();
        let (_guard, res) = self
            .condvar
            .wait_timeout_while(guard, timeout, |_| !self.closed.load(Ordering::Acquire))
            .unwrap();
        !res.timed_out()
    }

    /// Registers `wakeup` to be notified on close.
    ///
    /// Returns `false` (without registering) if the signal is already closed.
    fn subscribe(&self, wakeup: &Arc<Wakeup>) -> bool {
        let mut guard = self.listeners.lock().unwrap();
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        guard.push(wakeup.clone());
        true
    }

    fn unsubscribe(&self, wakeup: &Arc<Wakeup>) {
        self.listeners
            .lock()
            .unwrap()
            .retain(|l| !Arc::ptr_eq(l, wakeup));
    }
}

/// A single-use wakeup flag shared by the signals of one [`select`] call.
struct Wakeup {
    fired: Mutex<bool>,
    condvar: Condvar,
}

impl Wakeup {
    fn new() -> Wakeup {
        Wakeup {
            fired: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    fn notify(&self) {
        *self.fired.lock().unwrap() = true;
        self.condvar.notify_all();
    }

    fn wait(&self) {
        let guard = self.fired.lock().unwrap();
        let _guard = self.condvar.wait_while(guard, |fired| !*fired).unwrap();
    }
}
