//! Completion combinator that waits for the *first* of its inputs.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use crate::signal::{self, CompletionSignal, SignalCloser};

/// Waits for any of its input signals to close.
///
/// The combined output signal closes as soon as the earliest input closes; later
/// closures are no-ops. This is the building block for "proceed once the first of
/// several concurrent operations is done".
///
/// ## Edge Cases
///
/// - No inputs: the output never closes.
/// - One input: the output *is* that input; no thread is spawned.
///
/// ## Observers
///
/// Each input gets an observer thread racing "my input closed" against "the output
/// closed". The winner passes a single-use atomic gate and closes the output; every
/// other observer notices the closed output and exits. Observers of inputs that never
/// close therefore do not outlive the output.
pub struct OrCombiner {
    out: CompletionSignal,
}

impl OrCombiner {
    /// Creates the combiner and starts observing `signals`.
    pub fn new(signals: impl IntoIterator<Item = CompletionSignal>) -> OrCombiner {
        let mut signals = signals.into_iter().collect::<Vec<_>>();
        match signals.len() {
            0 => {
                return OrCombiner {
                    out: CompletionSignal::never(),
                };
            }
            1 => {
                return OrCombiner {
                    out: signals.swap_remove(0),
                };
            }
            _ => (),
        }

        let (closer, out) = signal::pair();
        let gate = Arc::new(CloseGate::new(closer));

        for (index, input) in signals.into_iter().enumerate() {
            let gate = gate.clone();
            let out = out.clone();
            thread::spawn(move || {
                if signal::select(&[&input, &out]) == 0 && gate.try_close() {
                    log::debug!("or-combiner: input {index} closed first");
                }
            });
        }

        OrCombiner { out }
    }

    /// Returns the output signal that closes when any input signal closes.
    pub fn out(&self) -> CompletionSignal {
        self.out.clone()
    }
}

/// Exactly-once close of the output, decided by a compare-and-swap rather than a lock.
struct CloseGate {
    fired: AtomicBool,
    closer: SignalCloser,
}

impl CloseGate {
    fn new(closer: SignalCloser) -> CloseGate {
        CloseGate {
            fired: AtomicBool::new(false),
            closer,
        }
    }

    /// Closes the output if no one has yet. Returns `true` for the single winner.
    fn try_close(&self) -> bool {
        if self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.closer.close();
            true
        } else {
            false
        }
    }
}
