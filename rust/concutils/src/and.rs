//! Completion combinator that waits for *all* of its inputs.

use std::{
    sync::{
        Arc, OnceLock,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

use crate::signal::{self, CompletionSignal};

/// Waits for every one of its input signals to close.
///
/// The combined output signal closes only after all inputs have closed, right after
/// the last one does. Useful for waiting on a group of threads that each expose a
/// completion signal.
///
/// ## Edge Cases
///
/// - No inputs: the output never closes.
/// - One input: the output *is* that input; no thread is spawned.
///
/// An input that never closes keeps its observer thread blocked forever and the output
/// open; there is no way to abandon the wait.
pub struct AndCombiner {
    out: CompletionSignal,
}

impl AndCombiner {
    /// Creates the combiner and starts observing `signals`.
    ///
    /// For two or more inputs this spawns one observer thread per input, which
    /// decrements a shared countdown when its input closes, and one coordinator thread
    /// that closes the output once the countdown reaches zero.
    pub fn new(signals: impl IntoIterator<Item = CompletionSignal>) -> AndCombiner {
        let mut signals = signals.into_iter().collect::<Vec<_>>();
        match signals.len() {
            0 => {
                return AndCombiner {
                    out: CompletionSignal::never(),
                };
            }
            1 => {
                return AndCombiner {
                    out: signals.swap_remove(0),
                };
            }
            _ => (),
        }

        let (closer, out) = signal::pair();
        let countdown = Countdown::new(signals.len());

        for (index, input) in signals.into_iter().enumerate() {
            let countdown = countdown.clone();
            thread::spawn(move || {
                input.wait();
                log::trace!("and-combiner input {index} closed");
                countdown.arrive();
            });
        }

        thread::spawn(move || {
            countdown.wait();
            log::debug!("and-combiner: all inputs closed");
            closer.close();
        });

        AndCombiner { out }
    }

    /// Returns the output signal that closes when all input signals have closed.
    pub fn out(&self) -> CompletionSignal {
        self.out.clone()
    }
}

/// A one-time counting barrier: [`wait`](Self::wait) returns once
/// [`arrive`](Self::arrive) has been called `count` times.
struct Countdown {
    remaining: AtomicUsize,
    /// Completion "event", set by the last arrival.
    completion: OnceLock<()>,
}

impl Countdown {
    fn new(count: usize) -> Arc<Countdown> {
        Arc::new(Countdown {
            remaining: AtomicUsize::new(count),
            completion: OnceLock::new(),
        })
    }

    fn arrive(&self) {
        let prev = self.remaining.fetch_sub(1, Ordering::SeqCst);
        assert_ne!(prev, 0);
        if prev == 1 {
            let _ = self.completion.set(());
        }
    }

    fn wait(&self) {
        self.completion.wait();
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::AndCombiner;
    use crate::signal::{self, CompletionSignal};

    #[test]
    fn test_closes_after_slowest() {
        let start = Instant::now();
        let combiner = AndCombiner::new([
            signal::after(Duration::from_millis(300)),
            signal::after(Duration::from_millis(10)),
            signal::after(Duration::from_millis(150)),
        ]);
        let out = combiner.out();
        assert!(!out.wait_timeout(Duration::from_millis(200)));
        out.wait();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(800), "closed late: {elapsed:?}");
    }

    #[test]
    fn test_no_inputs_never_closes() {
        let combiner = AndCombiner::new(Vec::<CompletionSignal>::new());
        assert!(!combiner.out().wait_timeout(Duration::from_millis(50)));
    }

    #[test]
    fn test_single_input_aliases() {
        let (closer, input) = signal::pair();
        let combiner = AndCombiner::new([input.clone()]);
        assert!(combiner.out().same_as(&input));
        assert!(!combiner.out().is_closed());
        closer.close();
        assert!(combiner.out().is_closed());
    }

    #[test]
    fn test_already_closed_inputs() {
        let combiner = AndCombiner::new((0..5).map(|_| CompletionSignal::closed()));
        assert!(combiner.out().wait_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn test_open_input_holds_output() {
        let (closer, pending) = signal::pair();
        let combiner = AndCombiner::new([CompletionSignal::closed(), pending]);
        assert!(!combiner.out().wait_timeout(Duration::from_millis(50)));
        drop(closer);
        assert!(combiner.out().wait_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn test_many_concurrent_inputs() {
        let (closers, inputs): (Vec<_>, Vec<_>) = (0..64).map(|_| signal::pair()).unzip();
        let combiner = AndCombiner::new(inputs);
        let out = combiner.out();

        let mut closers = closers;
        let last = closers.pop().unwrap();
        std::thread::scope(|s| {
            for closer in closers {
                s.spawn(move || {
                    std::thread::sleep(Duration::from_millis(fastrand::u64(0..20)));
                    closer.close();
                });
            }
        });
        assert!(!out.wait_timeout(Duration::from_millis(30)));
        last.close();
        assert!(out.wait_timeout(Duration::from_secs(5)));
    }
}
