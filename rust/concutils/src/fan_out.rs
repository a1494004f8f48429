//! Fan-out: splitting one stream into several by round-robin.

use std::thread;

use crate::stream::{self, Receiver, Sender};

/// Distributes values from one input stream to multiple output streams in a strict
/// round-robin fashion.
///
/// A single dispatcher thread reads the input in arrival order and sends the value with
/// arrival index `i` to output `i % n`, blocking until that particular output's consumer
/// takes it. The assignment never depends on which consumer happens to be ready: a slow
/// consumer on output `k` stalls the whole distributor whenever a value for `k` is due.
/// When the input closes, the dispatcher closes every output in turn.
///
/// If every receiver of an output has been dropped, the values due to that output are
/// discarded (with a warning) and dispatch carries on with the next index.
pub struct FanOutDistributor<T> {
    outs: Vec<Receiver<T>>,
}

impl<T: Send + 'static> FanOutDistributor<T> {
    /// Creates the distributor and starts the dispatcher.
    ///
    /// With `num_outs == 0` the distributor has no outputs and no dispatcher is
    /// started; the input is left untouched (and dropped).
    pub fn new(input: Receiver<T>, num_outs: usize) -> FanOutDistributor<T> {
        if num_outs == 0 {
            return FanOutDistributor { outs: Vec::new() };
        }

        let (senders, outs) = (0..num_outs)
            .map(|_| stream::rendezvous::<T>())
            .unzip::<_, _, Vec<_>, Vec<_>>();
        thread::spawn(move || Self::dispatch(input, senders));
        FanOutDistributor { outs }
    }

    fn dispatch(input: Receiver<T>, outs: Vec<Sender<T>>) {
        let mut dispatched = 0usize;
        for (i, value) in input.iter().enumerate() {
            let target = i % outs.len();
            match outs[target].send(value) {
                Ok(()) => dispatched += 1,
                Err(_) => log::warn!("fan-out output {target} has no receivers, value {i} dropped"),
            }
        }

        log::debug!(
            "fan-out: input closed after {dispatched} values, closing {} outputs",
            outs.len()
        );
        for out in outs {
            out.close();
        }
    }
}

impl<T> FanOutDistributor<T> {
    /// Returns the output streams, one per consumer.
    pub fn outs(&self) -> &[Receiver<T>] {
        &self.outs
    }

    /// Consumes the distributor, returning the output streams.
    pub fn into_outs(self) -> Vec<Receiver<T>> {
        self.outs
    }

    pub fn len(&self) -> usize {
        self.outs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        thread,
        time::Duration,
    };

    use super::FanOutDistributor;
    use crate::stream;

    #[test]
    fn test_distributes_all_items() {
        let (tx, rx) = stream::rendezvous::<usize>();
        let distributor = FanOutDistributor::new(rx, 5);
        assert_eq!(distributor.len(), 5);

        let received = AtomicUsize::new(0);
        thread::scope(|s| {
            s.spawn(move || {
                for i in 0..100 {
                    tx.send(i).unwrap();
                }
            });
            for out in distributor.outs() {
                let received = &received;
                s.spawn(move || {
                    for _ in out {
                        received.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });
        assert_eq!(received.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn test_round_robin_assignment() {
        const N: usize = 3;
        let (tx, rx) = stream::channel::<usize>();
        for i in 0..31 {
            tx.send(i).unwrap();
        }
        drop(tx);

        let distributor = FanOutDistributor::new(rx, N);
        let results = thread::scope(|s| {
            let handles = distributor
                .into_outs()
                .into_iter()
                .map(|out| {
                    s.spawn(move || {
                        out.into_iter()
                            .inspect(|_| {
                                if fastrand::u8(..) < 32 {
                                    thread::sleep(Duration::from_micros(200));
                                }
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .collect::<Vec<_>>()
        });

        for (k, items) in results.iter().enumerate() {
            let expected = (k..31).step_by(N).collect::<Vec<_>>();
            assert_eq!(items, &expected, "output {k}");
        }
    }

    #[test]
    fn test_zero_outputs() {
        let (_tx, rx) = stream::channel::<u8>();
        let distributor = FanOutDistributor::new(rx, 0);
        assert!(distributor.is_empty());
        assert!(distributor.outs().is_empty());
    }

    #[test]
    fn test_outputs_close_after_input() {
        let (tx, rx) = stream::channel::<u8>();
        let distributor = FanOutDistributor::new(rx, 2);
        for out in distributor.outs() {
            assert!(out.recv_timeout(Duration::from_millis(20)).is_err());
        }
        drop(tx);
        for out in distributor.outs() {
            assert!(out.recv().is_err());
        }
    }

    #[test]
    fn test_dropped_output_is_skipped() {
        let (tx, rx) = stream::channel::<usize>();
        for i in 0..10 {
            tx.send(i).unwrap();
        }
        drop(tx);

        let mut outs = FanOutDistributor::new(rx, 2).into_outs();
        drop(outs.pop());
        let even = outs.pop().unwrap().into_iter().collect::<Vec<_>>();
        assert_eq!(even, vec![0, 2, 4, 6, 8]);
    }
}
