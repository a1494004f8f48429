//! Fan-in: merging several streams into one.

use std::thread;

use crate::stream::{self, Receiver, Sender};

/// Merges multiple input streams into a single output stream.
///
/// One relay thread per input forwards values, in the order that input produced them,
/// into a shared unbuffered output. The output closes once every input has closed and
/// been drained: each relay holds a sending handle to the output and the stream closes
/// when the last one is released.
///
/// Values from the same input keep their relative order; the interleaving across
/// inputs depends on scheduling. Since the output does not buffer, a slow consumer
/// throttles every producer equally.
///
/// If every receiver of the output is dropped, the relays stop forwarding and exit.
pub struct FanInMerger<T> {
    out: Receiver<T>,
}

impl<T: Send + 'static> FanInMerger<T> {
    /// Creates the merger and starts one relay thread per input.
    ///
    /// With no inputs the output is closed immediately.
    pub fn new(inputs: impl IntoIterator<Item = Receiver<T>>) -> FanInMerger<T> {
        let (tx, out) = stream::rendezvous::<T>();
        for (index, input) in inputs.into_iter().enumerate() {
            let tx = tx.clone();
            thread::spawn(move || Self::relay(index, input, tx));
        }
        FanInMerger { out }
    }

    fn relay(index: usize, input: Receiver<T>, out: Sender<T>) {
        let mut forwarded = 0usize;
        for value in &input {
            if out.send(value).is_err() {
                log::debug!("fan-in relay {index}: output disconnected after {forwarded} values");
                return;
            }
            forwarded += 1;
        }
        log::trace!("fan-in relay {index}: input closed after {forwarded} values");
    }
}

impl<T> FanInMerger<T> {
    /// Returns the merged output stream.
    pub fn out(&self) -> &Receiver<T> {
        &self.out
    }

    /// Consumes the merger, returning the merged output stream.
    pub fn into_out(self) -> Receiver<T> {
        self.out
    }
}
