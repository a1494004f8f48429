//! Ordered, closeable, multi-producer multi-consumer data streams.
//!
//! A stream is the conduit every data-carrying primitive in this crate is built on. It
//! is a blocking MPMC channel in the spirit of `std::sync::mpsc`, with clonable
//! receivers and three capacity modes:
//!
//! - [`rendezvous`] (capacity 0): no buffering at all; [`Sender::send`] returns only
//!   once a receiver has taken the value.
//! - [`bounded`]: at most `n` values are buffered; `send` blocks while the buffer is full.
//! - [`channel`]: an unbounded buffer; `send` never blocks.
//!
//! The stream is closed from the producer side by dropping every [`Sender`] (including
//! clones). Receivers then drain whatever is still buffered before
//! [`Receiver::recv`] starts returning [`RecvError`]. Dropping every [`Receiver`]
//! disconnects the stream the other way: pending and future sends fail and hand the
//! value back.

use std::collections::VecDeque;
use std::sync::mpsc::{RecvError, RecvTimeoutError, SendError, TryRecvError, TrySendError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Creates a stream with an unbounded buffer.
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let queue = StreamQueue::<T>::new(None);
    (Sender(queue.clone()), Receiver(queue))
}

/// Creates a stream buffering at most `bound` values.
///
/// A `bound` of zero creates a [`rendezvous`] stream.
pub fn bounded<T>(bound: usize) -> (Sender<T>, Receiver<T>) {
    let queue = StreamQueue::<T>::new(Some(bound));
    (Sender(queue.clone()), Receiver(queue))
}

/// Creates an unbuffered stream: each send completes only when a receiver takes
/// the value.
pub fn rendezvous<T>() -> (Sender<T>, Receiver<T>) {
    bounded(0)
}

/// The sending half of a stream.
pub struct Sender<T>(StreamQueue<T>);

impl<T> Sender<T> {
    /// Sends a value, blocking while the stream has no room for it.
    ///
    /// On a rendezvous stream this waits until a receiver has taken the value.
    /// Returns the value back inside [`SendError`] if every receiver is gone; a
    /// rendezvous send that is still waiting when the last receiver drops also gets
    /// its value back.
    pub fn send(&self, msg: T) -> Result<(), SendError<T>> {
        self.0.enqueue(msg).map_err(SendError)
    }

    /// Attempts to send a value without blocking.
    ///
    /// On a rendezvous stream this succeeds only when a receiver is already waiting.
    pub fn try_send(&self, msg: T) -> Result<(), TrySendError<T>> {
        self.0.try_enqueue(msg)
    }

    /// Closes this sending handle.
    ///
    /// Equivalent to dropping it; the stream closes once the last sender is closed.
    pub fn close(self) {}
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        self.0.add_producer();
        Self(self.0.clone())
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        self.0.drop_producer();
    }
}

/// The receiving half of a stream. Clones share the same stream and compete for
/// its values: each value is received exactly once.
pub struct Receiver<T>(StreamQueue<T>);

impl<T> Receiver<T> {
    /// Blocks until a value is available, or returns [`RecvError`] once the stream is
    /// closed and drained.
    pub fn recv(&self) -> Result<T, RecvError> {
        self.0.dequeue(None).map_err(|_| RecvError)
    }

    /// Like [`recv`](Self::recv), giving up after `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.0.dequeue(Some(Instant::now() + timeout))
    }

    /// Receives a value without blocking.
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        self.0.try_dequeue()
    }

    /// Returns a blocking iterator that ends when the stream is closed and drained.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter { rx: self }
    }
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        self.0.add_consumer();
        Self(self.0.clone())
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        self.0.drop_consumer();
    }
}

impl<T> std::fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver").finish_non_exhaustive()
    }
}

pub struct Iter<'a, T> {
    rx: &'a Receiver<T>,
}

impl<T> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.rx.recv().ok()
    }
}

pub struct IntoIter<T> {
    rx: Receiver<T>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.rx.recv().ok()
    }
}

impl<'a, T> IntoIterator for &'a Receiver<T> {
    type Item = T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

impl<T> IntoIterator for Receiver<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        IntoIter { rx: self }
    }
}

/// Shared handle to the stream state. Cloning it does not register a producer or a
/// consumer; [`Sender`] and [`Receiver`] do that bookkeeping.
struct StreamQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for StreamQueue<T> {
    fn clone(&self) -> Self {
        StreamQueue {
            inner: self.inner.clone(),
        }
    }
}

impl<T> StreamQueue<T> {
    /// `None` is unbounded, `Some(0)` is rendezvous. Starts with one producer and one
    /// consumer registered.
    fn new(capacity: Option<usize>) -> Self {
        let state = State {
            queue: VecDeque::new(),
            capacity,
            producers: 1,
            consumers: 1,
            waiting_consumers: 0,
            sent: 0,
            received: 0,
        };

        StreamQueue {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
                taken: Condvar::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.inner.state.lock().unwrap()
    }

    fn add_producer(&self) {
        let mut state = self.lock();
        assert!(
            state.producers != 0,
            "Attempt to add producer when the stream is closed"
        );
        state.producers += 1;
    }

    fn drop_producer(&self) {
        let mut state = self.lock();
        assert!(
            state.producers >= 1,
            "drop_producer is called more times than add_producer"
        );
        state.producers -= 1;
        if state.producers == 0 {
            // Consumers blocked on an empty stream must observe the closure.
            self.inner.not_empty.notify_all();
        }
    }

    fn add_consumer(&self) {
        let mut state = self.lock();
        assert!(
            state.consumers > 0,
            "Attempt to add consumer when the stream is disconnected"
        );
        state.consumers += 1;
    }

    fn drop_consumer(&self) {
        let mut state = self.lock();
        assert!(
            state.consumers > 0,
            "drop_consumer is called more times than add_consumer"
        );
        state.consumers -= 1;
        if state.consumers == 0 {
            // A rendezvous producer reclaims its own pending value.
            if !state.is_rendezvous() {
                state.queue.clear();
            }
            self.inner.not_full.notify_all();
            self.inner.taken.notify_all();
        }
    }

    fn enqueue(&self, item: T) -> Result<(), T> {
        let mut state = self.lock();
        loop {
            if state.consumers == 0 {
                return Err(item);
            }
            if state.is_full() {
                state = self.inner.not_full.wait(state).unwrap();
                continue;
            }
            break;
        }

        state.queue.push_back(item);
        state.sent += 1;
        let ticket = state.sent;
        let rendezvous = state.is_rendezvous();
        drop(state);
        self.inner.not_empty.notify_one();

        if rendezvous {
            let mut state = self.lock();
            while state.received < ticket {
                if state.consumers == 0 {
                    // Not taken, so it is still the single slot's occupant.
                    return match state.queue.pop_back() {
                        Some(item) => Err(item),
                        None => Ok(()),
                    };
                }
                state = self.inner.taken.wait(state).unwrap();
            }
        }
        Ok(())
    }

    fn try_enqueue(&self, item: T) -> Result<(), TrySendError<T>> {
        let mut state = self.lock();
        if state.consumers == 0 {
            return Err(TrySendError::Disconnected(item));
        }
        let has_room = if state.is_rendezvous() {
            state.queue.is_empty() && state.waiting_consumers > 0
        } else {
            !state.is_full()
        };
        if !has_room {
            return Err(TrySendError::Full(item));
        }

        state.queue.push_back(item);
        state.sent += 1;
        drop(state);
        self.inner.not_empty.notify_one();
        Ok(())
    }

    fn dequeue(&self, deadline: Option<Instant>) -> Result<T, RecvTimeoutError> {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.queue.pop_front() {
                state.received += 1;
                let rendezvous = state.is_rendezvous();
                drop(state);
                self.inner.not_full.notify_one();
                if rendezvous {
                    self.inner.taken.notify_all();
                }
                return Ok(item);
            }

            if state.producers == 0 {
                return Err(RecvTimeoutError::Disconnected);
            }

            state.waiting_consumers += 1;
            state = match deadline {
                None => self.inner.not_empty.wait(state).unwrap(),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        state.waiting_consumers -= 1;
                        return Err(RecvTimeoutError::Timeout);
                    }
                    self.inner
                        .not_empty
                        .wait_timeout(state, deadline - now)
                        .unwrap()
                        .0
                }
            };
            state.waiting_consumers -= 1;
        }
    }

    fn try_dequeue(&self) -> Result<T, TryRecvError> {
        let mut state = self.lock();
        if let Some(item) = state.queue.pop_front() {
            state.received += 1;
            let rendezvous = state.is_rendezvous();
            drop(state);
            self.inner.not_full.notify_one();
            if rendezvous {
                self.inner.taken.notify_all();
            }
            return Ok(item);
        }

        if state.producers == 0 {
            Err(TryRecvError::Disconnected)
        } else {
            Err(TryRecvError::Empty)
        }
    }
}

/// The state of the stream protected by the mutex.
struct State<T> {
    queue: VecDeque<T>,
    capacity: Option<usize>,
    producers: usize,
    consumers: usize,
    /// Receivers currently blocked in `dequeue`.
    waiting_consumers: usize,
    /// Total number of values ever enqueued and dequeued. A rendezvous sender waits
    /// until `received` reaches its own ticket.
    sent: u64,
    received: u64,
}

impl<T> State<T> {
    fn is_rendezvous(&self) -> bool {
        self.capacity == Some(0)
    }

    /// A rendezvous stream still parks one value in the queue while its sender waits
    /// for the hand-off, hence the single slot.
    fn is_full(&self) -> bool {
        match self.capacity {
            Some(cap) => self.queue.len() >= cap.max(1),
            None => false,
        }
    }
}

struct Inner<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar, // Signals consumers that a value was added or producers left.
    not_full: Condvar,  // Signals producers that a slot was freed.
    taken: Condvar,     // Signals rendezvous producers that a value was received.
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    #[test]
    fn test_stream_send_sync() {
        fn is_send_sync<T: Send + Sync>() {}
        is_send_sync::<Sender<usize>>();
        is_send_sync::<Receiver<usize>>();
    }

    #[test]
    fn test_unbounded_send_recv() {
        let (tx, rx) = channel::<i32>();
        for i in 0..1000 {
            tx.send(i).unwrap();
        }
        drop(tx);
        assert_eq!(rx.iter().collect::<Vec<_>>(), (0..1000).collect::<Vec<_>>());
        assert_eq!(rx.recv(), Err(RecvError));
    }

    #[test]
    fn test_bounded_blocks_when_full() {
        let (tx, rx) = bounded::<&str>(1);
        tx.send("first").unwrap();

        let sent = Arc::new(AtomicBool::new(false));
        let handle = thread::spawn({
            let sent = sent.clone();
            move || {
                tx.send("second").unwrap();
                sent.store(true, Ordering::SeqCst);
            }
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!sent.load(Ordering::SeqCst));
        assert_eq!(rx.recv().unwrap(), "first");
        handle.join().unwrap();
        assert_eq!(rx.recv().unwrap(), "second");
    }

    #[test]
    fn test_rendezvous_send_waits_for_receiver() {
        let (tx, rx) = rendezvous::<u32>();
        let sent = Arc::new(AtomicBool::new(false));
        let handle = thread::spawn({
            let sent = sent.clone();
            move || {
                tx.send(7).unwrap();
                sent.store(true, Ordering::SeqCst);
            }
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!sent.load(Ordering::SeqCst), "send returned before hand-off");
        assert_eq!(rx.recv().unwrap(), 7);
        handle.join().unwrap();
        assert!(sent.load(Ordering::SeqCst));
        assert_eq!(rx.recv(), Err(RecvError));
    }

    #[test]
    fn test_rendezvous_multi_producer() {
        let (tx, rx) = rendezvous::<usize>();
        thread::scope(|s| {
            for p in 0..4 {
                let tx = tx.clone();
                s.spawn(move || {
                    for i in 0..50 {
                        tx.send(p * 50 + i).unwrap();
                    }
                });
            }
            drop(tx);

            let mut received = rx.iter().collect::<Vec<_>>();
            received.sort();
            assert_eq!(received, (0..200).collect::<Vec<_>>());
        });
    }

    #[test]
    fn test_rendezvous_reclaims_value_on_disconnect() {
        let (tx, rx) = rendezvous::<String>();
        let handle = thread::spawn(move || tx.send("orphan".to_string()));
        thread::sleep(Duration::from_millis(50));
        drop(rx);
        let err = handle.join().unwrap().unwrap_err();
        assert_eq!(err.0, "orphan");
    }

    #[test]
    fn test_rendezvous_try_send() {
        let (tx, rx) = rendezvous::<i32>();
        assert_eq!(tx.try_send(1), Err(TrySendError::Full(1)));

        let handle = thread::spawn(move || rx.recv().unwrap());
        let mut value = 2;
        loop {
            match tx.try_send(value) {
                Ok(()) => break,
                Err(TrySendError::Full(v)) => {
                    value = v;
                    thread::sleep(Duration::from_millis(1));
                }
                Err(TrySendError::Disconnected(_)) => panic!("unexpected disconnect"),
            }
        }
        assert_eq!(handle.join().unwrap(), 2);
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (tx, rx) = bounded::<i32>(4);
        tx.send(1).unwrap();
        drop(rx);
        assert_eq!(tx.send(2), Err(SendError(2)));
        assert_eq!(tx.try_send(3), Err(TrySendError::Disconnected(3)));
    }

    #[test]
    fn test_recv_drains_after_close() {
        let (tx, rx) = bounded::<i32>(4);
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        tx.close();
        assert_eq!(rx.try_recv(), Ok(1));
        assert_eq!(rx.recv(), Ok(2));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));
    }

    #[test]
    fn test_try_recv_and_timeout() {
        let (tx, rx) = channel::<i32>();
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(20)),
            Err(RecvTimeoutError::Timeout)
        );
        tx.send(5).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_millis(20)), Ok(5));
        drop(tx);
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(20)),
            Err(RecvTimeoutError::Disconnected)
        );
    }

    #[test]
    fn test_multi_producer_multi_consumer() {
        const NUM_PRODUCERS: usize = 4;
        const NUM_CONSUMERS: usize = 3;
        const ITEMS_PER_PRODUCER: usize = 500;

        let (tx, rx) = bounded::<usize>(8);
        thread::scope(|s| {
            for i in 0..NUM_PRODUCERS {
                let tx = tx.clone();
                s.spawn(move || {
                    for j in 0..ITEMS_PER_PRODUCER {
                        tx.send(i * ITEMS_PER_PRODUCER + j).unwrap();
                    }
                });
            }
            drop(tx);

            let consumers = (0..NUM_CONSUMERS)
                .map(|_| {
                    let rx = rx.clone();
                    s.spawn(move || rx.into_iter().collect::<Vec<_>>())
                })
                .collect::<Vec<_>>();
            drop(rx);

            let mut all = consumers
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect::<Vec<_>>();
            all.sort();
            assert_eq!(all, (0..NUM_PRODUCERS * ITEMS_PER_PRODUCER).collect::<Vec<_>>());
        });
    }

    #[test]
    fn test_per_producer_order_preserved() {
        let (tx, rx) = bounded::<(usize, usize)>(2);
        thread::scope(|s| {
            for p in 0..3 {
                let tx = tx.clone();
                s.spawn(move || {
                    for i in 0..100 {
                        if fastrand::u8(..) < 16 {
                            thread::yield_now();
                        }
                        tx.send((p, i)).unwrap();
                    }
                });
            }
            drop(tx);

            let mut last = [None::<usize>; 3];
            for (p, i) in &rx {
                if let Some(prev) = last[p] {
                    assert!(i > prev);
                }
                last[p] = Some(i);
            }
            assert_eq!(last, [Some(99); 3]);
        });
    }
}
