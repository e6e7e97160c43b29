//! Acknowledged work queues and cooperative stop signals.
//!
//! [`WorkQueue`] wraps an unbounded crossbeam channel with a pending-work
//! counter: an item counts as pending from [`WorkQueue::put`] until the
//! [`Delivery`] handed to the consumer is dropped. [`WorkQueue::join`] blocks
//! until that counter reaches zero, which is how the pipeline coordinator
//! proves a stage has no unacknowledged work before signalling the next one.
//!
//! ```text
//! put() ──► pending += 1 ──► channel ──► recv_timeout() ──► Delivery
//!                                                             │ drop
//! join() ◄── notify when pending == 0 ◄── pending -= 1 ◄──────┘
//! ```

use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};

// ---------------------------------------------------------------------------
// Pending counter
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    drained: Condvar,
}

impl Pending {
    fn add(&self) {
        *self.count.lock() += 1;
    }

    fn done(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.drained.notify_all();
        }
    }

    fn wait_drained(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.drained.wait(&mut count);
        }
    }

    fn wait_drained_for(&self, timeout: Duration) -> bool {
        let mut count = self.count.lock();
        while *count > 0 {
            if self.drained.wait_for(&mut count, timeout).timed_out() {
                return *count == 0;
            }
        }
        true
    }

    fn get(&self) -> usize {
        *self.count.lock()
    }
}

// ---------------------------------------------------------------------------
// WorkQueue
// ---------------------------------------------------------------------------

/// Unbounded multi-producer multi-consumer queue with acknowledgement.
///
/// Cloning is cheap; all clones share the same channel and counter.
pub struct WorkQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    pending: Arc<Pending>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone(), rx: self.rx.clone(), pending: Arc::clone(&self.pending) }
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx, pending: Arc::new(Pending::default()) }
    }

    /// Enqueue an item. It stays pending until its [`Delivery`] is dropped.
    pub fn put(&self, item: T) {
        // Count before sending so join() can never observe zero while the
        // item is in the channel.
        self.pending.add();
        if self.tx.send(item).is_err() {
            // Unreachable while `self` holds a receiver; keep the count honest.
            self.pending.done();
        }
    }

    /// Wait up to `timeout` for the next item.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Delivery<T>, RecvTimeoutError> {
        let item = self.rx.recv_timeout(timeout)?;
        Ok(Delivery { item, pending: Arc::clone(&self.pending) })
    }

    /// Block until every item put so far has been acknowledged.
    pub fn join(&self) {
        self.pending.wait_drained();
    }

    /// Like [`join`](Self::join) but gives up after `timeout`.
    /// Returns `true` if the queue drained.
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        self.pending.wait_drained_for(timeout)
    }

    /// Items enqueued but not yet acknowledged (queued or being processed).
    pub fn pending(&self) -> usize {
        self.pending.get()
    }

    /// Items waiting in the channel, not yet received.
    #[cfg(test)]
    fn len(&self) -> usize {
        self.rx.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// A received item; acknowledges it on drop, including during unwinding.
pub struct Delivery<T> {
    item: T,
    pending: Arc<Pending>,
}

impl<T> Deref for Delivery<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

impl<T> Drop for Delivery<T> {
    fn drop(&mut self) {
        self.pending.done();
    }
}

// ---------------------------------------------------------------------------
// StopToken
// ---------------------------------------------------------------------------

/// Shared one-way stop signal for a pipeline stage.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
