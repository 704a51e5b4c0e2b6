//! Bounded task queue
//!
//! A fixed-capacity FIFO between the manager and the workers, built on a
//! `crossbeam` bounded channel. A blocked enqueue also listens on the
//! pipeline's cancellation token so that a shutdown wakes the producer.
//! Consumers stop only once the producer has closed the queue and every
//! queued item has been handed out.

use crate::core::CancellationToken;
use crate::error::{MirrorCopyError, Result};
use crossbeam::channel::{bounded, Receiver, Select, Sender, TrySendError};
use std::sync::{Mutex, PoisonError};

/// Item handed back by [`BoundedQueue::enqueue`] after cancellation
///
/// The caller owns the item again and is responsible for releasing it.
#[derive(Debug)]
pub struct Rejected<T>(pub T);

impl<T> Rejected<T> {
    /// Take the rejected item back
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Bounded blocking FIFO aware of pipeline cancellation
pub struct BoundedQueue<T> {
    // Taken by `close`; an in-flight enqueue keeps its own clone, so its
    // item is delivered before consumers see the disconnect.
    sender: Mutex<Option<Sender<T>>>,
    receiver: Receiver<T>,
    capacity: usize,
    token: CancellationToken,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items
    pub fn new(capacity: usize, token: CancellationToken) -> Result<Self> {
        if capacity == 0 {
            return Err(MirrorCopyError::config("queue capacity must be a positive integer"));
        }

        let (sender, receiver) = bounded(capacity);
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            receiver,
            capacity,
            token,
        })
    }

    fn sender(&self) -> Option<Sender<T>> {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Insert at the tail, blocking while the queue is full
    ///
    /// Fails fast with [`Rejected`] once the token is cancelled or the
    /// queue is closed, including when cancellation arrives while this call
    /// is blocked.
    pub fn enqueue(&self, item: T) -> std::result::Result<(), Rejected<T>> {
        if self.token.is_cancelled() {
            return Err(Rejected(item));
        }
        let Some(sender) = self.sender() else {
            return Err(Rejected(item));
        };

        let item = match sender.try_send(item) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(item)) => item,
            Err(TrySendError::Disconnected(item)) => return Err(Rejected(item)),
        };

        let mut sel = Select::new();
        let send_index = sel.send(&sender);
        sel.recv(self.token.closed());

        let oper = sel.select();
        if oper.index() == send_index {
            oper.send(&sender, item).map_err(|e| Rejected(e.into_inner()))
        } else {
            // The notification channel only ever disconnects.
            let _ = oper.recv(self.token.closed());
            Err(Rejected(item))
        }
    }

    /// Remove from the head, blocking while the queue is empty
    ///
    /// Returns `None` once the queue is closed and drained. Every item
    /// accepted by [`enqueue`](Self::enqueue) is delivered first, whether
    /// or not the token has been cancelled since.
    pub fn dequeue(&self) -> Option<T> {
        self.receiver.recv().ok()
    }

    /// Stop accepting items; consumers drain what is left and then stop
    pub fn close(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sender);
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Maximum number of queued items
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
