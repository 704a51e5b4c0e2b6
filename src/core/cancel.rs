//! Pipeline-wide cancellation token
//!
//! A monotonic flag paired with a notification channel. Cancelling closes
//! the channel, which wakes every thread parked in a `select` on it; the
//! flag lets non-blocked code poll cheaply.

use crossbeam::channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

const RUNNING: u8 = 0;

/// Why the pipeline stopped
///
/// Reasons are ordered by severity. A later, stronger reason replaces a
/// weaker one, never the other way around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelReason {
    /// The manager walked the whole tree
    Exhausted = 1,
    /// An external shutdown request arrived
    Interrupted = 2,
    /// A copy failed mid-stream
    Failed = 3,
}

impl CancelReason {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Exhausted),
            2 => Some(Self::Interrupted),
            3 => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether queued work should be dropped instead of copied
    ///
    /// Only a failed copy aborts; an external shutdown stops the walk but
    /// still lets the workers copy what was already queued.
    pub fn is_abort(self) -> bool {
        self == Self::Failed
    }
}

struct TokenInner {
    state: AtomicU8,
    notify: Mutex<Option<Sender<()>>>,
    closed: Receiver<()>,
}

/// Cloneable handle to a shared cancellation flag
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl CancellationToken {
    /// Create a token in the running state
    pub fn new() -> Self {
        // Nothing is ever sent; dropping the sender is the broadcast.
        let (notify, closed) = bounded(0);
        Self {
            inner: Arc::new(TokenInner {
                state: AtomicU8::new(RUNNING),
                notify: Mutex::new(Some(notify)),
                closed,
            }),
        }
    }

    /// Cancel with the given reason
    ///
    /// Returns `true` only for the call that moved the token out of the
    /// running state. That call also wakes every waiter.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        let previous = self.inner.state.fetch_max(reason as u8, Ordering::SeqCst);
        if previous != RUNNING {
            return false;
        }

        let sender = self
            .inner
            .notify
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sender);
        true
    }

    /// Check whether the token has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.inner.state.load(Ordering::SeqCst) != RUNNING
    }

    /// Current cancellation reason, if any
    pub fn reason(&self) -> Option<CancelReason> {
        CancelReason::from_u8(self.inner.state.load(Ordering::SeqCst))
    }

    /// Check whether queued work must be abandoned
    pub fn is_aborted(&self) -> bool {
        self.reason().is_some_and(CancelReason::is_abort)
    }

    /// Receiver that becomes disconnected once the token is cancelled
    ///
    /// Intended for use in a `select` next to the operation being waited on.
    pub fn closed(&self) -> &Receiver<()> {
        &self.inner.closed
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("reason", &self.reason())
            .finish()
    }
}
