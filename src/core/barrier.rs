//! Single-shot rendezvous for the worker pool
//!
//! Behaves like `std::sync::Barrier` for its first and only rendezvous.
//! Once every party has arrived the barrier is spent and later waits
//! return at once. [`DrainBarrier::interrupt`] releases a partial
//! rendezvous; the pipeline calls it whenever it is cancelled, so waiters
//! can never outlive the run.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

const OPEN: u8 = 0;
const RELEASED: u8 = 1;
const INTERRUPTED: u8 = 2;

/// Outcome of a barrier wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierWait {
    /// This thread was the last to arrive and released the others
    Leader,
    /// Released by the last arrival
    Follower,
    /// The rendezvous had already happened before this call
    Spent,
    /// Released by an interrupt before every party arrived
    Interrupted,
}

/// Rendezvous point for a fixed number of parties
#[derive(Debug)]
pub struct DrainBarrier {
    parties: usize,
    // Written only under `arrived`; read lock-free by the gate check.
    phase: AtomicU8,
    arrived: Mutex<usize>,
    cvar: Condvar,
}

impl DrainBarrier {
    /// Create a barrier for `parties` participants
    pub fn new(parties: usize) -> Self {
        Self {
            parties: parties.max(1),
            phase: AtomicU8::new(OPEN),
            arrived: Mutex::new(0),
            cvar: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.arrived.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn phase(&self) -> u8 {
        self.phase.load(Ordering::SeqCst)
    }

    /// Block until every party has arrived or the barrier is interrupted
    pub fn wait(&self) -> BarrierWait {
        let mut arrived = self.lock();
        match self.phase() {
            RELEASED => return BarrierWait::Spent,
            INTERRUPTED => return BarrierWait::Interrupted,
            _ => {}
        }

        *arrived += 1;
        if *arrived == self.parties {
            self.phase.store(RELEASED, Ordering::SeqCst);
            self.cvar.notify_all();
            return BarrierWait::Leader;
        }

        while self.phase() == OPEN {
            arrived = self.cvar.wait(arrived).unwrap_or_else(PoisonError::into_inner);
        }

        match self.phase() {
            RELEASED => BarrierWait::Follower,
            _ => BarrierWait::Interrupted,
        }
    }

    /// Release all waiters; a barrier that already released stays released
    pub fn interrupt(&self) {
        let _arrived = self.lock();
        if self.phase() == OPEN {
            self.phase.store(INTERRUPTED, Ordering::SeqCst);
        }
        self.cvar.notify_all();
    }

    /// Whether a rendezvous can still happen
    pub fn is_open(&self) -> bool {
        self.phase() == OPEN
    }

    /// Whether the full rendezvous took place
    pub fn is_released(&self) -> bool {
        self.phase() == RELEASED
    }

    /// Number of participants
    pub fn parties(&self) -> usize {
        self.parties
    }
}
