//! # Blocking registry: continuations parked on a future.
//!
//! A bounded lock-free ring absorbs the common case; bursts beyond its capacity
//! spill into an unbounded segmented queue, so [`BlockingRegistry::push`] never fails
//! and never blocks the producer.
//!
//! ```text
//! block(waker) ──► ring (ArrayQueue, fixed capacity)
//!                    └─ full ──► overflow (SegQueue, unbounded)
//!
//! complete/close ──► wake_all(): drain ring, then overflow
//! ```

use std::task::Waker;

use crossbeam_queue::{ArrayQueue, SegQueue};

/// Default ring capacity for parked continuations.
pub const DEFAULT_BLOCKING_CAPACITY: usize = 16;

/// Multi-producer registry of wakers parked on one future.
pub struct BlockingRegistry {
    ring: ArrayQueue<Waker>,
    overflow: SegQueue<Waker>,
}

impl BlockingRegistry {
    /// Creates a registry whose ring holds `capacity` wakers (min 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: ArrayQueue::new(capacity.max(1)),
            overflow: SegQueue::new(),
        }
    }

    /// Parks a continuation. Never fails.
    pub fn push(&self, job: Waker) {
        if let Err(job) = self.ring.push(job) {
            self.overflow.push(job);
        }
    }

    /// Wakes and removes every parked continuation; returns how many were woken.
    pub fn wake_all(&self) -> usize {
        let mut woken = 0;
        while let Some(job) = self.ring.pop() {
            job.wake();
            woken += 1;
        }
        while let Some(job) = self.overflow.pop() {
            job.wake();
            woken += 1;
        }
        woken
    }

    /// Number of parked continuations (approximate under concurrency).
    pub fn len(&self) -> usize {
        self.ring.len() + self.overflow.len()
    }

    /// True if nothing is parked.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty() && self.overflow.is_empty()
    }

    /// Capacity of the bounded ring.
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

impl Default for BlockingRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCKING_CAPACITY)
    }
}

impl std::fmt::Debug for BlockingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingRegistry")
            .field("capacity", &self.ring.capacity())
            .field("parked", &self.len())
            .finish()
    }
}
