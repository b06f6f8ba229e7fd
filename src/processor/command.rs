//! # Commands and the command queue of a stream processor.
//!
//! Producers (callers of the service, the failure listener) push [`Command`]s from
//! any thread; the controller drains them from its own `do_work`, and only while
//! its state accepts commands. A command that cannot be consumed yet stays queued.
//!
//! ```text
//! push(cmd) ──► overflow in use? ──yes──► overflow (SegQueue)
//!                   │ no
//!                   └──► ring (ArrayQueue) ──full──► overflow
//!
//! pop() ──► ring first, then overflow
//! ```
//!
//! Once the overflow holds anything, new commands go there until the consumer has
//! emptied it, so commands from one producer are popped in the order pushed.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_queue::{ArrayQueue, SegQueue};

use crate::future::ReusableFuture;

/// Deferred operation for the controller.
pub enum Command {
    /// Open the processor; the future resolves once polling starts.
    Open(Arc<ReusableFuture<()>>),
    /// Close the processor; the future resolves once `Closed` is reached.
    Close(Arc<ReusableFuture<()>>),
    /// The target log failed at the given position.
    LogFailed(i64),
    /// The target log is available again.
    LogRecovered,
}

impl Command {
    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Command::Open(_) => "open",
            Command::Close(_) => "close",
            Command::LogFailed(_) => "log_failed",
            Command::LogRecovered => "log_recovered",
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::LogFailed(position) => write!(f, "LogFailed({position})"),
            other => f.write_str(other.as_label()),
        }
    }
}

/// Multi-producer, single-consumer queue that never blocks producers.
pub struct CommandQueue<C> {
    ring: ArrayQueue<C>,
    overflow: SegQueue<C>,
    spilled: AtomicUsize,
}

impl<C> CommandQueue<C> {
    /// Creates a queue whose ring holds `capacity` commands (min 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: ArrayQueue::new(capacity.max(1)),
            overflow: SegQueue::new(),
            spilled: AtomicUsize::new(0),
        }
    }

    /// Enqueues a command. Never fails.
    pub fn push(&self, cmd: C) {
        if self.spilled.load(Ordering::Acquire) == 0 {
            match self.ring.push(cmd) {
                Ok(()) => return,
                Err(cmd) => self.spill(cmd),
            }
        } else {
            self.spill(cmd);
        }
    }

    fn spill(&self, cmd: C) {
        self.spilled.fetch_add(1, Ordering::AcqRel);
        self.overflow.push(cmd);
    }

    /// Dequeues the oldest command.
    pub fn pop(&self) -> Option<C> {
        if let Some(cmd) = self.ring.pop() {
            return Some(cmd);
        }
        let cmd = self.overflow.pop()?;
        self.spilled.fetch_sub(1, Ordering::AcqRel);
        Some(cmd)
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.ring.len() + self.overflow.len()
    }

    /// True if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty() && self.overflow.is_empty()
    }

    /// Ring capacity.
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_overflow_keeps_fifo() {
        let q = CommandQueue::new(2);
        for i in 0..5 {
            q.push(i);
        }
        assert_eq!(q.len(), 5);
        assert_eq!(q.pop(), Some(0));

        // ring has room again, but the overflow is still in use
        q.push(5);
        let drained: Vec<_> = std::iter::from_fn(|| q.pop()).collect();
        assert_eq!(drained, vec![1, 2, 3, 4, 5]);
        assert!(q.is_empty());

        q.push(6);
        assert_eq!(q.pop(), Some(6));
    }

    #[test]
    fn test_concurrent_producers_lose_nothing() {
        let q = Arc::new(CommandQueue::new(4));
        let producers: Vec<_> = (0..4u32)
            .map(|p| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    for i in 0..100u32 {
                        q.push((p, i));
                    }
                })
            })
            .collect();
        for h in producers {
            h.join().unwrap();
        }

        let mut last = [None::<u32>; 4];
        let mut count = 0;
        while let Some((p, i)) = q.pop() {
            let prev = last[p as usize].replace(i);
            assert!(prev.is_none_or(|prev| prev < i), "producer {p} out of order");
            count += 1;
        }
        assert_eq!(count, 400);
    }
}
