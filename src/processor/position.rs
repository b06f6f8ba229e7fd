//! # Positions reached by a stream processor.
//!
//! Shared between the controller (single writer) and any number of readers.
//! `-1` means "nothing yet".

use std::sync::atomic::{AtomicI64, Ordering};

const NONE: i64 = -1;

/// Last positions read, processed and written by one processor.
///
/// - `last_read`: advanced by polling, before the event is dispatched
/// - `last_processed`: the event was fully handled and its write (if any) succeeded
/// - `last_written`: position of the last successfully written output
#[derive(Debug)]
pub struct PositionTracker {
    last_read: AtomicI64,
    last_processed: AtomicI64,
    last_written: AtomicI64,
}

impl PositionTracker {
    /// Creates a tracker with nothing read, processed or written.
    pub const fn new() -> Self {
        Self {
            last_read: AtomicI64::new(NONE),
            last_processed: AtomicI64::new(NONE),
            last_written: AtomicI64::new(NONE),
        }
    }

    /// Last position read from the source log.
    pub fn last_read(&self) -> Option<i64> {
        Self::get(&self.last_read)
    }

    /// Last position fully processed.
    pub fn last_processed(&self) -> Option<i64> {
        Self::get(&self.last_processed)
    }

    /// Last position written to the target log.
    pub fn last_written(&self) -> Option<i64> {
        Self::get(&self.last_written)
    }

    pub(crate) fn mark_read(&self, position: i64) {
        self.last_read.store(position, Ordering::Release);
    }

    pub(crate) fn mark_processed(&self, position: i64) {
        self.last_processed.store(position, Ordering::Release);
    }

    pub(crate) fn mark_written(&self, position: i64) {
        self.last_written.store(position, Ordering::Release);
    }

    fn get(cell: &AtomicI64) -> Option<i64> {
        match cell.load(Ordering::Acquire) {
            NONE => None,
            p => Some(p),
        }
    }
}

impl Default for PositionTracker {
    fn default() -> Self {
        Self::new()
    }
}
