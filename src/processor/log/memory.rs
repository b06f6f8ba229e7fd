//! # In-memory log.
//!
//! [`InMemoryLog`] is a reference implementation of the log interfaces: a shared,
//! append-only vector of events with positions starting at 1. Readers and writers
//! obtained from one log see each other's effects immediately, which makes
//! self-referential processing (source == target) observable.
//!
//! Failure injection:
//! - [`InMemoryLog::fail`] makes writers return `-1` and notifies listeners;
//! - [`InMemoryLog::recover`] restores writes and notifies listeners;
//! - [`InMemoryLog::set_write_blocked`] makes writers return `-1` silently.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::{EventRecord, FailureListener, LogReader, LogStream, LogWriter, LoggedEvent};

struct Inner {
    name: String,
    events: Mutex<Vec<LoggedEvent>>,
    listeners: Mutex<Vec<Arc<dyn FailureListener>>>,
    failed: AtomicBool,
    blocked: AtomicBool,
}

/// Shared in-memory log; clones refer to the same log.
#[derive(Clone)]
pub struct InMemoryLog {
    inner: Arc<Inner>,
}

impl InMemoryLog {
    /// Creates an empty log.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                events: Mutex::new(Vec::new()),
                listeners: Mutex::new(Vec::new()),
                failed: AtomicBool::new(false),
                blocked: AtomicBool::new(false),
            }),
        }
    }

    /// Appends an external event and returns its position.
    pub fn append(&self, payload: impl Into<Vec<u8>>) -> i64 {
        self.push(None, payload.into())
    }

    fn push(&self, source_position: Option<i64>, payload: Vec<u8>) -> i64 {
        let mut events = self.inner.events.lock();
        let position = events.last().map_or(1, |e| e.position + 1);
        events.push(LoggedEvent {
            position,
            source_position,
            payload,
        });
        position
    }

    /// A reader positioned at the start of the log.
    pub fn reader(&self) -> InMemoryLogReader {
        InMemoryLogReader {
            log: self.clone(),
            next: 0,
        }
    }

    /// A writer appending to this log.
    pub fn writer(&self) -> InMemoryLogWriter {
        InMemoryLogWriter { log: self.clone() }
    }

    /// Snapshot of all events.
    pub fn events(&self) -> Vec<LoggedEvent> {
        self.inner.events.lock().clone()
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.inner.events.lock().len()
    }

    /// True if no event was appended yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of the last event, if any.
    pub fn last_position(&self) -> Option<i64> {
        self.inner.events.lock().last().map(|e| e.position)
    }

    /// Marks the log failed and notifies listeners with the next write position.
    pub fn fail(&self) {
        self.inner.failed.store(true, Ordering::Release);
        let position = self.last_position().map_or(1, |p| p + 1);
        for listener in self.listeners() {
            listener.on_failed(position);
        }
    }

    /// Clears the failure and notifies listeners.
    pub fn recover(&self) {
        self.inner.failed.store(false, Ordering::Release);
        for listener in self.listeners() {
            listener.on_recovered();
        }
    }

    /// True between [`fail`](Self::fail) and [`recover`](Self::recover).
    pub fn is_failed(&self) -> bool {
        self.inner.failed.load(Ordering::Acquire)
    }

    /// Makes writers report "would block" without notifying listeners.
    pub fn set_write_blocked(&self, blocked: bool) {
        self.inner.blocked.store(blocked, Ordering::Release);
    }

    /// Number of registered failure listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    fn listeners(&self) -> Vec<Arc<dyn FailureListener>> {
        self.inner.listeners.lock().clone()
    }
}

impl std::fmt::Debug for InMemoryLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLog")
            .field("name", &self.inner.name)
            .field("len", &self.len())
            .field("failed", &self.is_failed())
            .finish()
    }
}

impl LogStream for InMemoryLog {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn register_failure_listener(&self, listener: Arc<dyn FailureListener>) {
        self.inner.listeners.lock().push(listener);
    }

    fn remove_failure_listener(&self, listener: &Arc<dyn FailureListener>) {
        self.inner
            .listeners
            .lock()
            .retain(|l| !Arc::ptr_eq(l, listener));
    }
}

/// Reader over an [`InMemoryLog`].
pub struct InMemoryLogReader {
    log: InMemoryLog,
    next: usize,
}

impl LogReader for InMemoryLogReader {
    fn has_next(&mut self) -> bool {
        self.next < self.log.inner.events.lock().len()
    }

    fn next(&mut self) -> Option<LoggedEvent> {
        let event = self.log.inner.events.lock().get(self.next).cloned()?;
        self.next += 1;
        Some(event)
    }

    fn seek(&mut self, position: i64) {
        self.next = self
            .log
            .inner
            .events
            .lock()
            .partition_point(|e| e.position < position);
    }

    fn seek_to_first(&mut self) {
        self.next = 0;
    }
}

/// Writer appending to an [`InMemoryLog`].
pub struct InMemoryLogWriter {
    log: InMemoryLog,
}

impl LogWriter for InMemoryLogWriter {
    fn try_write(&mut self, record: &EventRecord) -> i64 {
        if self.log.is_failed() || self.log.inner.blocked.load(Ordering::Acquire) {
            return -1;
        }
        self.log.push(record.source_position, record.payload.clone())
    }
}
