//! # Log interfaces consumed by the stream processor.
//!
//! The controller owns exactly one [`LogReader`] and one [`LogWriter`]. The target
//! [`LogStream`] reports its availability through a registered [`FailureListener`].
//!
//! Positions are monotonically increasing `i64` values; a negative result from
//! [`LogWriter::try_write`] means the write would block and must be retried.

pub mod memory;

use std::sync::Arc;

/// An event read from a log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggedEvent {
    /// Position of this event in its log.
    pub position: i64,
    /// Position of the event that caused this one, if it was written by a processor.
    pub source_position: Option<i64>,
    /// Opaque encoded payload.
    pub payload: Vec<u8>,
}

/// An event to append to a log.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventRecord {
    /// Position of the event being processed when this record was produced.
    pub source_position: Option<i64>,
    /// Opaque encoded payload.
    pub payload: Vec<u8>,
}

/// Output buffer handed to [`StreamProcessor::on_event`](crate::StreamProcessor::on_event).
///
/// Holds at most one pending record per processed event. The payload buffer is
/// reused between events.
#[derive(Debug, Default)]
pub struct EventWriter {
    record: EventRecord,
    requested: bool,
}

impl EventWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a write of `payload`, replacing any earlier request for this event.
    pub fn write(&mut self, payload: &[u8]) {
        self.record.payload.clear();
        self.record.payload.extend_from_slice(payload);
        self.requested = true;
    }

    /// True if a write was requested for the current event.
    pub fn is_requested(&self) -> bool {
        self.requested
    }

    /// Position of the event currently being processed.
    pub fn source_position(&self) -> Option<i64> {
        self.record.source_position
    }

    /// The pending record, if a write was requested.
    pub fn record(&self) -> Option<&EventRecord> {
        self.requested.then_some(&self.record)
    }

    /// Drops the pending request.
    pub fn reset(&mut self) {
        self.requested = false;
        self.record.payload.clear();
    }

    pub(crate) fn begin(&mut self, source_position: i64) {
        self.reset();
        self.record.source_position = Some(source_position);
    }
}

/// Sequential reader over a log.
pub trait LogReader: Send + 'static {
    /// True if [`next`](Self::next) would return an event.
    fn has_next(&mut self) -> bool;

    /// Reads the next event.
    fn next(&mut self) -> Option<LoggedEvent>;

    /// Positions the reader at the first event whose position is `>= position`.
    fn seek(&mut self, position: i64);

    /// Positions the reader at the start of the log.
    fn seek_to_first(&mut self);
}

/// Non-blocking appender to a log.
pub trait LogWriter: Send + 'static {
    /// Appends `record`; returns its position, or a negative value if the write would block.
    fn try_write(&mut self, record: &EventRecord) -> i64;
}

/// Callbacks through which a log reports its availability.
pub trait FailureListener: Send + Sync + 'static {
    /// The log failed; writes at or after `position` did not happen.
    fn on_failed(&self, position: i64);

    /// The log is available again.
    fn on_recovered(&self);
}

/// A named log that accepts failure listeners.
pub trait LogStream: Send + Sync + 'static {
    /// Log name for diagnostics.
    fn name(&self) -> &str;

    /// Registers a listener; it is notified until removed.
    fn register_failure_listener(&self, listener: Arc<dyn FailureListener>);

    /// Removes a listener registered earlier (matched by identity).
    fn remove_failure_listener(&self, listener: &Arc<dyn FailureListener>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_writer_reuses_buffer() {
        let mut w = EventWriter::new();
        assert!(w.record().is_none());

        w.begin(7);
        w.write(b"first");
        w.write(b"second");
        let rec = w.record().unwrap();
        assert_eq!(rec.payload, b"second");
        assert_eq!(rec.source_position, Some(7));

        w.begin(8);
        assert!(!w.is_requested());
        assert_eq!(w.source_position(), Some(8));
    }
}
