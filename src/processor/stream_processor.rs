//! # Pluggable business processor.

use super::context::StreamProcessorContext;
use super::log::{EventWriter, LoggedEvent};
use crate::error::ProcessingError;

/// Business logic driven by a stream processor controller.
///
/// All callbacks run on the controller's actor and must not block. Request an
/// output event with [`EventWriter::write`].
///
/// A failed `on_event` must leave the state untouched: the event is handed back
/// on the next tick.
///
/// # Example
/// ```
/// use streamvisor::{EventWriter, LoggedEvent, ProcessingError, StreamProcessor};
///
/// struct Echo;
///
/// impl StreamProcessor for Echo {
///     fn on_event(&mut self, event: &LoggedEvent, writer: &mut EventWriter) -> Result<(), ProcessingError> {
///         if event.source_position.is_none() {
///             writer.write(&event.payload);
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait StreamProcessor: Send + 'static {
    /// Called once while opening; an error aborts the open.
    fn on_open(&mut self, _ctx: &StreamProcessorContext) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// Handles one event; a retryable error hands the same event back on the next tick.
    fn on_event(
        &mut self,
        event: &LoggedEvent,
        writer: &mut EventWriter,
    ) -> Result<(), ProcessingError>;

    /// Called once while closing; errors are logged and the close completes anyway.
    fn on_close(&mut self) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// While `true` the controller stops polling; commands are still applied.
    fn is_suspended(&self) -> bool {
        false
    }

    /// Serializes the state reached after the last processed event.
    ///
    /// `None` (the default) means the processor keeps no snapshot-worthy state.
    fn snapshot(&self) -> Option<Vec<u8>> {
        None
    }

    /// Restores state from the latest snapshot before the first event is polled.
    ///
    /// Only called when opening without any processed position. An error aborts
    /// the open like a failing [`on_open`](Self::on_open).
    fn restore(&mut self, _state: &[u8]) -> Result<(), ProcessingError> {
        Ok(())
    }
}
