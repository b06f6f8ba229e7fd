//! # Stream processor configuration.
//!
//! ## Sentinel values
//! - `max_event_retries = 0` → a failing event is retried forever
//! - `snapshot_period = 0` → snapshots are only taken on close

/// Per-processor settings.
///
/// ## Field semantics
/// - `command_queue_capacity`: ring size of the command queue (min 1; clamped).
///   Commands beyond it spill into an unbounded overflow, producers never block.
/// - `max_event_retries`: consecutive `on_event` failures tolerated for one event
///   before the processor moves to `Failed` (`0` = unbounded)
/// - `snapshot_period`: processed events between two snapshots (`0` = close only).
///   Without a snapshot storage in the context no snapshot is ever taken.
#[derive(Clone, Debug)]
pub struct ProcessorConfig {
    /// Ring capacity of the command queue.
    pub command_queue_capacity: usize,

    /// Consecutive failures of one event before giving up on it.
    pub max_event_retries: u32,

    /// Processed events between two snapshots.
    pub snapshot_period: u64,
}

impl ProcessorConfig {
    /// Returns the retry budget as an `Option` (`None` = unbounded).
    #[inline]
    pub fn retry_limit(&self) -> Option<u32> {
        if self.max_event_retries == 0 {
            None
        } else {
            Some(self.max_event_retries)
        }
    }

    /// Returns the snapshot period as an `Option` (`None` = only on close).
    #[inline]
    pub fn snapshot_interval(&self) -> Option<u64> {
        if self.snapshot_period == 0 {
            None
        } else {
            Some(self.snapshot_period)
        }
    }

    /// Returns a command queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn command_queue_capacity_clamped(&self) -> usize {
        self.command_queue_capacity.max(1)
    }
}

impl Default for ProcessorConfig {
    /// Default configuration:
    ///
    /// - `command_queue_capacity = 64`
    /// - `max_event_retries = 3`
    /// - `snapshot_period = 1000`
    fn default() -> Self {
        Self {
            command_queue_capacity: 64,
            max_event_retries: 3,
            snapshot_period: 1000,
        }
    }
}
