//! # Runtime events emitted by the scheduler, actors and stream processors.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Actor events**: submission, stop, death of scheduled actors
//! - **Shutdown events**: scheduler shutdown progress
//! - **Subscriber events**: fan-out faults
//! - **Processor events**: stream processor lifecycle and failures
//!
//! The [`Event`] struct carries additional metadata such as timestamps, actor name,
//! log positions, attempts and reasons.
//!
//! Events are published on lifecycle edges only; the per-event hot path of a
//! stream processor never allocates an [`Event`].
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use streamvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ProcessingFailed)
//!     .with_actor("partition-1")
//!     .with_position(42)
//!     .with_attempt(2)
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::ProcessingFailed);
//! assert_eq!(ev.actor.as_deref(), Some("partition-1"));
//! assert_eq!(ev.position, Some(42));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `actor`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `actor`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Shutdown events ===
    /// Scheduler shutdown requested.
    ShutdownRequested,

    /// All actors stopped within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some actors did not stop in time.
    ///
    /// Sets:
    /// - `reason`: stuck actor names
    GraceExceeded,

    // === Actor events ===
    /// Actor was submitted to the scheduler and its drive loop spawned.
    ///
    /// Sets:
    /// - `actor`: role name
    ActorSubmitted,

    /// Actor left the scheduler (deregistered itself or was cancelled).
    ///
    /// Sets:
    /// - `actor`: role name
    /// - `reason`: exit reason label
    ActorStopped,

    /// Actor panicked inside `do_work` and was removed.
    ///
    /// Sets:
    /// - `actor`: role name
    /// - `reason`: panic info/message
    ActorDead,

    // === Stream processor events ===
    /// Processor opened and handed over to polling.
    ///
    /// Sets:
    /// - `actor`: processor name
    /// - `position`: resume position after recovery
    ProcessorOpened,

    /// `on_open` failed; the open future was failed and the processor torn down.
    ///
    /// Sets:
    /// - `actor`: processor name
    /// - `reason`: failure message
    ProcessorOpenFailed,

    /// Processor reached `Closed` after `Closing`.
    ///
    /// Sets:
    /// - `actor`: processor name
    /// - `reason`: `on_close` failure message, if any
    ProcessorClosed,

    /// `on_event` failed; the same event will be retried.
    ///
    /// Sets:
    /// - `actor`: processor name
    /// - `position`: event position
    /// - `attempt`: consecutive failures for this event
    /// - `reason`: failure message
    ProcessingFailed,

    /// Processing gave up on an event and the processor moved to `Failed`.
    ///
    /// Sets:
    /// - `actor`: processor name
    /// - `position`: event position
    /// - `attempt`: failures observed
    /// - `reason`: last failure message
    ProcessorFailed,

    /// Target log reported a failure; the processor moved to `Failed`.
    ///
    /// Sets:
    /// - `actor`: processor name
    /// - `position`: failed log position
    LogFailed,

    /// Target log recovered; the processor moved to `Recovering`.
    ///
    /// Sets:
    /// - `actor`: processor name
    ProcessorRecovered,

    /// Processor state was stored as a snapshot.
    ///
    /// Sets:
    /// - `actor`: processor name
    /// - `position`: last processed position covered by the snapshot
    SnapshotWritten,

    /// Writing or restoring a snapshot failed; processing continues without it.
    ///
    /// Sets:
    /// - `actor`: processor name
    /// - `position`: position of the snapshot
    /// - `reason`: failure message
    SnapshotFailed,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Role name of the actor (or subscriber name), if applicable.
    pub actor: Option<Arc<str>>,
    /// Log position, if applicable.
    pub position: Option<i64>,
    /// Attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Duration attached to the event in milliseconds (compact).
    pub elapsed_ms: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            actor: None,
            position: None,
            attempt: None,
            elapsed_ms: None,
            reason: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an actor (or subscriber) name.
    #[inline]
    pub fn with_actor(mut self, actor: impl Into<Arc<str>>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Attaches a log position.
    #[inline]
    pub fn with_position(mut self, position: i64) -> Self {
        self.position = Some(position);
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a duration (stored as milliseconds).
    #[inline]
    pub fn with_elapsed(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.elapsed_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_actor(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_actor(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}
