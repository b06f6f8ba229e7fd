//! # TraceWriter: runtime events as `tracing` records
//!
//! Maps each [`Event`] onto a structured `tracing` record. Faults go to `warn`/`error`,
//! lifecycle edges to `info`, everything else to `debug`. Install any
//! `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see them.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO streamvisor: processor opened actor="partition-1" position=Some(1)
//! WARN streamvisor: processing failed actor="partition-1" position=Some(7) attempt=Some(1) reason="busy"
//! ERROR streamvisor: processor failed actor="partition-1" position=Some(7) attempt=Some(3) reason="busy"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber backed by `tracing`.
#[derive(Default)]
pub struct TraceWriter;

impl TraceWriter {
    /// Construct a new [`TraceWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for TraceWriter {
    async fn on_event(&self, e: &Event) {
        let actor = e.actor.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::SubscriberPanicked => {
                tracing::error!(target: "streamvisor", subscriber = actor, reason, "subscriber panicked");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(target: "streamvisor", subscriber = actor, reason, "subscriber overflow");
            }
            EventKind::ShutdownRequested => {
                tracing::info!(target: "streamvisor", "shutdown requested");
            }
            EventKind::AllStoppedWithin => {
                tracing::info!(target: "streamvisor", elapsed_ms = ?e.elapsed_ms, "all actors stopped within grace");
            }
            EventKind::GraceExceeded => {
                tracing::error!(target: "streamvisor", stuck = reason, "grace exceeded");
            }
            EventKind::ActorSubmitted => {
                tracing::debug!(target: "streamvisor", actor, "actor submitted");
            }
            EventKind::ActorStopped => {
                tracing::debug!(target: "streamvisor", actor, reason, "actor stopped");
            }
            EventKind::ActorDead => {
                tracing::error!(target: "streamvisor", actor, reason, "actor died");
            }
            EventKind::ProcessorOpened => {
                tracing::info!(target: "streamvisor", actor, position = ?e.position, "processor opened");
            }
            EventKind::ProcessorOpenFailed => {
                tracing::error!(target: "streamvisor", actor, reason, "processor open failed");
            }
            EventKind::ProcessorClosed => {
                tracing::info!(target: "streamvisor", actor, reason, "processor closed");
            }
            EventKind::ProcessingFailed => {
                tracing::warn!(
                    target: "streamvisor",
                    actor,
                    position = ?e.position,
                    attempt = ?e.attempt,
                    reason,
                    "processing failed"
                );
            }
            EventKind::ProcessorFailed => {
                tracing::error!(
                    target: "streamvisor",
                    actor,
                    position = ?e.position,
                    attempt = ?e.attempt,
                    reason,
                    "processor failed"
                );
            }
            EventKind::LogFailed => {
                tracing::warn!(target: "streamvisor", actor, position = ?e.position, "target log failed");
            }
            EventKind::ProcessorRecovered => {
                tracing::info!(target: "streamvisor", actor, "processor recovering");
            }
            EventKind::SnapshotWritten => {
                tracing::debug!(target: "streamvisor", actor, position = ?e.position, "snapshot written");
            }
            EventKind::SnapshotFailed => {
                tracing::warn!(target: "streamvisor", actor, position = ?e.position, reason, "snapshot failed");
            }
        }
    }

    fn name(&self) -> &'static str {
        "TraceWriter"
    }
}
