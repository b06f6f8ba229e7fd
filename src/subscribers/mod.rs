//! # Event subscribers for the streamvisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and
//! the built-in [`TraceWriter`] for runtime events broadcast through the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Runner / Controller ── publish(Event) ──► Bus ──► scheduler listener ──► SubscriberSet
//!                                                                         │
//!                                                              ┌──────────┼─────────┐
//!                                                              ▼          ▼         ▼
//!                                                          TraceWriter   Metrics   Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use streamvisor::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::ProcessingFailed {
//!             // increment failure counter
//!         }
//!     }
//! }
//! ```

mod subscribe;
mod subscriber_set;
mod trace;

pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
pub use trace::TraceWriter;

pub(crate) use subscriber_set::panic_message;
