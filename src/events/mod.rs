//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the scheduler, actor runners
//! and stream processor controllers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `ActorScheduler`, the actor runner, `StreamProcessorController`,
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the scheduler's subscriber listener (fans out to `SubscriberSet`).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
