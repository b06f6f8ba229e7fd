//! Runtime core: actor scheduling and lifecycle.
//!
//! The public surface is the [`Actor`] contract and the [`ActorScheduler`] that
//! drives actors on a shared tokio runtime.
//!
//! Internal modules:
//! - [`actor`]: the actor contract, its context and the actor-thread marker;
//! - [`runner`]: the per-actor drive loop with idle back-off and panic isolation;
//! - [`registry`]: handles of running drive loops;
//! - [`scheduler`]: submission, shutdown with grace, event fan-out;
//! - [`shutdown`]: OS termination signals;
//! - [`builder`]: scheduler construction.

mod actor;
mod builder;
mod config;
mod registry;
mod runner;
mod scheduler;
mod shutdown;

pub use actor::{Actor, ActorContext, ActorExitReason, is_actor_thread};
pub(crate) use actor::run_as_actor;
pub use builder::SchedulerBuilder;
pub use config::SchedulerConfig;
pub use registry::ActorId;
pub use scheduler::ActorScheduler;
