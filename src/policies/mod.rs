//! Idle back-off policies for actor drive loops.
//!
//! ## Contents
//! - [`BackoffPolicy`] how idle delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to desynchronize idle actors
//!
//! ## Quick wiring
//! ```text
//! SchedulerConfig { idle: BackoffPolicy, .. }
//!      └─► core::runner uses idle.next(round) while do_work() returns 0
//! ```

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
