//! # Scheduler configuration.
//!
//! [`SchedulerConfig`] centralizes settings for the [`ActorScheduler`](crate::ActorScheduler).
//!
//! ## Sentinel values
//! - `grace = 0s` → shutdown cancels actors and does not wait for them

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Global configuration for the actor scheduler.
///
/// ## Field semantics
/// - `grace`: maximum wait for actors to stop on shutdown (`0s` = no wait)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped)
/// - `idle`: back-off applied by a runner while its actor reports no work
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Maximum time to wait for actors during [`shutdown`](crate::ActorScheduler::shutdown).
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Idle back-off between `do_work` rounds that reported zero work.
    ///
    /// A wake-up (queued command, completed future) cuts the wait short.
    pub idle: BackoffPolicy,
}

impl SchedulerConfig {
    /// Returns the shutdown grace as an `Option` (`None` = don't wait).
    #[inline]
    pub fn shutdown_grace(&self) -> Option<Duration> {
        if self.grace == Duration::ZERO {
            None
        } else {
            Some(self.grace)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for SchedulerConfig {
    /// Default configuration:
    ///
    /// - `grace = 10s`
    /// - `bus_capacity = 1024`
    /// - `idle = BackoffPolicy::default()` (1ms doubling up to 50ms)
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(10),
            bus_capacity: 1024,
            idle: BackoffPolicy::default(),
        }
    }
}
