//! # Idle back-off for actor drive loops.
//!
//! When an actor's `do_work` reports zero work, its runner parks until either a
//! wake-up arrives (command queued, future completed) or the delay computed here
//! elapses. Consecutive idle rounds grow the delay geometrically, so an idle
//! partition costs almost nothing while a busy one never sleeps.
//!
//! The delay for idle round `n` is `first × factor^n`, clamped to `max`, then jitter
//! is applied. The base delay is derived purely from the round number; jitter output
//! never feeds back into later rounds.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use streamvisor::{BackoffPolicy, JitterPolicy};
//!
//! let idle = BackoffPolicy {
//!     first: Duration::from_millis(1),
//!     max: Duration::from_millis(50),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(idle.next(0), Duration::from_millis(1));
//! assert_eq!(idle.next(3), Duration::from_millis(8));
//! assert_eq!(idle.next(10), Duration::from_millis(50));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Geometric back-off between idle rounds.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay after the first idle round.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Jitter policy, spreads wake-ups of many idle partitions.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 1ms`, `factor = 2.0`, `max = 50ms`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(1),
            max: Duration::from_millis(50),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay for the given idle round (0-indexed).
    pub fn next(&self, round: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = round.min(i32::MAX as u32) as i32;
        let unclamped_secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base =
            if !unclamped_secs.is_finite() || unclamped_secs < 0.0 || unclamped_secs > max_secs {
                self.max
            } else {
                Duration::from_secs_f64(unclamped_secs)
            };

        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            _ => self.jitter.apply(base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(jitter: JitterPolicy) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(10),
            max: Duration::from_millis(500),
            factor: 2.0,
            jitter,
        }
    }

    #[test]
    fn test_geometric_growth_until_cap() {
        let p = policy(JitterPolicy::None);
        assert_eq!(p.next(0), Duration::from_millis(10));
        assert_eq!(p.next(1), Duration::from_millis(20));
        assert_eq!(p.next(4), Duration::from_millis(160));
        assert_eq!(p.next(6), Duration::from_millis(500));
        assert_eq!(p.next(u32::MAX), Duration::from_millis(500));
    }

    #[test]
    fn test_first_exceeding_max_is_clamped() {
        let p = BackoffPolicy {
            first: Duration::from_secs(1),
            max: Duration::from_millis(5),
            factor: 1.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(p.next(0), Duration::from_millis(5));
    }

    #[test]
    fn test_equal_jitter_stays_within_half_and_base() {
        let p = policy(JitterPolicy::Equal);
        for round in 0..10 {
            let base = policy(JitterPolicy::None).next(round);
            let d = p.next(round);
            assert!(d <= base, "round {round}: {d:?} > {base:?}");
            assert!(d >= base / 2 - Duration::from_millis(1), "round {round}: {d:?}");
        }
    }

    #[test]
    fn test_decorrelated_never_below_first() {
        let p = policy(JitterPolicy::Decorrelated);
        for _ in 0..50 {
            let d = p.next(5);
            assert!(d >= Duration::from_millis(10));
            assert!(d <= Duration::from_millis(500));
        }
    }
}
