//! # Jitter for idle back-off delays.
//!
//! Many partitions sharing one runtime tend to go idle together (for example right
//! after a burst on a shared log). Jitter desynchronizes their wake-ups.
//!
//! - [`JitterPolicy::None`]: exact delays
//! - [`JitterPolicy::Full`]: random delay in [0, delay]
//! - [`JitterPolicy::Equal`]: delay/2 + random[0, delay/2]
//! - [`JitterPolicy::Decorrelated`]: random[base, prev × 3], capped at max

use std::time::Duration;

use rand::Rng;

/// Randomization applied to a computed back-off delay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum JitterPolicy {
    /// No jitter: use the exact delay.
    #[default]
    None,
    /// Random delay in [0, delay].
    Full,
    /// delay/2 + random[0, delay/2].
    Equal,
    /// random[base, prev × 3], capped at max. Needs [`apply_decorrelated`](Self::apply_decorrelated).
    Decorrelated,
}

impl JitterPolicy {
    /// Applies jitter to the given delay.
    ///
    /// `Decorrelated` returns the input unchanged; it needs the extra context
    /// of [`apply_decorrelated`](Self::apply_decorrelated).
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterPolicy::None | JitterPolicy::Decorrelated => delay,
            JitterPolicy::Full => full_jitter(delay),
            JitterPolicy::Equal => equal_jitter(delay),
        }
    }

    /// Applies decorrelated jitter; other policies fall back to `apply(prev)`.
    pub fn apply_decorrelated(&self, base: Duration, prev: Duration, max: Duration) -> Duration {
        if !matches!(self, JitterPolicy::Decorrelated) {
            return self.apply(prev);
        }

        let base_ms = base.as_millis() as u64;
        let max_ms = max.as_millis() as u64;
        let upper = (prev.as_millis() as u64).saturating_mul(3).min(max_ms);
        let upper = upper.max(base_ms);

        if base_ms >= upper {
            return base;
        }
        Duration::from_millis(rand::rng().random_range(base_ms..=upper))
    }
}

fn full_jitter(delay: Duration) -> Duration {
    let ms = delay.as_millis() as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=ms))
}

fn equal_jitter(delay: Duration) -> Duration {
    let ms = delay.as_millis() as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    let half = ms / 2;
    let jitter = if half == 0 {
        0
    } else {
        rand::rng().random_range(0..=half)
    };
    Duration::from_millis(half + jitter)
}
