//! # Discrete future state with compare-and-swap transitions.
//!
//! ```text
//!              complete / complete_exceptionally (CAS winner only)
//! AwaitingResult ──► Completing ──► ResultAvailable | Failed
//!      ▲                                   │
//!      │ set_awaiting_result               │ close
//!      └───────────── Closed ◄─────────────┘
//! ```

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a reusable future.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FutureState {
    /// In service; no outcome yet.
    AwaitingResult = 0,
    /// Transient: a completer won the CAS and is storing the outcome.
    Completing = 1,
    /// Completed with a value.
    ResultAvailable = 2,
    /// Completed with a failure.
    Failed = 3,
    /// Reset by the owner; holds no outcome.
    Closed = 4,
}

impl FutureState {
    #[inline]
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => FutureState::AwaitingResult,
            1 => FutureState::Completing,
            2 => FutureState::ResultAvailable,
            3 => FutureState::Failed,
            4 => FutureState::Closed,
            _ => unreachable!("invalid future state {raw}"),
        }
    }

    /// True for the two terminal outcome states.
    #[inline]
    pub fn is_done(self) -> bool {
        matches!(self, FutureState::ResultAvailable | FutureState::Failed)
    }
}

/// Atomic cell holding a [`FutureState`].
#[derive(Debug)]
pub(crate) struct AtomicFutureState(AtomicU8);

impl AtomicFutureState {
    pub(crate) const fn new(state: FutureState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub(crate) fn load(&self) -> FutureState {
        FutureState::from_raw(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn store(&self, state: FutureState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Single CAS; on failure returns the state actually observed.
    #[inline]
    pub(crate) fn compare_exchange(
        &self,
        current: FutureState,
        new: FutureState,
    ) -> Result<FutureState, FutureState> {
        self.0
            .compare_exchange(current as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(FutureState::from_raw)
            .map_err(FutureState::from_raw)
    }
}
