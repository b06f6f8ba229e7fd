//! # CompletedFuture: immutable, pre-completed outcome.
//!
//! For values known synchronously (constant success or failure). Exposes the same
//! read contract as [`ReusableFuture`](super::ReusableFuture); every mutation is a
//! contract violation.

use std::task::Waker;

use crate::error::{FailureCause, FutureError};

/// Future that is done from construction and never changes.
#[derive(Debug, Clone)]
pub struct CompletedFuture<V> {
    outcome: Result<V, FutureError>,
}

impl<V> CompletedFuture<V> {
    /// A future completed with `value`.
    pub fn completed(value: V) -> Self {
        Self { outcome: Ok(value) }
    }

    /// A future completed exceptionally.
    pub fn failed(message: impl Into<String>, cause: Option<FailureCause>) -> Self {
        Self {
            outcome: Err(FutureError::Failed {
                message: message.into(),
                cause,
            }),
        }
    }

    /// Always true.
    pub fn is_done(&self) -> bool {
        true
    }

    /// True if built with [`failed`](Self::failed).
    pub fn is_completed_exceptionally(&self) -> bool {
        self.outcome.is_err()
    }

    /// Never parks: the caller resumes immediately.
    pub fn block(&self, _job: Waker) -> bool {
        false
    }

    /// Rejected: the outcome is fixed.
    pub fn complete(&self, _value: V) -> Result<(), FutureError> {
        Err(FutureError::IllegalState("completed future is immutable"))
    }

    /// Rejected: the outcome is fixed.
    pub fn complete_exceptionally(
        &self,
        _message: impl Into<String>,
        _cause: Option<FailureCause>,
    ) -> Result<(), FutureError> {
        Err(FutureError::IllegalState("completed future is immutable"))
    }

    /// Never resets; returns `false`.
    pub fn close(&self) -> bool {
        false
    }
}

impl<V: Clone> CompletedFuture<V> {
    /// Returns the fixed outcome. Safe on any thread since it never waits.
    pub fn get(&self) -> Result<V, FutureError> {
        self.outcome.clone()
    }

    /// [`get`](Self::get) with the typed error converted into an opaque one.
    pub fn join(&self) -> anyhow::Result<V> {
        self.get().map_err(anyhow::Error::from)
    }
}
