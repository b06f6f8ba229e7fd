//! Reusable futures and the registry of continuations parked on them.
//!
//! ## Contents
//! - [`ReusableFuture`] CAS-guarded completion primitive, resettable via `close()`
//! - [`CompletedFuture`] immutable pre-completed variant
//! - [`ActorFuture`] read/write contract shared by both
//! - [`BlockingRegistry`] bounded ring + unbounded overflow of parked wakers
//! - [`FutureState`] the discrete lifecycle state

mod completed;
mod registry;
mod reusable;
mod state;

use std::task::Waker;
use std::time::Duration;

pub use completed::CompletedFuture;
pub use registry::{BlockingRegistry, DEFAULT_BLOCKING_CAPACITY};
pub use reusable::{ReusableFuture, Wait};
pub use state::FutureState;

use crate::error::{FailureCause, FutureError};

/// Common contract of completion objects handed out by actors.
///
/// Lets callers accept either a [`ReusableFuture`] or a [`CompletedFuture`].
pub trait ActorFuture<V: Clone>: Send + Sync {
    /// True iff an outcome is available.
    fn is_done(&self) -> bool;

    /// True iff completed with a failure.
    fn is_completed_exceptionally(&self) -> bool;

    /// Parks `job`; `false` means "already done, resume now".
    fn block(&self, job: Waker) -> bool;

    /// Waits for the outcome (non-actor callers only).
    fn get(&self) -> Result<V, FutureError>;

    /// Waits at most `timeout` for the outcome (non-actor callers only).
    fn get_timeout(&self, timeout: Duration) -> Result<V, FutureError>;

    /// Completes with a value.
    fn complete(&self, value: V) -> Result<(), FutureError>;

    /// Completes with a failure.
    fn complete_exceptionally(
        &self,
        message: String,
        cause: Option<FailureCause>,
    ) -> Result<(), FutureError>;

    /// Resets the future; `false` if nothing was reset.
    fn close(&self) -> bool;

    /// [`get`](Self::get) converted into an opaque error.
    fn join(&self) -> anyhow::Result<V> {
        self.get().map_err(anyhow::Error::from)
    }
}

impl<V: Clone + Send> ActorFuture<V> for ReusableFuture<V> {
    fn is_done(&self) -> bool {
        ReusableFuture::is_done(self)
    }

    fn is_completed_exceptionally(&self) -> bool {
        ReusableFuture::is_completed_exceptionally(self)
    }

    fn block(&self, job: Waker) -> bool {
        ReusableFuture::block(self, job)
    }

    fn get(&self) -> Result<V, FutureError> {
        ReusableFuture::get(self)
    }

    fn get_timeout(&self, timeout: Duration) -> Result<V, FutureError> {
        ReusableFuture::get_timeout(self, timeout)
    }

    fn complete(&self, value: V) -> Result<(), FutureError> {
        ReusableFuture::complete(self, value)
    }

    fn complete_exceptionally(
        &self,
        message: String,
        cause: Option<FailureCause>,
    ) -> Result<(), FutureError> {
        ReusableFuture::complete_exceptionally(self, message, cause)
    }

    fn close(&self) -> bool {
        ReusableFuture::close(self)
    }
}

impl<V: Clone + Send + Sync> ActorFuture<V> for CompletedFuture<V> {
    fn is_done(&self) -> bool {
        CompletedFuture::is_done(self)
    }

    fn is_completed_exceptionally(&self) -> bool {
        CompletedFuture::is_completed_exceptionally(self)
    }

    fn block(&self, job: Waker) -> bool {
        CompletedFuture::block(self, job)
    }

    fn get(&self) -> Result<V, FutureError> {
        CompletedFuture::get(self)
    }

    fn get_timeout(&self, _timeout: Duration) -> Result<V, FutureError> {
        CompletedFuture::get(self)
    }

    fn complete(&self, value: V) -> Result<(), FutureError> {
        CompletedFuture::complete(self, value)
    }

    fn complete_exceptionally(
        &self,
        message: String,
        cause: Option<FailureCause>,
    ) -> Result<(), FutureError> {
        CompletedFuture::complete_exceptionally(self, message, cause)
    }

    fn close(&self) -> bool {
        CompletedFuture::close(self)
    }
}
