//! Error types used by the streamvisor runtime, futures and processors.
//!
//! This module defines four error enums:
//!
//! - [`FutureError`]: contract violations and outcomes of a [`ReusableFuture`](crate::ReusableFuture).
//! - [`ProcessingError`]: errors raised by a pluggable [`StreamProcessor`](crate::StreamProcessor).
//! - [`RuntimeError`]: errors raised by the actor scheduler itself.
//! - [`DistributionError`]: illegal assignment states found while distributing partitions.
//!
//! All of them provide helper methods (`as_label`, `as_message`) for logging/metrics.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Shared, cloneable cause attached to a failed future.
pub type FailureCause = Arc<dyn StdError + Send + Sync + 'static>;

/// # Errors produced by future operations.
///
/// `IllegalState` marks a caller contract violation (double completion, blocking
/// on an actor thread, reusing a future that is not closed). It is never swallowed.
/// The remaining variants describe how a wait ended.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum FutureError {
    /// Caller contract violation.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),

    /// The future was completed exceptionally by its owner.
    #[error("{message}")]
    Failed {
        /// Failure message supplied by the completer.
        message: String,
        /// Optional underlying cause.
        cause: Option<FailureCause>,
    },

    /// A bounded wait expired before the future was done.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The wait duration that was exceeded.
        timeout: Duration,
    },

    /// The owner closed the future without supplying an outcome.
    #[error("future closed before completion")]
    Closed,
}

impl FutureError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use streamvisor::FutureError;
    ///
    /// let err = FutureError::IllegalState("already completed");
    /// assert_eq!(err.as_label(), "future_illegal_state");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            FutureError::IllegalState(_) => "future_illegal_state",
            FutureError::Failed { .. } => "future_failed",
            FutureError::Timeout { .. } => "future_timeout",
            FutureError::Closed => "future_closed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            FutureError::IllegalState(what) => format!("illegal state: {what}"),
            FutureError::Failed { message, cause } => match cause {
                Some(cause) => format!("failed: {message} (cause: {cause})"),
                None => format!("failed: {message}"),
            },
            FutureError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            FutureError::Closed => "closed before completion".to_string(),
        }
    }

    /// The cause attached by the completer, if any.
    pub fn cause(&self) -> Option<&FailureCause> {
        match self {
            FutureError::Failed { cause, .. } => cause.as_ref(),
            _ => None,
        }
    }

    /// True if this error reports a caller contract violation.
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, FutureError::IllegalState(_))
    }
}

/// # Errors produced by a stream processor.
///
/// Returned from the processor callbacks. During event handling a retryable error
/// keeps the controller on the same event; a fatal one moves the partition to `Failed`.
/// During open every error aborts the open attempt.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ProcessingError {
    /// Handling failed but may succeed if retried.
    #[error("processing failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Non-recoverable error (should not be retried).
    #[error("fatal processing error (no retry): {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },
}

impl ProcessingError {
    /// Shorthand for [`ProcessingError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        ProcessingError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for [`ProcessingError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        ProcessingError::Fatal {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcessingError::Fail { .. } => "processing_failed",
            ProcessingError::Fatal { .. } => "processing_fatal",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ProcessingError::Fail { error } => format!("error: {error}"),
            ProcessingError::Fatal { error } => format!("fatal: {error}"),
        }
    }

    /// Indicates whether the same event may be handed to the processor again.
    ///
    /// # Example
    /// ```
    /// use streamvisor::ProcessingError;
    ///
    /// assert!(ProcessingError::fail("busy").is_retryable());
    /// assert!(!ProcessingError::fatal("corrupt").is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProcessingError::Fail { .. })
    }
}

/// # Errors produced by the actor scheduler.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some actors were still running.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Role names of the actors that did not stop in time.
        stuck: Vec<String>,
    },

    /// The scheduler was shut down and accepts no more actors.
    #[error("scheduler is shut down")]
    SchedulerClosed,
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use streamvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::SchedulerClosed => "runtime_scheduler_closed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck actors={stuck:?}")
            }
            RuntimeError::SchedulerClosed => "scheduler closed".to_string(),
        }
    }
}

/// # Errors produced while distributing partitions.
///
/// Both variants are illegal states of the externally supplied assignment table
/// relative to the live cluster; distribution never guesses around them.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DistributionError {
    /// Members assigned to the partition are not part of the live member set.
    #[error("partition {partition}: assigned members {missing:?} are not in the cluster")]
    MissingMembers {
        /// Partition id.
        partition: u32,
        /// Assigned member ids absent from the cluster.
        missing: Vec<u32>,
    },

    /// Number of assigned members differs from the requested replication factor.
    #[error("partition {partition}: expected {expected} replicas, assignment has {actual}")]
    ReplicationFactorMismatch {
        /// Partition id.
        partition: u32,
        /// Requested replication factor.
        expected: usize,
        /// Members present in the assignment.
        actual: usize,
    },
}

impl DistributionError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DistributionError::MissingMembers { .. } => "distribution_missing_members",
            DistributionError::ReplicationFactorMismatch { .. } => {
                "distribution_replication_mismatch"
            }
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}
