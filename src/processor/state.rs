//! # Controller states.
//!
//! ```text
//! Closed ──Open──► Opening ──on_open ok──► Recovering ──► PollStream
//!                     └─on_open err──► Closing ──► Closed
//!
//! PollStream ──event read──► InvokeProcessor ──write requested──► WriteEvent
//!     ▲                            │ no write                          │ written
//!     └────────────────────────────┴───────────────────────────────────┘
//!
//! PollStream | WriteEvent ──LogFailed──► Failed ──LogRecovered──► Recovering
//! InvokeProcessor ──retries exhausted / fatal──► Failed
//! PollStream | WriteEvent | Failed ──Close──► Closing ──► Closed
//! ```
//!
//! Only the controller's own `do_work` stores the state; other threads load it.

use std::sync::atomic::{AtomicU8, Ordering};

/// State of a stream processor controller.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerState {
    /// Not running; waits for an `Open` command.
    Closed = 0,
    /// Registering the failure listener and calling `on_open`.
    Opening = 1,
    /// Positioning the reader after the last fully processed event.
    Recovering = 2,
    /// Reading the next event, if any.
    PollStream = 3,
    /// Handing the current event to the processor.
    InvokeProcessor = 4,
    /// Writing the event the processor produced.
    WriteEvent = 5,
    /// Target log unavailable or processing gave up; waits for recovery or close.
    Failed = 6,
    /// Removing the failure listener and calling `on_close`.
    Closing = 7,
}

impl ControllerState {
    #[inline]
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => ControllerState::Closed,
            1 => ControllerState::Opening,
            2 => ControllerState::Recovering,
            3 => ControllerState::PollStream,
            4 => ControllerState::InvokeProcessor,
            5 => ControllerState::WriteEvent,
            6 => ControllerState::Failed,
            7 => ControllerState::Closing,
            _ => unreachable!("invalid controller state {raw}"),
        }
    }

    /// Whether queued commands may be consumed in this state.
    ///
    /// States in the middle of an atomic unit of work refuse them, so a close or
    /// a failure is never observed halfway through.
    #[inline]
    pub fn accepts_commands(self) -> bool {
        match self {
            ControllerState::Closed
            | ControllerState::PollStream
            | ControllerState::WriteEvent
            | ControllerState::Failed => true,
            ControllerState::Opening
            | ControllerState::Recovering
            | ControllerState::InvokeProcessor
            | ControllerState::Closing => false,
        }
    }

    /// Short stable label for logs/events.
    pub fn as_label(self) -> &'static str {
        match self {
            ControllerState::Closed => "closed",
            ControllerState::Opening => "opening",
            ControllerState::Recovering => "recovering",
            ControllerState::PollStream => "poll_stream",
            ControllerState::InvokeProcessor => "invoke_processor",
            ControllerState::WriteEvent => "write_event",
            ControllerState::Failed => "failed",
            ControllerState::Closing => "closing",
        }
    }
}

/// Atomic cell holding a [`ControllerState`].
#[derive(Debug)]
pub(crate) struct AtomicControllerState(AtomicU8);

impl AtomicControllerState {
    pub(crate) const fn new(state: ControllerState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub(crate) fn load(&self) -> ControllerState {
        ControllerState::from_raw(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn store(&self, state: ControllerState) {
        self.0.store(state as u8, Ordering::Release);
    }
}
