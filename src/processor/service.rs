//! # Public handle of a stream processor.
//!
//! [`StreamProcessorService`] owns the controller while it is parked and submits it
//! to the [`ActorScheduler`] whenever a command arrives. The controller deregisters
//! itself once it is `Closed` with nothing queued and is handed back to the parking
//! slot by the scheduler.
//!
//! ```text
//! open_async / close_async
//!   └─► queue.push(cmd) + wake ──► slot holds the controller? ──yes──► submit_with(controller, park)
//!
//! park(controller, reason)            (runs when the actor's loop ended)
//!   ├─ abnormal stop → teardown: settle pending futures, state Closed
//!   ├─ deregistered but commands arrived meanwhile → submit again
//!   └─ otherwise → back into the slot
//! ```
//!
//! A command is never stranded: either the producer finds the controller in the slot
//! and submits it, or `park` sees the queued command before returning it there.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::command::Command;
use super::config::ProcessorConfig;
use super::context::StreamProcessorContext;
use super::controller::{Shared, StreamProcessorController};
use super::log::{LogReader, LogWriter};
use super::position::PositionTracker;
use super::stream_processor::StreamProcessor;
use super::state::ControllerState;
use crate::core::{ActorExitReason, ActorScheduler};
use crate::future::ReusableFuture;

/// Open/close handle of one stream processor.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use streamvisor::{
///     ActorScheduler, EventWriter, InMemoryLog, LoggedEvent, ProcessingError, ProcessorConfig,
///     SchedulerConfig, StreamProcessor, StreamProcessorContext, StreamProcessorService,
/// };
///
/// struct Count(u64);
///
/// impl StreamProcessor for Count {
///     fn on_event(&mut self, _e: &LoggedEvent, _w: &mut EventWriter) -> Result<(), ProcessingError> {
///         self.0 += 1;
///         Ok(())
///     }
/// }
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let scheduler = ActorScheduler::new(SchedulerConfig::default());
///     let log = InMemoryLog::new("partition-1");
///     log.append("created");
///
///     let ctx = StreamProcessorContext::builder("counter", Arc::new(log.clone()), Arc::new(log.clone())).build();
///     let service = StreamProcessorService::new(
///         &scheduler,
///         ProcessorConfig::default(),
///         ctx,
///         Count(0),
///         log.reader(),
///         log.writer(),
///     );
///
///     service.open_async().wait().await.unwrap();
///     service.close_async().wait().await.unwrap();
///     assert_eq!(service.position(), Some(1));
///     scheduler.shutdown().await.unwrap();
/// }
/// ```
pub struct StreamProcessorService {
    context: Arc<StreamProcessorContext>,
    shared: Arc<Shared>,
    parking: Parking,
}

impl StreamProcessorService {
    /// Creates a closed processor; nothing runs until [`open_async`](Self::open_async).
    pub fn new<P, R, W>(
        scheduler: &Arc<ActorScheduler>,
        cfg: ProcessorConfig,
        context: StreamProcessorContext,
        processor: P,
        reader: R,
        writer: W,
    ) -> Self
    where
        P: StreamProcessor,
        R: LogReader,
        W: LogWriter,
    {
        let context = Arc::new(context);
        let shared = Arc::new(Shared::new(cfg.command_queue_capacity_clamped()));
        let controller = StreamProcessorController::new(
            cfg,
            Arc::clone(&context),
            Arc::clone(&shared),
            scheduler.bus().clone(),
            Box::new(processor),
            Box::new(reader),
            Box::new(writer),
        );
        let parking = Parking {
            scheduler: Arc::downgrade(scheduler),
            shared: Arc::clone(&shared),
            slot: Arc::new(Mutex::new(Some(controller))),
        };
        Self {
            context,
            shared,
            parking,
        }
    }

    /// Opens the processor.
    ///
    /// The future resolves once recovery handed over to polling, or fails if
    /// `on_open` failed or the processor is not closed.
    pub fn open_async(&self) -> Arc<ReusableFuture<()>> {
        self.send(Command::Open)
    }

    /// Closes the processor.
    ///
    /// The future resolves once `Closed` is reached, whatever `on_close` returned.
    pub fn close_async(&self) -> Arc<ReusableFuture<()>> {
        self.send(Command::Close)
    }

    fn send(&self, cmd: fn(Arc<ReusableFuture<()>>) -> Command) -> Arc<ReusableFuture<()>> {
        let fut = Arc::new(ReusableFuture::new());
        self.shared.send(cmd(Arc::clone(&fut)));
        self.parking.wake_up();
        fut
    }

    /// Processor name (the actor role name).
    pub fn role_name(&self) -> &str {
        self.context.name()
    }

    /// Current controller state.
    pub fn state(&self) -> ControllerState {
        self.shared.state.load()
    }

    /// Last fully processed position.
    pub fn position(&self) -> Option<i64> {
        self.context.positions().last_processed()
    }

    /// All positions reached by the processor.
    pub fn positions(&self) -> &Arc<PositionTracker> {
        self.context.positions()
    }

    /// True between a successful open and the start of closing.
    pub fn is_open(&self) -> bool {
        matches!(
            self.state(),
            ControllerState::Recovering
                | ControllerState::PollStream
                | ControllerState::InvokeProcessor
                | ControllerState::WriteEvent
                | ControllerState::Failed
        )
    }

    /// The immutable processor context.
    pub fn context(&self) -> &Arc<StreamProcessorContext> {
        &self.context
    }
}

impl std::fmt::Debug for StreamProcessorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamProcessorService")
            .field("name", &self.role_name())
            .field("state", &self.state())
            .field("queued", &self.shared.commands.len())
            .finish()
    }
}

/// Parking slot of a controller that is not scheduled.
#[derive(Clone)]
struct Parking {
    scheduler: Weak<ActorScheduler>,
    shared: Arc<Shared>,
    slot: Arc<Mutex<Option<StreamProcessorController>>>,
}

impl Parking {
    /// Schedules the controller if it is parked.
    fn wake_up(&self) {
        let parked = self.slot.lock().take();
        if let Some(controller) = parked {
            self.launch(controller);
        }
    }

    fn launch(&self, controller: StreamProcessorController) {
        let Some(scheduler) = self.scheduler.upgrade() else {
            self.park(controller, ActorExitReason::Rejected);
            return;
        };
        let parking = self.clone();
        // a rejected submission comes back through `park`
        let _ = scheduler.submit_with(controller, move |controller, reason| {
            parking.park(controller, reason);
        });
    }

    fn park(&self, mut controller: StreamProcessorController, reason: ActorExitReason) {
        if reason != ActorExitReason::Deregistered {
            controller.teardown(reason);
        }
        let mut slot = self.slot.lock();
        if reason == ActorExitReason::Deregistered && !self.shared.commands.is_empty() {
            drop(slot);
            self.launch(controller);
            return;
        }
        *slot = Some(controller);
    }
}
