//! # streamvisor
//!
//! **Streamvisor** is the concurrency and execution core of a partitioned
//! event-sourcing engine.
//!
//! It provides an actor-style scheduler on top of tokio, reusable allocation-free
//! futures, and the single-threaded *stream processor* state machine that turns one
//! partition's append-only log into consistent, replayable state.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   open_async / close_async          target log failure listener
//!            │                                  │
//!            ▼                                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  StreamProcessorService (one per partition)                       │
//! │  - CommandQueue (lock-free ring + overflow)                       │
//! │  - parking slot for the controller while it is not scheduled      │
//! └──────┬────────────────────────────────────────────────────────────┘
//!        │ submit_with(controller)
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  ActorScheduler (runtime orchestrator)                            │
//! │  - Bus (broadcast events)                                         │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! │  - Registry (running actors, cancellation, shutdown grace)        │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ drive loop   │   │ drive loop   │   │ drive loop   │
//!     │ controller 1 │   │ controller 2 │   │ any Actor    │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ Publishes: ProcessorOpened, ProcessingFailed,
//!            │ LogFailed, ProcessorRecovered, ActorDead, ...
//!            ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                 Bus ──► subscriber listener ──► SubscriberSet     │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Processing loop
//! ```text
//! do_work()
//!   ├─► drain commands (only in Closed / PollStream / WriteEvent / Failed)
//!   └─► one bounded step:
//!         PollStream ─► InvokeProcessor ─► WriteEvent ─► PollStream ...
//!         LogFailed  ─► Failed ─► LogRecovered ─► Recovering (resume after last processed)
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                                  |
//! |-------------------|---------------------------------------------------------------|-----------------------------------------------------|
//! | **Futures**       | CAS-guarded, reusable completion objects with parked wakers.  | [`ReusableFuture`], [`CompletedFuture`], [`ActorFuture`] |
//! | **Scheduling**    | Cooperative actors driven on a shared tokio runtime.          | [`Actor`], [`ActorScheduler`]                       |
//! | **Processing**    | Event-sourcing state machine with recovery and snapshots.     | [`StreamProcessor`], [`StreamProcessorService`], [`SnapshotStorage`] |
//! | **Distribution**  | Deterministic partition-to-member assignment and rebalancing. | [`PartitionDistributor`], [`plan_rebalance`]        |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, custom).        | [`Subscribe`], [`TraceWriter`]                      |
//! | **Errors**        | Typed errors for futures, processing, runtime, distribution.  | [`FutureError`], [`ProcessingError`], [`RuntimeError`] |
//! | **Configuration** | Centralized settings.                                         | [`SchedulerConfig`], [`ProcessorConfig`]            |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use streamvisor::{
//!     ActorScheduler, EventWriter, InMemoryLog, LoggedEvent, ProcessingError, ProcessorConfig,
//!     SchedulerConfig, StreamProcessor, StreamProcessorContext, StreamProcessorService, Subscribe,
//!     TraceWriter,
//! };
//!
//! struct Uppercase;
//!
//! impl StreamProcessor for Uppercase {
//!     fn on_event(&mut self, event: &LoggedEvent, writer: &mut EventWriter) -> Result<(), ProcessingError> {
//!         if event.source_position.is_none() {
//!             writer.write(&event.payload.to_ascii_uppercase());
//!         }
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(TraceWriter::default())];
//!     let scheduler = ActorScheduler::builder(SchedulerConfig::default())
//!         .with_subscribers(subs)
//!         .build();
//!
//!     let log = InMemoryLog::new("partition-1");
//!     log.append("hello");
//!
//!     let ctx = StreamProcessorContext::builder("uppercase", Arc::new(log.clone()), Arc::new(log.clone()))
//!         .with_partition_id(1)
//!         .build();
//!     let service = StreamProcessorService::new(
//!         &scheduler,
//!         ProcessorConfig::default(),
//!         ctx,
//!         Uppercase,
//!         log.reader(),
//!         log.writer(),
//!     );
//!
//!     service.open_async().wait().await?;
//!     while service.position() != Some(2) {
//!         tokio::task::yield_now().await;
//!     }
//!     service.close_async().wait().await?;
//!
//!     assert_eq!(log.events()[1].payload, b"HELLO");
//!     scheduler.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod core;
mod distribution;
mod error;
mod events;
mod future;
mod policies;
mod processor;
mod subscribers;

// ---- Public re-exports ----

pub use core::{
    Actor, ActorContext, ActorExitReason, ActorId, ActorScheduler, SchedulerBuilder,
    SchedulerConfig, is_actor_thread,
};
pub use distribution::{
    AssignmentTable, MemberId, MemberPriority, PartitionDistributor, PartitionId,
    PartitionMetadata, RebalanceOperation, plan_rebalance,
};
pub use error::{DistributionError, FailureCause, FutureError, ProcessingError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use future::{
    ActorFuture, BlockingRegistry, CompletedFuture, DEFAULT_BLOCKING_CAPACITY, FutureState,
    ReusableFuture, Wait,
};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use processor::{
    Command, CommandQueue, ControllerState, EventFilter, EventRecord, EventWriter,
    FailureListener, InMemoryLog, InMemoryLogReader, InMemoryLogWriter, InMemorySnapshotStorage,
    LogReader, LogStream, LogWriter, LoggedEvent, PositionTracker, ProcessorConfig, Resource,
    Snapshot, SnapshotMetadata, SnapshotStorage, StreamProcessor, StreamProcessorContext,
    StreamProcessorContextBuilder, StreamProcessorController, StreamProcessorService,
};
pub use subscribers::{Subscribe, SubscriberSet, TraceWriter};
