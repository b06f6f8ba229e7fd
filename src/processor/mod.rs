//! Stream processor: a single-threaded event-sourcing state machine.
//!
//! A [`StreamProcessorService`] feeds one partition's log into a pluggable
//! [`StreamProcessor`], writes what it produces, and reacts to target-log failures
//! reported through a [`FailureListener`]. The state machine itself is the
//! [`StreamProcessorController`], an [`Actor`](crate::Actor) driven by the
//! [`ActorScheduler`](crate::ActorScheduler).
//!
//! Internal modules:
//! - `command`: deferred operations and the lock-free command queue;
//! - `state`: controller states and which of them accept commands;
//! - `controller`: the state machine;
//! - `service`: the open/close handle and controller parking;
//! - `log`: reader/writer/stream interfaces and the in-memory log;
//! - `position`, `snapshot`, `context`, `config`: collaborators and settings.

mod command;
mod config;
mod context;
mod controller;
pub mod log;
mod position;
mod service;
mod snapshot;
mod state;
mod stream_processor;

pub use command::{Command, CommandQueue};
pub use config::ProcessorConfig;
pub use context::{EventFilter, Resource, StreamProcessorContext, StreamProcessorContextBuilder};
pub use controller::StreamProcessorController;
pub use log::memory::{InMemoryLog, InMemoryLogReader, InMemoryLogWriter};
pub use log::{
    EventRecord, EventWriter, FailureListener, LogReader, LogStream, LogWriter, LoggedEvent,
};
pub use position::PositionTracker;
pub use service::StreamProcessorService;
pub use snapshot::{InMemorySnapshotStorage, Snapshot, SnapshotMetadata, SnapshotStorage};
pub use state::ControllerState;
pub use stream_processor::StreamProcessor;
