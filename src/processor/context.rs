//! # Immutable context of a stream processor.
//!
//! Built once with [`StreamProcessorContextBuilder`] before the processor is opened
//! and only read afterwards. Mutable collaborators (processor, reader, writer) are
//! owned by the controller instead.
//!
//! ## Example
//! ```
//! use std::sync::Arc;
//! use streamvisor::{InMemoryLog, StreamProcessorContext};
//!
//! let log = InMemoryLog::new("partition-1");
//! let ctx = StreamProcessorContext::builder("processor-1", Arc::new(log.clone()), Arc::new(log))
//!     .with_partition_id(1)
//!     .with_resource("limit", Arc::new(10u32))
//!     .build();
//!
//! assert_eq!(ctx.partition_id(), 1);
//! assert_eq!(ctx.resource::<u32>("limit").as_deref(), Some(&10));
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::log::{LogStream, LoggedEvent};
use super::position::PositionTracker;
use super::snapshot::SnapshotStorage;

/// Shared resource stored in a context.
pub type Resource = Arc<dyn Any + Send + Sync>;

/// Predicate deciding whether an event is handed to the processor.
pub type EventFilter = Arc<dyn Fn(&LoggedEvent) -> bool + Send + Sync>;

/// Read-only bundle a controller and its processor depend on.
pub struct StreamProcessorContext {
    name: Arc<str>,
    partition_id: u32,
    source: Arc<dyn LogStream>,
    target: Arc<dyn LogStream>,
    positions: Arc<PositionTracker>,
    snapshots: Option<Arc<dyn SnapshotStorage>>,
    filter: Option<EventFilter>,
    resources: HashMap<String, Resource>,
}

impl StreamProcessorContext {
    /// Starts building a context.
    pub fn builder(
        name: impl Into<Arc<str>>,
        source: Arc<dyn LogStream>,
        target: Arc<dyn LogStream>,
    ) -> StreamProcessorContextBuilder {
        StreamProcessorContextBuilder::new(name, source, target)
    }

    /// Processor name (also the actor role name).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// Partition this processor owns.
    pub fn partition_id(&self) -> u32 {
        self.partition_id
    }

    /// Log events are read from.
    pub fn source(&self) -> &Arc<dyn LogStream> {
        &self.source
    }

    /// Log events are written to; its failure listener drives recovery.
    pub fn target(&self) -> &Arc<dyn LogStream> {
        &self.target
    }

    /// Positions reached by the processor.
    pub fn positions(&self) -> &Arc<PositionTracker> {
        &self.positions
    }

    /// Snapshot storage, if configured.
    pub fn snapshots(&self) -> Option<&Arc<dyn SnapshotStorage>> {
        self.snapshots.as_ref()
    }

    /// True if the event filter (if any) lets `event` through to the processor.
    pub fn accepts(&self, event: &LoggedEvent) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter(event))
    }

    /// Named resource downcast to `T`.
    pub fn resource<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.resources
            .get(name)
            .cloned()
            .and_then(|r| r.downcast::<T>().ok())
    }

    /// Names of all resources (unordered).
    pub fn resource_names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }
}

impl fmt::Debug for StreamProcessorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamProcessorContext")
            .field("name", &self.name)
            .field("partition_id", &self.partition_id)
            .field("source", &self.source.name())
            .field("target", &self.target.name())
            .field("snapshots", &self.snapshots.is_some())
            .field("filter", &self.filter.is_some())
            .field("resources", &self.resources.len())
            .finish()
    }
}

/// Builder for [`StreamProcessorContext`].
pub struct StreamProcessorContextBuilder {
    name: Arc<str>,
    partition_id: u32,
    source: Arc<dyn LogStream>,
    target: Arc<dyn LogStream>,
    positions: Option<Arc<PositionTracker>>,
    snapshots: Option<Arc<dyn SnapshotStorage>>,
    filter: Option<EventFilter>,
    resources: HashMap<String, Resource>,
}

impl StreamProcessorContextBuilder {
    /// Creates a builder with the mandatory parts.
    pub fn new(
        name: impl Into<Arc<str>>,
        source: Arc<dyn LogStream>,
        target: Arc<dyn LogStream>,
    ) -> Self {
        Self {
            name: name.into(),
            partition_id: 0,
            source,
            target,
            positions: None,
            snapshots: None,
            filter: None,
            resources: HashMap::new(),
        }
    }

    /// Sets the partition id (default `0`).
    pub fn with_partition_id(mut self, partition_id: u32) -> Self {
        self.partition_id = partition_id;
        self
    }

    /// Shares an existing position tracker instead of creating a fresh one.
    pub fn with_position_tracker(mut self, positions: Arc<PositionTracker>) -> Self {
        self.positions = Some(positions);
        self
    }

    /// Sets the snapshot storage consulted during recovery.
    pub fn with_snapshot_storage(mut self, snapshots: Arc<dyn SnapshotStorage>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    /// Skips events rejected by `filter`; they count as processed without reaching
    /// the processor.
    pub fn with_event_filter(
        mut self,
        filter: impl Fn(&LoggedEvent) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Adds a named resource, replacing one with the same name.
    pub fn with_resource(mut self, name: impl Into<String>, resource: Resource) -> Self {
        self.resources.insert(name.into(), resource);
        self
    }

    /// Builds the context.
    pub fn build(self) -> StreamProcessorContext {
        StreamProcessorContext {
            name: self.name,
            partition_id: self.partition_id,
            source: self.source,
            target: self.target,
            positions: self.positions.unwrap_or_default(),
            snapshots: self.snapshots,
            filter: self.filter,
            resources: self.resources,
        }
    }
}
