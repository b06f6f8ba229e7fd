use std::sync::Arc;

use tokio::runtime::Handle as RuntimeHandle;

use super::{config::SchedulerConfig, scheduler::ActorScheduler};
use crate::{
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing an [`ActorScheduler`] with optional subscribers.
pub struct SchedulerBuilder {
    cfg: SchedulerConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SchedulerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SchedulerConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (actor lifecycle, processor failures, etc.)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the scheduler on the current tokio runtime.
    ///
    /// Initializes the event bus, the subscriber workers and the listener that
    /// forwards bus events to them.
    ///
    /// # Panics
    /// Outside a tokio runtime.
    pub fn build(self) -> Arc<ActorScheduler> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        Arc::new(ActorScheduler::new_internal(
            self.cfg,
            bus,
            subs,
            RuntimeHandle::current(),
        ))
    }
}
