//! # ActorScheduler: drives actors on a shared tokio runtime.
//!
//! The [`ActorScheduler`] owns the event bus, a [`SubscriberSet`] and the actor
//! registry. Every submitted [`Actor`] gets its own drive loop (one tokio task), so
//! many partitions share the runtime's thread pool while each one stays
//! single-threaded.
//!
//! ## High-level architecture
//! ```text
//! submit(actor) ─► Registry.register ─► spawn drive loop (child token)
//!                                            │
//!                                            ├─ runner::drive(actor)  → ActorExitReason
//!                                            ├─ actor.on_actor_stopped(reason)
//!                                            ├─ publish ActorStopped
//!                                            ├─ Registry.remove(id)
//!                                            └─ on_exit(actor, reason)   (hands the actor back)
//!
//! Event flow:
//!   runner / controller ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit
//!
//! Shutdown path:
//!   shutdown()
//!     └─► publish(ShutdownRequested)
//!     └─► runtime_token.cancel()   → propagates to every drive loop
//!     └─► join all with grace:
//!            ├─ Ok       → publish(AllStoppedWithin)
//!            └─ Timeout  → publish(GraceExceeded), RuntimeError::GraceExceeded { stuck }
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::runtime::Handle as RuntimeHandle;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::actor::{Actor, ActorExitReason, run_as_actor};
use super::builder::SchedulerBuilder;
use super::config::SchedulerConfig;
use super::registry::{ActorId, Handle, Registry};
use super::runner;
use super::shutdown::wait_for_signal;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::{SubscriberSet, panic_message};

/// Cooperative scheduler for [`Actor`]s.
pub struct ActorScheduler {
    cfg: SchedulerConfig,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    registry: Arc<Registry>,
    runtime: RuntimeHandle,
    runtime_token: CancellationToken,
}

impl ActorScheduler {
    /// Starts building a scheduler.
    pub fn builder(cfg: SchedulerConfig) -> SchedulerBuilder {
        SchedulerBuilder::new(cfg)
    }

    /// Builds a scheduler without subscribers.
    ///
    /// # Panics
    /// Outside a tokio runtime.
    pub fn new(cfg: SchedulerConfig) -> Arc<Self> {
        SchedulerBuilder::new(cfg).build()
    }

    pub(crate) fn new_internal(
        cfg: SchedulerConfig,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        runtime: RuntimeHandle,
    ) -> Self {
        let sched = Self {
            cfg,
            bus,
            subs,
            registry: Arc::new(Registry::default()),
            runtime,
            runtime_token: CancellationToken::new(),
        };
        sched.subscriber_listener();
        sched
    }

    /// Submits an actor; it is dropped when its loop ends.
    pub fn submit<A: Actor>(&self, actor: A) -> Result<ActorId, RuntimeError> {
        self.submit_with(actor, |_actor, _reason| {})
    }

    /// Submits an actor and hands it back to `on_exit` when its loop ends.
    ///
    /// Safe to call from any thread. After [`shutdown`](Self::shutdown) the actor is
    /// handed straight to `on_exit` with [`ActorExitReason::Rejected`] and
    /// [`RuntimeError::SchedulerClosed`] is returned.
    pub fn submit_with<A, F>(&self, actor: A, on_exit: F) -> Result<ActorId, RuntimeError>
    where
        A: Actor,
        F: FnOnce(A, ActorExitReason) + Send + 'static,
    {
        let mut slot = Some((actor, on_exit));
        let registered = self.registry.register(|id| {
            let (actor, on_exit) = slot
                .take()
                .unwrap_or_else(|| unreachable!("register calls spawn once"));
            self.spawn_actor(id, actor, on_exit)
        });

        match registered {
            Some(id) => Ok(id),
            None => {
                if let Some((actor, on_exit)) = slot.take() {
                    on_exit(actor, ActorExitReason::Rejected);
                }
                Err(RuntimeError::SchedulerClosed)
            }
        }
    }

    fn spawn_actor<A, F>(&self, id: ActorId, mut actor: A, on_exit: F) -> Handle
    where
        A: Actor,
        F: FnOnce(A, ActorExitReason) + Send + 'static,
    {
        let role: Arc<str> = Arc::from(actor.role_name());
        let token = self.runtime_token.child_token();
        let loop_token = token.clone();
        let idle = self.cfg.idle;
        let bus = self.bus.clone();
        let registry = Arc::clone(&self.registry);
        let role_for_loop = Arc::clone(&role);

        self.bus
            .publish(Event::new(EventKind::ActorSubmitted).with_actor(Arc::clone(&role)));

        let join = self.runtime.spawn(async move {
            let reason = runner::drive(&mut actor, idle, &loop_token, &bus).await;
            let stopped = catch_unwind(AssertUnwindSafe(|| {
                run_as_actor(|| actor.on_actor_stopped(reason))
            }));
            if let Err(payload) = stopped {
                bus.publish(
                    Event::new(EventKind::ActorDead)
                        .with_actor(Arc::clone(&role_for_loop))
                        .with_reason(panic_message(&*payload)),
                );
            }
            bus.publish(
                Event::new(EventKind::ActorStopped)
                    .with_actor(role_for_loop)
                    .with_reason(reason.as_label()),
            );
            registry.remove(id);
            on_exit(actor, reason);
        });

        Handle {
            role,
            cancel: token,
            join,
        }
    }

    /// Sorted role names of running actors.
    pub fn actors(&self) -> Vec<String> {
        self.registry.list()
    }

    /// Number of running actors.
    pub fn actor_count(&self) -> usize {
        self.registry.len()
    }

    /// The runtime event bus (for publishing custom events or subscribing directly).
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The configuration this scheduler was built with.
    pub fn config(&self) -> &SchedulerConfig {
        &self.cfg
    }

    /// True once [`shutdown`](Self::shutdown) was called.
    pub fn is_shut_down(&self) -> bool {
        self.registry.is_closed()
    }

    /// Cancels every actor and waits for them within the configured grace.
    ///
    /// Subsequent submissions are rejected.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.runtime_token.cancel();
        let mut handles = self.registry.close_and_drain();

        let Some(grace) = self.cfg.shutdown_grace() else {
            return Ok(());
        };

        let started = Instant::now();
        let all = join_all(handles.iter_mut().map(|h| &mut h.join));
        match tokio::time::timeout(grace, all).await {
            Ok(_) => {
                self.bus.publish(
                    Event::new(EventKind::AllStoppedWithin).with_elapsed(started.elapsed()),
                );
                Ok(())
            }
            Err(_) => {
                let mut stuck: Vec<String> = handles
                    .iter()
                    .filter(|h| !h.join.is_finished())
                    .map(|h| h.role.to_string())
                    .collect();
                stuck.sort_unstable();
                for h in &handles {
                    h.cancel.cancel();
                }
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded)
                        .with_elapsed(grace)
                        .with_reason(stuck.join(",")),
                );
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }

    /// Waits for a termination signal, then performs [`shutdown`](Self::shutdown).
    ///
    /// A failure to install the signal handlers is logged and treated as a signal.
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        if let Err(err) = wait_for_signal().await {
            tracing::warn!(target: "streamvisor", error = %err, "signal handlers unavailable; shutting down");
        }
        self.shutdown().await
    }

    /// Forwards bus events to the subscriber set (fire-and-forget).
    fn subscriber_listener(&self) {
        if self.subs.is_empty() {
            return;
        }
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        self.runtime.spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ActorContext;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    struct Ticks {
        left: usize,
        stopped: Arc<Mutex<Option<ActorExitReason>>>,
    }

    impl Actor for Ticks {
        fn role_name(&self) -> &str {
            "ticks"
        }

        fn do_work(&mut self, ctx: &ActorContext) -> usize {
            if self.left == 0 {
                ctx.deregister();
                return 0;
            }
            self.left -= 1;
            1
        }

        fn on_actor_stopped(&mut self, reason: ActorExitReason) {
            *self.stopped.lock() = Some(reason);
        }
    }

    struct Forever(Arc<AtomicUsize>);

    impl Actor for Forever {
        fn role_name(&self) -> &str {
            "forever"
        }

        fn do_work(&mut self, _ctx: &ActorContext) -> usize {
            self.0.fetch_add(1, Ordering::Relaxed);
            0
        }
    }

    fn cfg() -> SchedulerConfig {
        SchedulerConfig {
            grace: Duration::from_secs(2),
            ..SchedulerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_deregistered_actor_is_handed_back() {
        let sched = ActorScheduler::new(cfg());
        let stopped = Arc::new(Mutex::new(None));
        let (tx, rx) = tokio::sync::oneshot::channel();

        sched
            .submit_with(
                Ticks {
                    left: 5,
                    stopped: Arc::clone(&stopped),
                },
                move |actor, reason| {
                    let _ = tx.send((actor.left, reason));
                },
            )
            .unwrap();

        let (left, reason) = tokio::time::timeout(Duration::from_secs(2), rx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(left, 0);
        assert_eq!(reason, ActorExitReason::Deregistered);
        assert_eq!(*stopped.lock(), Some(ActorExitReason::Deregistered));
        assert_eq!(sched.actor_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_idle_actors_and_rejects_new_ones() {
        let sched = ActorScheduler::new(cfg());
        let mut rx = sched.bus().subscribe();
        let rounds = Arc::new(AtomicUsize::new(0));
        sched.submit(Forever(Arc::clone(&rounds))).unwrap();
        assert_eq!(sched.actors(), vec!["forever".to_string()]);

        tokio::time::sleep(Duration::from_millis(10)).await;
        sched.shutdown().await.unwrap();
        assert!(sched.is_shut_down());
        assert!(rounds.load(Ordering::Relaxed) > 0);

        let rejected = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&rejected);
        let err = sched
            .submit_with(Forever(rounds), move |_actor, reason| {
                flag.store(reason == ActorExitReason::Rejected, Ordering::SeqCst);
            })
            .unwrap_err();
        assert!(matches!(err, RuntimeError::SchedulerClosed));
        assert!(rejected.load(Ordering::SeqCst));

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        assert!(kinds.contains(&EventKind::ActorSubmitted));
        assert!(kinds.contains(&EventKind::ShutdownRequested));
        assert!(kinds.contains(&EventKind::AllStoppedWithin));
    }

    #[tokio::test]
    async fn test_panicking_actor_does_not_take_down_others() {
        struct Bomb;
        impl Actor for Bomb {
            fn role_name(&self) -> &str {
                "bomb"
            }
            fn do_work(&mut self, _ctx: &ActorContext) -> usize {
                panic!("bomb went off");
            }
        }

        let sched = ActorScheduler::new(cfg());
        let rounds = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = tokio::sync::oneshot::channel();
        sched
            .submit_with(Bomb, move |_actor, reason| {
                let _ = tx.send(reason);
            })
            .unwrap();
        sched.submit(Forever(Arc::clone(&rounds))).unwrap();

        let reason = tokio::time::timeout(Duration::from_secs(2), rx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reason, ActorExitReason::Panicked);

        let before = rounds.load(Ordering::Relaxed);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rounds.load(Ordering::Relaxed) > before);
        sched.shutdown().await.unwrap();
    }
}
