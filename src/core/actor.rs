//! # Actor scheduling contract.
//!
//! An [`Actor`] is one logical thread of control. The scheduler calls
//! [`Actor::do_work`] repeatedly from a single tokio task, so an actor is never
//! executed concurrently with itself and may mutate its state without locks.
//!
//! ## Rules
//! - `do_work` is synchronous and must return after a bounded amount of work.
//! - The returned count is a busy/idle signal: `0` lets the runner back off.
//! - Other threads talk to an actor only through lock-free structures plus its
//!   [`ActorContext::waker`], which cuts an idle back-off short.
//! - While `do_work` runs, the current thread is marked as an actor thread and the
//!   blocking getters of [`ReusableFuture`](crate::ReusableFuture) refuse to wait.

use std::cell::Cell;
use std::sync::Arc;
use std::task::{Wake, Waker};

use tokio::sync::Notify;

thread_local! {
    static ON_ACTOR_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// True while the current thread executes an actor's `do_work`.
pub fn is_actor_thread() -> bool {
    ON_ACTOR_THREAD.with(Cell::get)
}

/// Runs `f` with the actor-thread marker set; restores the previous value even on unwind.
pub(crate) fn run_as_actor<R>(f: impl FnOnce() -> R) -> R {
    struct Restore(bool);
    impl Drop for Restore {
        fn drop(&mut self) {
            ON_ACTOR_THREAD.with(|flag| flag.set(self.0));
        }
    }

    let _restore = Restore(ON_ACTOR_THREAD.with(|flag| flag.replace(true)));
    f()
}

/// Why an actor's drive loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorExitReason {
    /// The actor called [`ActorContext::deregister`].
    Deregistered,
    /// The scheduler was shut down.
    Cancelled,
    /// `do_work` panicked.
    Panicked,
    /// The scheduler refused the submission.
    Rejected,
}

impl ActorExitReason {
    /// Short stable label for events/logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ActorExitReason::Deregistered => "deregistered",
            ActorExitReason::Cancelled => "cancelled",
            ActorExitReason::Panicked => "panicked",
            ActorExitReason::Rejected => "rejected",
        }
    }
}

/// A unit of cooperative, single-threaded execution driven by the scheduler.
pub trait Actor: Send + 'static {
    /// Name used for diagnostics and events.
    fn role_name(&self) -> &str;

    /// Called once on the runner before the first `do_work`.
    fn on_actor_started(&mut self, _ctx: &ActorContext) {}

    /// Performs one bounded unit of work; returns how much was done.
    fn do_work(&mut self, ctx: &ActorContext) -> usize;

    /// Called once after the drive loop ended (not called for `Rejected`).
    fn on_actor_stopped(&mut self, _reason: ActorExitReason) {}
}

/// Per-runner handle passed to every `do_work` call.
pub struct ActorContext {
    waker: Waker,
    deregister: Cell<bool>,
}

impl ActorContext {
    pub(crate) fn new(waker: Waker) -> Self {
        Self {
            waker,
            deregister: Cell::new(false),
        }
    }

    /// Waker that resumes this actor; park it on futures or hand it to producers.
    pub fn waker(&self) -> &Waker {
        &self.waker
    }

    /// Asks the runner to remove this actor after the current `do_work` returns.
    pub fn deregister(&self) {
        self.deregister.set(true);
    }

    pub(crate) fn is_deregistered(&self) -> bool {
        self.deregister.get()
    }
}

/// Waker backed by a [`Notify`] permit, so a wake-up before the runner parks is not lost.
pub(crate) struct NotifyWaker(pub(crate) Arc<Notify>);

impl Wake for NotifyWaker {
    fn wake(self: Arc<Self>) {
        self.0.notify_one();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.0.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_is_scoped() {
        assert!(!is_actor_thread());
        let inside = run_as_actor(is_actor_thread);
        assert!(inside);
        assert!(!is_actor_thread());
    }

    #[test]
    fn test_marker_restored_after_panic() {
        let res = std::panic::catch_unwind(|| run_as_actor(|| panic!("boom")));
        assert!(res.is_err());
        assert!(!is_actor_thread());
    }

    #[tokio::test]
    async fn test_wake_before_wait_is_kept() {
        let notify = Arc::new(Notify::new());
        let waker = Waker::from(Arc::new(NotifyWaker(notify.clone())));
        waker.wake_by_ref();
        tokio::time::timeout(std::time::Duration::from_millis(100), notify.notified())
            .await
            .unwrap();
    }
}
