//! # Drive loop of a single actor.
//!
//! ```text
//! on_actor_started(ctx)
//! loop {
//!   ├─► cancelled? ─────────────────────────────► Cancelled
//!   ├─► work = do_work(ctx)   (actor-thread marker set, panics caught)
//!   │       └─ panic ─► publish ActorDead ──────► Panicked
//!   ├─► ctx.deregister() called? ───────────────► Deregistered
//!   ├─► work > 0 → reset idle round, yield_now, continue
//!   └─► work == 0 → wait for first of:
//!          ├─ wake-up (Notify permit) → reset idle round
//!          ├─ sleep(idle.next(round))
//!          └─ cancellation ─────────────────────► Cancelled
//! }
//! ```
//!
//! ## Rules
//! - `do_work` is never called concurrently for one actor.
//! - A busy actor yields to the tokio scheduler between rounds, so many actors
//!   share a pool fairly.
//! - Wake-ups are permits: a wake that arrives while `do_work` runs is not lost.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::task::Waker;

use tokio::{sync::Notify, time};
use tokio_util::sync::CancellationToken;

use super::actor::{Actor, ActorContext, ActorExitReason, NotifyWaker, run_as_actor};
use crate::events::{Bus, Event, EventKind};
use crate::policies::BackoffPolicy;
use crate::subscribers::panic_message;

/// Drives `actor` until it deregisters, panics, or `token` is cancelled.
pub(crate) async fn drive<A: Actor>(
    actor: &mut A,
    idle: BackoffPolicy,
    token: &CancellationToken,
    bus: &Bus,
) -> ActorExitReason {
    let notify = Arc::new(Notify::new());
    let ctx = ActorContext::new(Waker::from(Arc::new(NotifyWaker(Arc::clone(&notify)))));
    let mut idle_round: u32 = 0;

    if let Err(reason) = step(actor, bus, |a| {
        a.on_actor_started(&ctx);
        0
    }) {
        return reason;
    }

    loop {
        if token.is_cancelled() {
            return ActorExitReason::Cancelled;
        }

        let work = match step(actor, bus, |a| a.do_work(&ctx)) {
            Ok(work) => work,
            Err(reason) => return reason,
        };
        if ctx.is_deregistered() {
            return ActorExitReason::Deregistered;
        }

        if work > 0 {
            idle_round = 0;
            tokio::task::yield_now().await;
            continue;
        }

        let delay = idle.next(idle_round);
        idle_round = idle_round.saturating_add(1);
        tokio::select! {
            _ = notify.notified() => { idle_round = 0; }
            _ = time::sleep(delay) => {}
            _ = token.cancelled() => return ActorExitReason::Cancelled,
        }
    }
}

/// Runs one actor callback as the actor, converting a panic into `ActorDead`.
fn step<A: Actor>(
    actor: &mut A,
    bus: &Bus,
    f: impl FnOnce(&mut A) -> usize,
) -> Result<usize, ActorExitReason> {
    match catch_unwind(AssertUnwindSafe(|| run_as_actor(|| f(&mut *actor)))) {
        Ok(work) => Ok(work),
        Err(payload) => {
            bus.publish(
                Event::new(EventKind::ActorDead)
                    .with_actor(actor.role_name())
                    .with_reason(panic_message(&*payload)),
            );
            Err(ActorExitReason::Panicked)
        }
    }
}
