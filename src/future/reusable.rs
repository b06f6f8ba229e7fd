//! # ReusableFuture: completion primitive reused across operations.
//!
//! One owner issues an asynchronous operation and hands out the future; exactly one
//! completer writes the outcome. The state transition is guarded by a single CAS,
//! so a second completion attempt fails with `IllegalState("already completed")`
//! and leaves the first outcome untouched.
//!
//! ## Reuse
//! ```text
//! new() ─► complete(v) ─► get() == v ─► close() ─► set_awaiting_result() ─► complete(w) ...
//! ```
//! `close()` clears the outcome so the same allocation serves the next operation.
//!
//! ## Waiting
//! - actors register a [`Waker`] through [`ReusableFuture::block`] and get resumed on completion;
//! - async callers `.await` [`ReusableFuture::wait`];
//! - external threads may use the bounded spin/yield wait of [`ReusableFuture::get_timeout`].
//!   On an actor thread the blocking getters fail with `IllegalState("actors must not block")`.
//!
//! ## Rules
//! - Notification happens **after** the terminal state is published, with no lock held.
//! - A continuation woken by `close()` observes [`FutureError::Closed`]: the owner gave up.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};
use std::{hint, thread};

use parking_lot::Mutex;

use super::registry::{BlockingRegistry, DEFAULT_BLOCKING_CAPACITY};
use super::state::{AtomicFutureState, FutureState};
use crate::core::is_actor_thread;
use crate::error::{FailureCause, FutureError};

const SPIN_ROUNDS: u32 = 64;
const YIELD_ROUNDS: u32 = 256;
const PARK_INTERVAL: Duration = Duration::from_micros(50);

enum Outcome<V> {
    Empty,
    Value(V),
    Failure {
        message: String,
        cause: Option<FailureCause>,
    },
}

/// Reusable, allocation-free completion primitive.
pub struct ReusableFuture<V> {
    state: AtomicFutureState,
    outcome: Mutex<Outcome<V>>,
    blocked: BlockingRegistry,
    /// Bumped every time the registry is drained.
    wakeups: AtomicU64,
}

impl<V> ReusableFuture<V> {
    /// Creates a future in [`FutureState::AwaitingResult`].
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BLOCKING_CAPACITY)
    }

    /// Creates an awaiting future whose blocking ring holds `capacity` continuations.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: AtomicFutureState::new(FutureState::AwaitingResult),
            outcome: Mutex::new(Outcome::Empty),
            blocked: BlockingRegistry::new(capacity),
            wakeups: AtomicU64::new(0),
        }
    }

    /// Creates a future in [`FutureState::Closed`], ready to be pooled.
    pub fn closed() -> Self {
        let fut = Self::new();
        fut.state.store(FutureState::Closed);
        fut
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> FutureState {
        self.state.load()
    }

    /// True iff a value or a failure is available.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.state.load().is_done()
    }

    /// True iff completed with a failure.
    #[inline]
    pub fn is_completed_exceptionally(&self) -> bool {
        self.state.load() == FutureState::Failed
    }

    /// True iff reset by the owner.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.state.load() == FutureState::Closed
    }

    /// True iff in service without an outcome.
    #[inline]
    pub fn is_awaiting_result(&self) -> bool {
        self.state.load() == FutureState::AwaitingResult
    }

    /// Completes the future with `value` and wakes all parked continuations.
    ///
    /// # Errors
    /// `IllegalState("already completed")` unless the future is awaiting a result.
    pub fn complete(&self, value: V) -> Result<(), FutureError> {
        self.begin_completion()?;
        *self.outcome.lock() = Outcome::Value(value);
        self.finish_completion(FutureState::ResultAvailable);
        Ok(())
    }

    /// Completes the future with a failure and wakes all parked continuations.
    ///
    /// # Errors
    /// `IllegalState("already completed")` unless the future is awaiting a result.
    pub fn complete_exceptionally(
        &self,
        message: impl Into<String>,
        cause: Option<FailureCause>,
    ) -> Result<(), FutureError> {
        self.begin_completion()?;
        *self.outcome.lock() = Outcome::Failure {
            message: message.into(),
            cause,
        };
        self.finish_completion(FutureState::Failed);
        Ok(())
    }

    /// Shorthand for [`complete_exceptionally`](Self::complete_exceptionally) without a cause.
    pub fn fail(&self, message: impl Into<String>) -> Result<(), FutureError> {
        self.complete_exceptionally(message, None)
    }

    /// Parks `job` until the future completes or is closed.
    ///
    /// Returns `false` if the future is already done (or closed); the caller must
    /// resume immediately instead of waiting. Never blocks the calling thread.
    pub fn block(&self, job: Waker) -> bool {
        let state = self.state.load();
        if state.is_done() || state == FutureState::Closed {
            return false;
        }
        self.blocked.push(job);

        // completion may have drained the registry between the load and the push
        let state = self.state.load();
        if state.is_done() || state == FutureState::Closed {
            self.wake_blocked();
        }
        true
    }

    /// Resets the future to [`FutureState::Closed`], dropping any outcome.
    ///
    /// Idempotent: returns `false` if it was already closed. Continuations still
    /// parked are woken and observe [`FutureError::Closed`].
    ///
    /// Only the owner may close and reuse the future. The outcome is cleared after
    /// the state switched to `Closed`, so a `set_awaiting_result` + `complete` racing
    /// from another thread can have its new value wiped.
    pub fn close(&self) -> bool {
        loop {
            match self.state.load() {
                FutureState::Closed => return false,
                // a completer is mid-write; its window is a few instructions long
                FutureState::Completing => hint::spin_loop(),
                current => {
                    if self
                        .state
                        .compare_exchange(current, FutureState::Closed)
                        .is_ok()
                    {
                        break;
                    }
                }
            }
        }
        *self.outcome.lock() = Outcome::Empty;
        self.wake_blocked();
        true
    }

    /// Puts a closed future back into service.
    ///
    /// # Errors
    /// `IllegalState("not closed")` if the future is still in use.
    pub fn set_awaiting_result(&self) -> Result<(), FutureError> {
        self.state
            .compare_exchange(FutureState::Closed, FutureState::AwaitingResult)
            .map(|_| ())
            .map_err(|_| FutureError::IllegalState("not closed"))
    }

    /// Number of continuations currently parked.
    pub fn blocked_count(&self) -> usize {
        self.blocked.len()
    }

    fn begin_completion(&self) -> Result<(), FutureError> {
        self.state
            .compare_exchange(FutureState::AwaitingResult, FutureState::Completing)
            .map(|_| ())
            .map_err(|_| FutureError::IllegalState("already completed"))
    }

    fn finish_completion(&self, terminal: FutureState) {
        self.state.store(terminal);
        self.wake_blocked();
    }

    fn wake_blocked(&self) {
        self.wakeups.fetch_add(1, Ordering::AcqRel);
        self.blocked.wake_all();
    }

    fn wakeups(&self) -> u64 {
        self.wakeups.load(Ordering::Acquire)
    }
}

impl<V: Clone> ReusableFuture<V> {
    /// Waits without a deadline; for non-actor callers only.
    ///
    /// # Errors
    /// - `IllegalState("actors must not block")` on an actor thread;
    /// - [`FutureError::Failed`] with the stored failure;
    /// - [`FutureError::Closed`] if the owner closed the future.
    pub fn get(&self) -> Result<V, FutureError> {
        self.spin_wait(None)
    }

    /// Waits at most `timeout`; for non-actor callers only.
    ///
    /// # Errors
    /// As [`get`](Self::get), plus [`FutureError::Timeout`] when the deadline passes.
    pub fn get_timeout(&self, timeout: Duration) -> Result<V, FutureError> {
        self.spin_wait(Some(timeout))
    }

    /// [`get`](Self::get) with the typed error converted into an opaque propagating one.
    pub fn join(&self) -> anyhow::Result<V> {
        self.get().map_err(anyhow::Error::from)
    }

    /// Returns the outcome if the future is done or closed, without waiting.
    pub fn try_get(&self) -> Option<Result<V, FutureError>> {
        match self.state.load() {
            FutureState::ResultAvailable | FutureState::Failed => Some(self.read_outcome()),
            FutureState::Closed => Some(Err(FutureError::Closed)),
            FutureState::AwaitingResult | FutureState::Completing => None,
        }
    }

    /// Async wait that parks through [`block`](Self::block) instead of spinning.
    pub fn wait(&self) -> Wait<'_, V> {
        Wait {
            future: self,
            registered: None,
        }
    }

    fn read_outcome(&self) -> Result<V, FutureError> {
        match &*self.outcome.lock() {
            Outcome::Value(v) => Ok(v.clone()),
            Outcome::Failure { message, cause } => Err(FutureError::Failed {
                message: message.clone(),
                cause: cause.clone(),
            }),
            // closed between the state load and the read
            Outcome::Empty => Err(FutureError::Closed),
        }
    }

    fn spin_wait(&self, timeout: Option<Duration>) -> Result<V, FutureError> {
        if is_actor_thread() {
            return Err(FutureError::IllegalState("actors must not block"));
        }
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut round: u32 = 0;

        loop {
            if let Some(outcome) = self.try_get() {
                return outcome;
            }
            if let (Some(deadline), Some(timeout)) = (deadline, timeout) {
                if Instant::now() >= deadline {
                    return Err(FutureError::Timeout { timeout });
                }
            }
            if round < SPIN_ROUNDS {
                hint::spin_loop();
            } else if round < YIELD_ROUNDS {
                thread::yield_now();
            } else {
                thread::sleep(PARK_INTERVAL);
            }
            round = round.saturating_add(1);
        }
    }
}

impl<V> Default for ReusableFuture<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for ReusableFuture<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReusableFuture")
            .field("state", &self.state.load())
            .field("blocked", &self.blocked.len())
            .finish()
    }
}

/// Future returned by [`ReusableFuture::wait`].
///
/// Parks at most one waker per registry drain: a re-poll with an equivalent waker
/// does not register it again.
#[must_use = "futures do nothing unless awaited"]
pub struct Wait<'a, V> {
    future: &'a ReusableFuture<V>,
    registered: Option<(Waker, u64)>,
}

impl<V: Clone> Future for Wait<'_, V> {
    type Output = Result<V, FutureError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(outcome) = this.future.try_get() {
            return Poll::Ready(outcome);
        }

        let wakeups = this.future.wakeups();
        let parked = this
            .registered
            .as_ref()
            .is_some_and(|(waker, at)| *at == wakeups && waker.will_wake(cx.waker()));
        if !parked {
            let waker = cx.waker().clone();
            this.future.block(waker.clone());
            this.registered = Some((waker, wakeups));
        }

        match this.future.try_get() {
            Some(outcome) => Poll::Ready(outcome),
            None => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::future::registry::tests::counting;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_second_completion_is_rejected_and_keeps_first_value() {
        let fut = ReusableFuture::new();
        fut.complete(1).unwrap();

        let err = fut.complete(2).unwrap_err();
        assert!(err.is_illegal_state());
        let err = fut.fail("late").unwrap_err();
        assert!(err.is_illegal_state());

        assert_eq!(fut.get().unwrap(), 1);
        assert_eq!(fut.state(), FutureState::ResultAvailable);
    }

    #[test]
    fn test_failure_is_stored_once() {
        let fut: ReusableFuture<u32> = ReusableFuture::new();
        let cause: FailureCause = Arc::new(std::io::Error::other("disk"));
        fut.complete_exceptionally("write failed", Some(cause)).unwrap();
        assert!(fut.complete(7).unwrap_err().is_illegal_state());

        assert!(fut.is_done());
        assert!(fut.is_completed_exceptionally());
        match fut.get() {
            Err(FutureError::Failed { message, cause }) => {
                assert_eq!(message, "write failed");
                assert_eq!(cause.unwrap().to_string(), "disk");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_close_then_reuse() {
        let fut = ReusableFuture::new();
        fut.complete("first".to_string()).unwrap();

        assert!(fut.close());
        assert!(!fut.close());
        assert!(!fut.is_done());
        assert!(fut.is_closed());
        assert!(matches!(fut.try_get(), Some(Err(FutureError::Closed))));

        fut.set_awaiting_result().unwrap();
        assert!(fut.is_awaiting_result());
        fut.complete("second".to_string()).unwrap();
        assert_eq!(fut.get().unwrap(), "second");
    }

    #[test]
    fn test_set_awaiting_result_requires_closed() {
        let fut: ReusableFuture<()> = ReusableFuture::new();
        assert!(fut.set_awaiting_result().unwrap_err().is_illegal_state());
        assert!(ReusableFuture::<()>::closed().set_awaiting_result().is_ok());
    }

    #[test]
    fn test_block_then_complete_wakes_every_continuation() {
        let fut = ReusableFuture::with_capacity(4);
        let (count, waker) = counting();
        for _ in 0..10 {
            assert!(fut.block(waker.clone()));
        }
        assert_eq!(fut.blocked_count(), 10);

        fut.complete(42u64).unwrap();
        assert_eq!(count.0.load(Ordering::SeqCst), 10);
        assert_eq!(fut.blocked_count(), 0);
        assert_eq!(fut.get().unwrap(), 42);
    }

    #[test]
    fn test_block_on_done_future_returns_false() {
        let fut = ReusableFuture::new();
        fut.complete(()).unwrap();
        let (count, waker) = counting();
        assert!(!fut.block(waker));
        assert_eq!(count.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_close_wakes_blocked_continuations() {
        let fut: ReusableFuture<u8> = ReusableFuture::new();
        let (count, waker) = counting();
        fut.block(waker);
        fut.close();
        assert_eq!(count.0.load(Ordering::SeqCst), 1);
        assert!(matches!(fut.get(), Err(FutureError::Closed)));
    }

    #[test]
    fn test_get_is_rejected_on_actor_thread() {
        let fut = ReusableFuture::new();
        fut.complete(1u8).unwrap();
        let res = crate::core::run_as_actor(|| fut.get());
        assert!(matches!(
            res,
            Err(FutureError::IllegalState("actors must not block"))
        ));
        assert_eq!(fut.get().unwrap(), 1);
    }

    #[test]
    fn test_get_timeout_expires() {
        let fut: ReusableFuture<u8> = ReusableFuture::new();
        let err = fut.get_timeout(Duration::from_millis(5)).unwrap_err();
        assert!(matches!(err, FutureError::Timeout { .. }));
    }

    #[test]
    fn test_cross_thread_completion() {
        let fut = Arc::new(ReusableFuture::new());
        let completer = Arc::clone(&fut);
        let h = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            completer.complete(99u32).unwrap();
        });
        assert_eq!(fut.get_timeout(Duration::from_secs(5)).unwrap(), 99);
        h.join().unwrap();
    }

    #[test]
    fn test_racing_completers_only_one_wins() {
        let fut = Arc::new(ReusableFuture::new());
        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let f = Arc::clone(&fut);
                thread::spawn(move || f.complete(i).is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert!(fut.get().is_ok());
    }

    #[test]
    fn test_join_converts_failure() {
        let fut: ReusableFuture<()> = ReusableFuture::new();
        fut.fail("boom").unwrap();
        let err = fut.join().unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_repolled_wait_parks_one_waker() {
        let fut: ReusableFuture<u8> = ReusableFuture::new();
        let mut wait = fut.wait();
        let mut cx = Context::from_waker(Waker::noop());
        for _ in 0..1_000 {
            assert!(Pin::new(&mut wait).poll(&mut cx).is_pending());
        }
        assert_eq!(fut.blocked_count(), 1);

        // a different waker replaces the registration
        let (count, waker) = counting();
        let mut cx = Context::from_waker(&waker);
        assert!(Pin::new(&mut wait).poll(&mut cx).is_pending());
        assert!(Pin::new(&mut wait).poll(&mut cx).is_pending());
        assert_eq!(fut.blocked_count(), 2);

        fut.complete(7).unwrap();
        assert_eq!(count.0.load(Ordering::SeqCst), 1);
        assert!(matches!(Pin::new(&mut wait).poll(&mut cx), Poll::Ready(Ok(7))));
    }

    #[test]
    fn test_wait_reparks_after_reuse() {
        let fut: ReusableFuture<u8> = ReusableFuture::new();
        let (count, waker) = counting();
        let mut cx = Context::from_waker(&waker);
        let mut wait = fut.wait();
        assert!(Pin::new(&mut wait).poll(&mut cx).is_pending());

        // closed and put back in service before the waiter polls again
        fut.close();
        fut.set_awaiting_result().unwrap();
        assert_eq!(count.0.load(Ordering::SeqCst), 1);
        assert_eq!(fut.blocked_count(), 0);

        assert!(Pin::new(&mut wait).poll(&mut cx).is_pending());
        assert_eq!(fut.blocked_count(), 1);
        fut.complete(3).unwrap();
        assert_eq!(count.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_wait_resolves_after_completion_on_other_task() {
        let fut = Arc::new(ReusableFuture::new());
        let completer = Arc::clone(&fut);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            completer.complete("done").unwrap();
        });
        assert_eq!(fut.wait().await.unwrap(), "done");
    }
}
