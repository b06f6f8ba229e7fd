//! # Stream processor controller.
//!
//! The controller is an [`Actor`]: every `do_work` call first drains queued commands
//! (only if the current state accepts them), then performs one bounded step of the
//! current state and reports how much work it did.
//!
//! ```text
//! do_work(ctx)
//!   ├─► while state.accepts_commands(): apply(queue.pop())
//!   └─► match state
//!         Closed          → deregister once the queue is empty
//!         Opening         → register failure listener, on_open   → Recovering | Closing
//!         Recovering      → restore snapshot, seek reader        → PollStream (open future done)
//!         PollStream      → read next event, mark read           → InvokeProcessor | (idle)
//!         InvokeProcessor → on_event                             → WriteEvent | PollStream | Failed
//!         WriteEvent      → try_write                            → PollStream | (retry)
//!         Failed          → idle
//!         Closing         → snapshot, remove listener, on_close  → Closed (close futures done)
//! ```
//!
//! ## Rules
//! - Only `do_work` stores the state; the service and listeners only push commands.
//! - An event counts as processed once `on_event` succeeded and its write (if any)
//!   succeeded. Recovery resumes after the last processed event, so an abandoned
//!   write is delivered again and a completed event never is.
//! - A retryable `on_event` error keeps the same event; after the configured number
//!   of consecutive failures (or a fatal error) the controller moves to `Failed`.
//! - Snapshots are taken at the last processed position, every `snapshot_period`
//!   completed events and on close, never while the processor state holds an event
//!   whose write is still pending. A failed snapshot is reported and skipped.
//! - Events rejected by the context's filter count as processed without reaching
//!   the processor. A suspended processor reads nothing, but commands still apply.

use std::sync::Arc;
use std::task::Waker;

use parking_lot::Mutex;

use super::command::{Command, CommandQueue};
use super::config::ProcessorConfig;
use super::context::StreamProcessorContext;
use super::log::{EventWriter, FailureListener, LogReader, LogWriter, LoggedEvent};
use super::stream_processor::StreamProcessor;
use super::state::{AtomicControllerState, ControllerState};
use crate::core::{Actor, ActorContext, ActorExitReason};
use crate::error::{FailureCause, ProcessingError};
use crate::events::{Bus, Event, EventKind};
use crate::future::ReusableFuture;

/// State shared between a controller and its producers.
pub(crate) struct Shared {
    pub(crate) commands: CommandQueue<Command>,
    pub(crate) state: AtomicControllerState,
    waker: Mutex<Option<Waker>>,
}

impl Shared {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            commands: CommandQueue::new(capacity),
            state: AtomicControllerState::new(ControllerState::Closed),
            waker: Mutex::new(None),
        }
    }

    /// Queues a command and wakes the controller.
    pub(crate) fn send(&self, cmd: Command) {
        self.commands.push(cmd);
        if let Some(waker) = self.waker.lock().as_ref() {
            waker.wake_by_ref();
        }
    }

    fn set_waker(&self, waker: &Waker) {
        *self.waker.lock() = Some(waker.clone());
    }
}

/// Turns target log notifications into commands.
struct LogListener(Arc<Shared>);

impl FailureListener for LogListener {
    fn on_failed(&self, position: i64) {
        self.0.send(Command::LogFailed(position));
    }

    fn on_recovered(&self) {
        self.0.send(Command::LogRecovered);
    }
}

/// Single-threaded state machine feeding a log into a [`StreamProcessor`].
pub struct StreamProcessorController {
    context: Arc<StreamProcessorContext>,
    processor: Box<dyn StreamProcessor>,
    reader: Box<dyn LogReader>,
    writer: Box<dyn LogWriter>,
    event_writer: EventWriter,
    shared: Arc<Shared>,
    listener: Arc<dyn FailureListener>,
    bus: Bus,
    cfg: ProcessorConfig,
    current: Option<LoggedEvent>,
    failures: u32,
    opening: Option<Arc<ReusableFuture<()>>>,
    closing: Vec<Arc<ReusableFuture<()>>>,
    last_snapshot: Option<i64>,
    since_snapshot: u64,
    /// Processor state includes an event whose write has not completed.
    ahead: bool,
}

impl StreamProcessorController {
    pub(crate) fn new(
        cfg: ProcessorConfig,
        context: Arc<StreamProcessorContext>,
        shared: Arc<Shared>,
        bus: Bus,
        processor: Box<dyn StreamProcessor>,
        reader: Box<dyn LogReader>,
        writer: Box<dyn LogWriter>,
    ) -> Self {
        let listener: Arc<dyn FailureListener> = Arc::new(LogListener(Arc::clone(&shared)));
        Self {
            context,
            processor,
            reader,
            writer,
            event_writer: EventWriter::new(),
            shared,
            listener,
            bus,
            cfg,
            current: None,
            failures: 0,
            opening: None,
            closing: Vec::new(),
            last_snapshot: None,
            since_snapshot: 0,
            ahead: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> ControllerState {
        self.shared.state.load()
    }

    fn transition(&self, next: ControllerState) {
        tracing::trace!(
            target: "streamvisor",
            processor = %self.context.name(),
            from = self.state().as_label(),
            to = next.as_label(),
            "controller transition"
        );
        self.shared.state.store(next);
    }

    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).with_actor(self.context.name_arc())
    }

    fn drain_commands(&mut self) -> usize {
        let mut applied = 0;
        while self.state().accepts_commands() {
            let Some(cmd) = self.shared.commands.pop() else {
                break;
            };
            self.apply(cmd);
            applied += 1;
        }
        applied
    }

    fn apply(&mut self, cmd: Command) {
        let state = self.state();
        match cmd {
            Command::Open(fut) if state == ControllerState::Closed => {
                self.opening = Some(fut);
                self.transition(ControllerState::Opening);
            }
            Command::Open(fut) => {
                let _ = fut.fail("not closed");
            }
            Command::Close(fut) => {
                self.closing.push(fut);
                self.abandon_in_flight();
                self.transition(ControllerState::Closing);
            }
            Command::LogFailed(position)
                if matches!(
                    state,
                    ControllerState::PollStream | ControllerState::WriteEvent
                ) =>
            {
                tracing::warn!(
                    target: "streamvisor",
                    processor = %self.context.name(),
                    log = %self.context.target().name(),
                    position,
                    "target log failed"
                );
                self.abandon_in_flight();
                self.bus
                    .publish(self.event(EventKind::LogFailed).with_position(position));
                self.transition(ControllerState::Failed);
            }
            Command::LogRecovered if state == ControllerState::Failed => {
                self.bus.publish(self.event(EventKind::ProcessorRecovered));
                self.transition(ControllerState::Recovering);
            }
            ignored => {
                tracing::trace!(
                    target: "streamvisor",
                    processor = %self.context.name(),
                    command = ?ignored,
                    state = state.as_label(),
                    "command ignored"
                );
            }
        }
    }

    fn abandon_in_flight(&mut self) {
        self.current = None;
        self.failures = 0;
        self.event_writer.reset();
    }

    fn open(&mut self) -> usize {
        self.context
            .target()
            .register_failure_listener(Arc::clone(&self.listener));

        match self.processor.on_open(&self.context) {
            Ok(()) => self.transition(ControllerState::Recovering),
            Err(err) => {
                let message = err.to_string();
                let cause: FailureCause = Arc::new(err);
                self.open_failed(message, Some(cause));
            }
        }
        1
    }

    /// Fails the pending open future and tears the processor down through `Closing`.
    fn open_failed(&mut self, message: String, cause: Option<FailureCause>) {
        tracing::warn!(
            target: "streamvisor",
            processor = %self.context.name(),
            error = %message,
            "open failed"
        );
        self.bus.publish(
            self.event(EventKind::ProcessorOpenFailed)
                .with_reason(message.as_str()),
        );
        if let Some(fut) = self.opening.take() {
            let _ = fut.complete_exceptionally(message, cause);
        }
        self.transition(ControllerState::Closing);
    }

    /// Restores the latest snapshot into a processor that has not processed anything yet.
    ///
    /// Returns the snapshot position, or the failure message.
    fn restore(&mut self) -> Result<Option<i64>, String> {
        let Some(storage) = self.context.snapshots() else {
            return Ok(None);
        };
        let Some(snapshot) = storage.read_latest().map_err(|e| format!("{e:#}"))? else {
            return Ok(None);
        };
        self.processor
            .restore(&snapshot.state)
            .map_err(|e| e.to_string())?;
        let position = snapshot.metadata.position;
        tracing::debug!(
            target: "streamvisor",
            processor = %self.context.name(),
            position,
            "snapshot restored"
        );
        self.last_snapshot = Some(position);
        self.ahead = false;
        Ok(Some(position))
    }

    fn recover(&mut self) -> usize {
        let resume = match self.context.positions().last_processed() {
            Some(position) => Some(position + 1),
            None if self.opening.is_some() => match self.restore() {
                Ok(restored) => restored.map(|position| position + 1),
                Err(message) => {
                    self.open_failed(format!("snapshot restore failed: {message}"), None);
                    return 1;
                }
            },
            None => self
                .context
                .snapshots()
                .and_then(|s| s.latest())
                .map(|meta| meta.position + 1),
        };
        match resume {
            Some(position) => self.reader.seek(position),
            None => self.reader.seek_to_first(),
        }
        self.abandon_in_flight();
        self.transition(ControllerState::PollStream);

        if let Some(fut) = self.opening.take() {
            tracing::debug!(
                target: "streamvisor",
                processor = %self.context.name(),
                resume = ?resume,
                "processor opened"
            );
            let mut ev = self.event(EventKind::ProcessorOpened);
            if let Some(position) = resume {
                ev = ev.with_position(position);
            }
            self.bus.publish(ev);
            let _ = fut.complete(());
        }
        1
    }

    fn poll(&mut self) -> usize {
        if self.processor.is_suspended() || !self.reader.has_next() {
            return 0;
        }
        let Some(event) = self.reader.next() else {
            return 0;
        };
        self.context.positions().mark_read(event.position);
        if !self.context.accepts(&event) {
            tracing::trace!(
                target: "streamvisor",
                processor = %self.context.name(),
                position = event.position,
                "event filtered"
            );
            self.complete_event(event.position);
            return 1;
        }
        self.event_writer.begin(event.position);
        self.current = Some(event);
        self.failures = 0;
        self.transition(ControllerState::InvokeProcessor);
        1
    }

    fn invoke(&mut self) -> usize {
        let Some(event) = self.current.as_ref() else {
            self.transition(ControllerState::PollStream);
            return 1;
        };
        let position = event.position;

        match self.processor.on_event(event, &mut self.event_writer) {
            Ok(()) if self.event_writer.is_requested() => {
                self.ahead = true;
                self.transition(ControllerState::WriteEvent);
            }
            Ok(()) => {
                self.current = None;
                self.complete_event(position);
                self.transition(ControllerState::PollStream);
            }
            Err(err) => self.processing_failed(position, err),
        }
        1
    }

    fn processing_failed(&mut self, position: i64, err: ProcessingError) {
        self.failures = self.failures.saturating_add(1);
        let attempt = self.failures;
        tracing::warn!(
            target: "streamvisor",
            processor = %self.context.name(),
            position,
            attempt,
            error = %err,
            "event processing failed"
        );
        self.bus.publish(
            self.event(EventKind::ProcessingFailed)
                .with_position(position)
                .with_attempt(attempt)
                .with_reason(err.as_message()),
        );

        let exhausted = !err.is_retryable()
            || self
                .cfg
                .retry_limit()
                .is_some_and(|limit| attempt >= limit);
        if exhausted {
            tracing::error!(
                target: "streamvisor",
                processor = %self.context.name(),
                position,
                attempt,
                "giving up on event"
            );
            self.bus.publish(
                self.event(EventKind::ProcessorFailed)
                    .with_position(position)
                    .with_attempt(attempt)
                    .with_reason(err.as_message()),
            );
            self.abandon_in_flight();
            self.transition(ControllerState::Failed);
        } else {
            // drop whatever the failed attempt asked to write
            self.event_writer.begin(position);
        }
    }

    fn write(&mut self) -> usize {
        let Some(record) = self.event_writer.record() else {
            self.transition(ControllerState::PollStream);
            return 1;
        };
        let written = self.writer.try_write(record);
        if written < 0 {
            return 0;
        }

        self.context.positions().mark_written(written);
        self.event_writer.reset();
        if let Some(event) = self.current.take() {
            self.ahead = false;
            self.complete_event(event.position);
        }
        self.transition(ControllerState::PollStream);
        1
    }

    fn complete_event(&mut self, position: i64) {
        self.context.positions().mark_processed(position);
        self.since_snapshot = self.since_snapshot.saturating_add(1);
        if self
            .cfg
            .snapshot_interval()
            .is_some_and(|period| self.since_snapshot >= period)
        {
            self.take_snapshot();
        }
    }

    /// Writes the processor state at the last processed position, if there is anything new.
    fn take_snapshot(&mut self) {
        let Some(storage) = self.context.snapshots() else {
            return;
        };
        let Some(position) = self.context.positions().last_processed() else {
            return;
        };
        if self.ahead || self.last_snapshot.is_some_and(|last| last >= position) {
            return;
        }
        let Some(state) = self.processor.snapshot() else {
            return;
        };
        self.since_snapshot = 0;

        match storage.write(position, &state) {
            Ok(meta) => {
                tracing::debug!(
                    target: "streamvisor",
                    processor = %self.context.name(),
                    position = meta.position,
                    bytes = state.len(),
                    "snapshot written"
                );
                self.last_snapshot = Some(meta.position);
                self.bus
                    .publish(self.event(EventKind::SnapshotWritten).with_position(meta.position));
            }
            Err(err) => {
                tracing::warn!(
                    target: "streamvisor",
                    processor = %self.context.name(),
                    position,
                    error = %err,
                    "snapshot failed"
                );
                self.bus.publish(
                    self.event(EventKind::SnapshotFailed)
                        .with_position(position)
                        .with_reason(format!("{err:#}")),
                );
            }
        }
    }

    fn close(&mut self) -> usize {
        self.take_snapshot();
        self.context
            .target()
            .remove_failure_listener(&self.listener);
        let failure = self.processor.on_close().err();
        if let Some(err) = &failure {
            tracing::warn!(
                target: "streamvisor",
                processor = %self.context.name(),
                error = %err,
                "close failed"
            );
        }
        self.abandon_in_flight();
        self.transition(ControllerState::Closed);

        let mut ev = self.event(EventKind::ProcessorClosed);
        if let Some(err) = failure {
            ev = ev.with_reason(err.as_message());
        }
        self.bus.publish(ev);
        for fut in self.closing.drain(..) {
            let _ = fut.complete(());
        }
        1
    }

    /// Brings the controller to `Closed` after its actor stopped abnormally and
    /// settles every pending or queued future.
    pub(crate) fn teardown(&mut self, reason: ActorExitReason) {
        let state = self.state();
        if state != ControllerState::Closed {
            self.context
                .target()
                .remove_failure_listener(&self.listener);
            // on_open never ran while still in Opening
            if state != ControllerState::Opening {
                if let Err(err) = self.processor.on_close() {
                    tracing::warn!(
                        target: "streamvisor",
                        processor = %self.context.name(),
                        error = %err,
                        "close failed during teardown"
                    );
                }
            }
            self.abandon_in_flight();
            self.transition(ControllerState::Closed);
            self.bus.publish(
                self.event(EventKind::ProcessorClosed)
                    .with_reason(reason.as_label()),
            );
        }

        let message = format!("processor {} stopped: {}", self.context.name(), reason.as_label());
        if let Some(fut) = self.opening.take() {
            let _ = fut.fail(message.clone());
        }
        for fut in self.closing.drain(..) {
            let _ = fut.complete(());
        }
        while let Some(cmd) = self.shared.commands.pop() {
            match cmd {
                Command::Open(fut) => {
                    let _ = fut.fail(message.clone());
                }
                Command::Close(fut) => {
                    let _ = fut.complete(());
                }
                Command::LogFailed(_) | Command::LogRecovered => {}
            }
        }
    }
}

impl Actor for StreamProcessorController {
    fn role_name(&self) -> &str {
        self.context.name()
    }

    fn on_actor_started(&mut self, ctx: &ActorContext) {
        self.shared.set_waker(ctx.waker());
    }

    fn do_work(&mut self, ctx: &ActorContext) -> usize {
        let mut work = 0;
        if self.state().accepts_commands() {
            work += self.drain_commands();
        }

        work += match self.state() {
            ControllerState::Closed => {
                if self.shared.commands.is_empty() {
                    ctx.deregister();
                }
                0
            }
            ControllerState::Opening => self.open(),
            ControllerState::Recovering => self.recover(),
            ControllerState::PollStream => self.poll(),
            ControllerState::InvokeProcessor => self.invoke(),
            ControllerState::WriteEvent => self.write(),
            ControllerState::Failed => 0,
            ControllerState::Closing => self.close(),
        };
        work
    }

    fn on_actor_stopped(&mut self, reason: ActorExitReason) {
        if reason != ActorExitReason::Deregistered {
            self.teardown(reason);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::future::FutureState;
    use crate::processor::log::memory::InMemoryLog;
    use crate::processor::snapshot::{InMemorySnapshotStorage, SnapshotStorage};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Observations made by a [`Scripted`] processor.
    #[derive(Default)]
    pub(crate) struct Observed {
        pub(crate) seen: Mutex<Vec<i64>>,
        pub(crate) closed: AtomicUsize,
        pub(crate) suspended: AtomicBool,
        pub(crate) restored: Mutex<Option<Vec<u8>>>,
    }

    impl Observed {
        pub(crate) fn seen(&self) -> Vec<i64> {
            self.seen.lock().clone()
        }
    }

    /// Test processor: records positions, optionally echoes external events and fails on demand.
    pub(crate) struct Scripted {
        pub(crate) observed: Arc<Observed>,
        pub(crate) echo: bool,
        pub(crate) fail_at: Option<(i64, ProcessingError)>,
        pub(crate) fail_open: bool,
    }

    impl Scripted {
        pub(crate) fn new(observed: &Arc<Observed>) -> Self {
            Self {
                observed: Arc::clone(observed),
                echo: false,
                fail_at: None,
                fail_open: false,
            }
        }

        pub(crate) fn echoing(mut self) -> Self {
            self.echo = true;
            self
        }
    }

    impl StreamProcessor for Scripted {
        fn on_open(&mut self, _ctx: &StreamProcessorContext) -> Result<(), ProcessingError> {
            if self.fail_open {
                return Err(ProcessingError::fatal("state unavailable"));
            }
            Ok(())
        }

        fn on_event(
            &mut self,
            event: &LoggedEvent,
            writer: &mut EventWriter,
        ) -> Result<(), ProcessingError> {
            self.observed.seen.lock().push(event.position);
            if let Some((position, err)) = &self.fail_at {
                if *position == event.position {
                    return Err(err.clone());
                }
            }
            if self.echo && event.source_position.is_none() {
                writer.write(&event.payload);
            }
            Ok(())
        }

        fn on_close(&mut self) -> Result<(), ProcessingError> {
            self.observed.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn is_suspended(&self) -> bool {
            self.observed.suspended.load(Ordering::SeqCst)
        }

        /// State is the last position handed to `on_event`.
        fn snapshot(&self) -> Option<Vec<u8>> {
            let last = self.observed.seen.lock().last().copied();
            Some(format!("upto-{}", last.unwrap_or(0)).into_bytes())
        }

        fn restore(&mut self, state: &[u8]) -> Result<(), ProcessingError> {
            *self.observed.restored.lock() = Some(state.to_vec());
            Ok(())
        }
    }

    struct Harness {
        controller: StreamProcessorController,
        shared: Arc<Shared>,
        context: Arc<StreamProcessorContext>,
        bus: Bus,
    }

    impl Harness {
        fn new(log: &InMemoryLog, processor: Scripted, cfg: ProcessorConfig) -> Self {
            Self::with_context(
                log,
                processor,
                cfg,
                StreamProcessorContext::builder(
                    "processor-1",
                    Arc::new(log.clone()),
                    Arc::new(log.clone()),
                )
                .build(),
            )
        }

        fn with_context(
            log: &InMemoryLog,
            processor: Scripted,
            cfg: ProcessorConfig,
            context: StreamProcessorContext,
        ) -> Self {
            let context = Arc::new(context);
            let shared = Arc::new(Shared::new(4));
            let bus = Bus::new(64);
            let controller = StreamProcessorController::new(
                cfg,
                Arc::clone(&context),
                Arc::clone(&shared),
                bus.clone(),
                Box::new(processor),
                Box::new(log.reader()),
                Box::new(log.writer()),
            );
            Self {
                controller,
                shared,
                context,
                bus,
            }
        }

        fn tick(&mut self) -> usize {
            let ctx = ActorContext::new(Waker::noop().clone());
            self.controller.do_work(&ctx)
        }

        /// Ticks until a round reports no work.
        fn settle(&mut self) {
            for _ in 0..1_000 {
                if self.tick() == 0 {
                    return;
                }
            }
            panic!("controller never settled");
        }

        fn tick_until(&mut self, done: impl Fn(&Self) -> bool) {
            for _ in 0..1_000 {
                if done(self) {
                    return;
                }
                self.tick();
            }
            panic!("condition never reached");
        }

        fn send(&self, cmd: fn(Arc<ReusableFuture<()>>) -> Command) -> Arc<ReusableFuture<()>> {
            let fut = Arc::new(ReusableFuture::new());
            self.shared.send(cmd(Arc::clone(&fut)));
            fut
        }

        fn open(&mut self) {
            let fut = self.send(Command::Open);
            self.settle();
            assert_eq!(fut.state(), FutureState::ResultAvailable);
        }

        fn state(&self) -> ControllerState {
            self.controller.state()
        }
    }

    fn kinds(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<EventKind> {
        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        kinds
    }

    fn with_snapshots(
        log: &InMemoryLog,
        observed: &Arc<Observed>,
        cfg: ProcessorConfig,
        snapshots: &Arc<InMemorySnapshotStorage>,
    ) -> Harness {
        let storage: Arc<dyn SnapshotStorage> = snapshots.clone();
        let context =
            StreamProcessorContext::builder("p", Arc::new(log.clone()), Arc::new(log.clone()))
                .with_snapshot_storage(storage)
                .build();
        Harness::with_context(log, Scripted::new(observed), cfg, context)
    }

    fn log_with(n: usize) -> InMemoryLog {
        let log = InMemoryLog::new("partition-1");
        for i in 0..n {
            log.append(format!("event-{i}"));
        }
        log
    }

    #[test]
    fn test_events_are_processed_in_order_and_writes_are_visible() {
        let log = log_with(2);
        let observed = Arc::new(Observed::default());
        let mut h = Harness::new(&log, Scripted::new(&observed).echoing(), ProcessorConfig::default());

        h.open();
        assert_eq!(observed.seen(), vec![1, 2, 3, 4]);
        assert_eq!(h.state(), ControllerState::PollStream);

        let events = log.events();
        assert_eq!(events[2].source_position, Some(1));
        assert_eq!(events[3].source_position, Some(2));
        assert_eq!(h.context.positions().last_processed(), Some(4));
        assert_eq!(h.context.positions().last_written(), Some(4));
    }

    #[test]
    fn test_write_is_readable_before_next_event() {
        struct LenAtEvent {
            log: InMemoryLog,
            lens: Arc<Mutex<Vec<(i64, usize)>>>,
        }
        impl StreamProcessor for LenAtEvent {
            fn on_event(
                &mut self,
                event: &LoggedEvent,
                writer: &mut EventWriter,
            ) -> Result<(), ProcessingError> {
                self.lens.lock().push((event.position, self.log.len()));
                if event.source_position.is_none() {
                    writer.write(b"follow-up");
                }
                Ok(())
            }
        }

        let log = log_with(2);
        let lens = Arc::new(Mutex::new(Vec::new()));
        let context =
            StreamProcessorContext::builder("p", Arc::new(log.clone()), Arc::new(log.clone()))
                .build();
        let shared = Arc::new(Shared::new(4));
        let mut controller = StreamProcessorController::new(
            ProcessorConfig::default(),
            Arc::new(context),
            Arc::clone(&shared),
            Bus::new(8),
            Box::new(LenAtEvent {
                log: log.clone(),
                lens: Arc::clone(&lens),
            }),
            Box::new(log.reader()),
            Box::new(log.writer()),
        );
        shared.send(Command::Open(Arc::new(ReusableFuture::new())));
        let ctx = ActorContext::new(Waker::noop().clone());
        while controller.do_work(&ctx) > 0 {}

        // event 1's output (position 3) exists before event 2 is handed over
        assert_eq!(*lens.lock(), vec![(1, 2), (2, 3), (3, 4), (4, 4)]);
    }

    #[test]
    fn test_close_from_poll_stream() {
        let log = log_with(1);
        let observed = Arc::new(Observed::default());
        let mut h = Harness::new(&log, Scripted::new(&observed), ProcessorConfig::default());
        h.open();
        assert_eq!(log.listener_count(), 1);

        let closed = h.send(Command::Close);
        h.settle();
        assert_eq!(h.state(), ControllerState::Closed);
        assert_eq!(closed.state(), FutureState::ResultAvailable);
        assert_eq!(observed.closed.load(Ordering::SeqCst), 1);
        assert_eq!(log.listener_count(), 0);
    }

    #[test]
    fn test_close_from_write_event_and_reopen_redelivers() {
        let log = log_with(1);
        let observed = Arc::new(Observed::default());
        let mut h = Harness::new(&log, Scripted::new(&observed).echoing(), ProcessorConfig::default());
        log.set_write_blocked(true);

        let opened = h.send(Command::Open);
        h.settle();
        assert!(opened.is_done());
        assert_eq!(h.state(), ControllerState::WriteEvent);

        let closed = h.send(Command::Close);
        h.settle();
        assert_eq!(h.state(), ControllerState::Closed);
        assert!(closed.is_done());
        assert_eq!(h.context.positions().last_processed(), None);

        log.set_write_blocked(false);
        h.open();
        assert_eq!(observed.seen(), vec![1, 1, 2]);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_close_from_failed() {
        let log = log_with(1);
        let observed = Arc::new(Observed::default());
        let mut h = Harness::new(&log, Scripted::new(&observed), ProcessorConfig::default());
        h.open();

        log.fail();
        h.settle();
        assert_eq!(h.state(), ControllerState::Failed);

        let closed = h.send(Command::Close);
        h.settle();
        assert_eq!(h.state(), ControllerState::Closed);
        assert!(closed.is_done());
    }

    #[test]
    fn test_failure_after_processed_event_resumes_with_next() {
        let log = log_with(3);
        let observed = Arc::new(Observed::default());
        let mut h = Harness::new(&log, Scripted::new(&observed), ProcessorConfig::default());

        h.send(Command::Open);
        h.tick_until(|h| h.context.positions().last_processed() == Some(2));
        assert_eq!(h.state(), ControllerState::PollStream);

        log.fail();
        h.settle();
        assert_eq!(h.state(), ControllerState::Failed);
        assert_eq!(observed.seen(), vec![1, 2]);

        log.recover();
        h.settle();
        assert_eq!(observed.seen(), vec![1, 2, 3]);
        assert_eq!(h.state(), ControllerState::PollStream);
    }

    #[test]
    fn test_abandoned_write_is_redelivered_once() {
        let log = log_with(1);
        let observed = Arc::new(Observed::default());
        let mut h = Harness::new(&log, Scripted::new(&observed).echoing(), ProcessorConfig::default());
        let mut rx = h.bus.subscribe();

        h.send(Command::Open);
        h.tick_until(|h| h.state() == ControllerState::WriteEvent);

        log.fail();
        h.settle();
        assert_eq!(h.state(), ControllerState::Failed);
        assert_eq!(log.len(), 1);

        log.recover();
        h.settle();
        assert_eq!(observed.seen(), vec![1, 1, 2]);
        assert_eq!(log.len(), 2);
        assert_eq!(h.context.positions().last_written(), Some(2));

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        assert!(kinds.contains(&EventKind::LogFailed));
        assert!(kinds.contains(&EventKind::ProcessorRecovered));
    }

    #[test]
    fn test_bounded_retry_moves_to_failed() {
        let log = log_with(2);
        let observed = Arc::new(Observed::default());
        let mut processor = Scripted::new(&observed);
        processor.fail_at = Some((1, ProcessingError::fail("not yet")));
        let mut h = Harness::new(&log, processor, ProcessorConfig::default());
        let mut rx = h.bus.subscribe();

        h.open();
        assert_eq!(h.state(), ControllerState::Failed);
        assert_eq!(observed.seen(), vec![1, 1, 1]);
        assert_eq!(h.context.positions().last_processed(), None);

        let mut attempts = Vec::new();
        let mut gave_up = false;
        while let Ok(ev) = rx.try_recv() {
            match ev.kind {
                EventKind::ProcessingFailed => attempts.push(ev.attempt),
                EventKind::ProcessorFailed => gave_up = true,
                _ => {}
            }
        }
        assert_eq!(attempts, vec![Some(1), Some(2), Some(3)]);
        assert!(gave_up);
    }

    #[test]
    fn test_fatal_error_skips_retries() {
        let log = log_with(1);
        let observed = Arc::new(Observed::default());
        let mut processor = Scripted::new(&observed);
        processor.fail_at = Some((1, ProcessingError::fatal("corrupt")));
        let mut h = Harness::new(&log, processor, ProcessorConfig::default());

        h.open();
        assert_eq!(h.state(), ControllerState::Failed);
        assert_eq!(observed.seen(), vec![1]);
    }

    #[test]
    fn test_unbounded_retry_keeps_invoking() {
        let log = log_with(1);
        let observed = Arc::new(Observed::default());
        let mut processor = Scripted::new(&observed);
        processor.fail_at = Some((1, ProcessingError::fail("never")));
        let cfg = ProcessorConfig {
            max_event_retries: 0,
            ..ProcessorConfig::default()
        };
        let mut h = Harness::new(&log, processor, cfg);

        h.send(Command::Open);
        for _ in 0..20 {
            h.tick();
        }
        assert_eq!(h.state(), ControllerState::InvokeProcessor);
        assert!(observed.seen().len() > 10);
    }

    #[test]
    fn test_open_failure_closes_and_fails_future() {
        let log = log_with(1);
        let observed = Arc::new(Observed::default());
        let mut processor = Scripted::new(&observed);
        processor.fail_open = true;
        let mut h = Harness::new(&log, processor, ProcessorConfig::default());

        let opened = h.send(Command::Open);
        h.tick();
        assert_eq!(h.state(), ControllerState::Closing);
        h.settle();
        assert_eq!(h.state(), ControllerState::Closed);

        match opened.get() {
            Err(crate::FutureError::Failed { message, cause }) => {
                assert!(message.contains("state unavailable"));
                assert!(cause.is_some());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(observed.closed.load(Ordering::SeqCst), 1);
        assert_eq!(log.listener_count(), 0);
        assert!(observed.seen().is_empty());
    }

    #[test]
    fn test_open_when_open_is_rejected_and_close_when_closed_runs_on_close() {
        let log = log_with(0);
        let observed = Arc::new(Observed::default());
        let mut h = Harness::new(&log, Scripted::new(&observed), ProcessorConfig::default());
        let mut rx = h.bus.subscribe();

        let closed = h.send(Command::Close);
        h.tick();
        assert_eq!(h.state(), ControllerState::Closed);
        assert!(closed.is_done());
        assert!(!closed.is_completed_exceptionally());
        assert_eq!(observed.closed.load(Ordering::SeqCst), 1);
        assert_eq!(kinds(&mut rx), vec![EventKind::ProcessorClosed]);

        h.open();
        let again = h.send(Command::Open);
        h.settle();
        assert!(again.is_completed_exceptionally());
        assert_eq!(h.state(), ControllerState::PollStream);
    }

    #[test]
    fn test_recovery_starts_after_snapshot() {
        let log = log_with(4);
        let observed = Arc::new(Observed::default());
        let snapshots = Arc::new(InMemorySnapshotStorage::new());
        snapshots.write(2, b"state").unwrap();
        let context =
            StreamProcessorContext::builder("p", Arc::new(log.clone()), Arc::new(log.clone()))
                .with_snapshot_storage(snapshots)
                .build();
        let mut h = Harness::with_context(
            &log,
            Scripted::new(&observed),
            ProcessorConfig::default(),
            context,
        );

        h.open();
        assert_eq!(observed.seen(), vec![3, 4]);
        assert_eq!(observed.restored.lock().as_deref(), Some(&b"state"[..]));
    }

    #[test]
    fn test_failed_restore_fails_open() {
        let log = log_with(2);
        let observed = Arc::new(Observed::default());
        let snapshots = Arc::new(InMemorySnapshotStorage::new());
        snapshots.write(1, b"state").unwrap();
        snapshots.set_failing(true);
        let mut h = with_snapshots(&log, &observed, ProcessorConfig::default(), &snapshots);

        let opened = h.send(Command::Open);
        h.settle();
        assert_eq!(h.state(), ControllerState::Closed);
        match opened.get() {
            Err(crate::FutureError::Failed { message, .. }) => {
                assert!(message.contains("snapshot restore failed"));
                assert!(message.contains("snapshot storage unavailable"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(observed.closed.load(Ordering::SeqCst), 1);
        assert!(observed.seen().is_empty());
        assert!(observed.restored.lock().is_none());
    }

    #[test]
    fn test_snapshot_every_period_at_last_processed() {
        let log = log_with(5);
        let observed = Arc::new(Observed::default());
        let snapshots = Arc::new(InMemorySnapshotStorage::new());
        let cfg = ProcessorConfig {
            snapshot_period: 2,
            ..ProcessorConfig::default()
        };
        let mut h = with_snapshots(&log, &observed, cfg, &snapshots);
        let mut rx = h.bus.subscribe();

        h.open();
        assert_eq!(h.context.positions().last_processed(), Some(5));
        // the fifth event has not filled a period yet
        assert_eq!(snapshots.latest().map(|m| m.position), Some(4));
        assert_eq!(snapshots.latest_state().as_deref(), Some(&b"upto-4"[..]));

        let written: Vec<_> = kinds(&mut rx)
            .into_iter()
            .filter(|k| *k == EventKind::SnapshotWritten)
            .collect();
        assert_eq!(written.len(), 2);
    }

    #[test]
    fn test_snapshot_on_close_only_when_there_is_progress() {
        let log = log_with(3);
        let observed = Arc::new(Observed::default());
        let snapshots = Arc::new(InMemorySnapshotStorage::new());
        let cfg = ProcessorConfig {
            snapshot_period: 0,
            ..ProcessorConfig::default()
        };
        let mut h = with_snapshots(&log, &observed, cfg, &snapshots);
        let mut rx = h.bus.subscribe();

        h.open();
        assert!(snapshots.latest().is_none());

        h.send(Command::Close);
        h.settle();
        assert_eq!(snapshots.latest().map(|m| m.position), Some(3));
        assert_eq!(snapshots.latest_state().as_deref(), Some(&b"upto-3"[..]));

        // reopened without new events: nothing new to store
        h.open();
        h.send(Command::Close);
        h.settle();
        let written = kinds(&mut rx)
            .into_iter()
            .filter(|k| *k == EventKind::SnapshotWritten)
            .count();
        assert_eq!(written, 1);
    }

    #[test]
    fn test_no_close_snapshot_while_write_is_pending() {
        let log = log_with(2);
        let observed = Arc::new(Observed::default());
        let snapshots = Arc::new(InMemorySnapshotStorage::new());
        let context =
            StreamProcessorContext::builder("p", Arc::new(log.clone()), Arc::new(log.clone()))
                .with_snapshot_storage(snapshots.clone())
                .build();
        let mut h = Harness::with_context(
            &log,
            Scripted::new(&observed).echoing(),
            ProcessorConfig::default(),
            context,
        );

        h.send(Command::Open);
        h.tick_until(|h| h.context.positions().last_processed() == Some(1));
        log.set_write_blocked(true);
        h.tick_until(|h| h.state() == ControllerState::WriteEvent);
        assert_eq!(observed.seen(), vec![1, 2]);

        h.send(Command::Close);
        h.settle();
        assert_eq!(h.state(), ControllerState::Closed);
        // the processor state already includes event 2, which is not processed
        assert!(snapshots.latest().is_none());
    }

    #[test]
    fn test_failed_snapshot_is_reported_and_processing_continues() {
        let log = log_with(0);
        let observed = Arc::new(Observed::default());
        let snapshots = Arc::new(InMemorySnapshotStorage::new());
        let cfg = ProcessorConfig {
            snapshot_period: 1,
            ..ProcessorConfig::default()
        };
        let mut h = with_snapshots(&log, &observed, cfg, &snapshots);
        let mut rx = h.bus.subscribe();
        h.open();

        snapshots.set_failing(true);
        for i in 0..3 {
            log.append(format!("event-{i}"));
        }
        h.settle();
        assert_eq!(h.state(), ControllerState::PollStream);
        assert_eq!(observed.seen(), vec![1, 2, 3]);
        assert!(snapshots.latest().is_none());
        let seen = kinds(&mut rx);
        assert!(seen.contains(&EventKind::SnapshotFailed));
        assert!(!seen.contains(&EventKind::SnapshotWritten));

        snapshots.set_failing(false);
        log.append("event-3");
        h.settle();
        assert_eq!(snapshots.latest().map(|m| m.position), Some(4));
    }

    #[test]
    fn test_filtered_events_count_as_processed() {
        let log = log_with(3);
        let observed = Arc::new(Observed::default());
        let context =
            StreamProcessorContext::builder("p", Arc::new(log.clone()), Arc::new(log.clone()))
                .with_event_filter(|event| event.payload.as_slice() != b"event-1")
                .build();
        let mut h = Harness::with_context(
            &log,
            Scripted::new(&observed),
            ProcessorConfig::default(),
            context,
        );

        h.open();
        assert_eq!(observed.seen(), vec![1, 3]);
        assert_eq!(h.context.positions().last_processed(), Some(3));
        assert_eq!(h.state(), ControllerState::PollStream);
    }

    #[test]
    fn test_suspended_processor_reads_nothing_but_closes() {
        let log = log_with(2);
        let observed = Arc::new(Observed::default());
        observed.suspended.store(true, Ordering::SeqCst);
        let mut h = Harness::new(&log, Scripted::new(&observed), ProcessorConfig::default());

        h.open();
        assert_eq!(h.state(), ControllerState::PollStream);
        assert!(observed.seen().is_empty());
        assert_eq!(h.context.positions().last_read(), None);

        let closed = h.send(Command::Close);
        h.settle();
        assert!(closed.is_done());
        assert_eq!(h.state(), ControllerState::Closed);

        observed.suspended.store(false, Ordering::SeqCst);
        h.open();
        assert_eq!(observed.seen(), vec![1, 2]);
    }

    #[test]
    fn test_log_failure_during_invoke_waits_for_write_event() {
        let log = log_with(1);
        let observed = Arc::new(Observed::default());
        let mut h = Harness::new(&log, Scripted::new(&observed).echoing(), ProcessorConfig::default());

        h.send(Command::Open);
        h.tick_until(|h| h.state() == ControllerState::InvokeProcessor);
        log.fail();
        assert_eq!(h.shared.commands.len(), 1);

        h.tick();
        assert_eq!(h.state(), ControllerState::WriteEvent);
        assert_eq!(h.shared.commands.len(), 1);

        h.tick();
        assert_eq!(h.state(), ControllerState::Failed);
        assert!(h.shared.commands.is_empty());
        assert_eq!(h.context.positions().last_processed(), None);
    }

    #[test]
    fn test_log_failure_in_failed_is_ignored() {
        let log = log_with(1);
        let observed = Arc::new(Observed::default());
        let mut processor = Scripted::new(&observed);
        processor.fail_at = Some((1, ProcessingError::fail("not yet")));
        let mut h = Harness::new(&log, processor, ProcessorConfig::default());
        h.open();
        assert_eq!(h.state(), ControllerState::Failed);
        let mut rx = h.bus.subscribe();

        log.fail();
        h.tick();
        assert_eq!(h.state(), ControllerState::Failed);
        assert!(h.shared.commands.is_empty());
        assert!(!kinds(&mut rx).contains(&EventKind::LogFailed));
    }

    #[test]
    fn test_commands_wait_while_not_accepted() {
        let log = log_with(1);
        let observed = Arc::new(Observed::default());
        let mut h = Harness::new(&log, Scripted::new(&observed), ProcessorConfig::default());

        h.send(Command::Open);
        let closed = h.send(Command::Close);
        // Opening refuses commands: the close stays queued through open and recovery
        h.tick();
        assert_eq!(h.state(), ControllerState::Recovering);
        assert_eq!(h.shared.commands.len(), 1);
        assert!(!closed.is_done());

        h.settle();
        assert!(closed.is_done());
        assert_eq!(h.state(), ControllerState::Closed);
    }

    #[test]
    fn test_teardown_settles_pending_futures() {
        let log = log_with(1);
        let observed = Arc::new(Observed::default());
        let mut h = Harness::new(&log, Scripted::new(&observed), ProcessorConfig::default());
        h.open();

        let queued_open = h.send(Command::Open);
        h.controller.teardown(ActorExitReason::Cancelled);
        assert_eq!(h.state(), ControllerState::Closed);
        assert!(queued_open.is_completed_exceptionally());
        assert_eq!(observed.closed.load(Ordering::SeqCst), 1);
        assert_eq!(log.listener_count(), 0);
    }
}
