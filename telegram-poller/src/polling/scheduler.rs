//! Polling loop and its handle
//!
//! A [`PollingLoop`] owns one tokio task that repeatedly calls `getUpdates`,
//! hands every update to the registered handler and acknowledges the batch by
//! advancing the offset. Failures never stop the task; only [`PollingLoop::cancel`]
//! does.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::config::PollingOptions;
use crate::error::{ErrorKind, PollError, PollResult, PollerError, Result};
use crate::source::{HttpUpdateSource, UpdateSource, UpdatesRequest};
use crate::update::Update;

/// Error type update handlers may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Return type of an update handler.
pub type HandlerResult = std::result::Result<(), HandlerError>;

type Handler = Box<dyn FnMut(Update) -> HandlerResult + Send>;

/// Lifecycle of a polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Created, first request not issued yet
    Idle,
    /// A `getUpdates` request is in flight or its batch is being delivered
    Polling,
    /// Between cycles, waiting for the interval to elapse
    Waiting,
    /// Cancelled; terminal
    Stopped,
}

/// What a single cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A non-empty batch was delivered and acknowledged up to `offset`
    Delivered { count: usize, offset: i64 },
    /// The server had nothing new
    Empty,
    /// The request failed; the offset was left alone
    Failed(ErrorKind),
}

/// Counters for a polling loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollStats {
    pub cycles: u64,
    pub updates_delivered: u64,
    pub failed_cycles: u64,
    pub consecutive_failures: u32,
    pub callback_failures: u64,
    pub last_error: Option<String>,
}

/// State shared between the loop task and its handles.
struct Shared {
    cancelled: AtomicBool,
    wake: Notify,
    offset: AtomicI64,
    state: Mutex<PollState>,
    last_poll_time: Mutex<Option<SystemTime>>,
    stats: Mutex<PollStats>,
}

impl Shared {
    fn new(initial_offset: i64) -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            wake: Notify::new(),
            offset: AtomicI64::new(initial_offset),
            state: Mutex::new(PollState::Idle),
            last_poll_time: Mutex::new(None),
            stats: Mutex::new(PollStats::default()),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            tracing::debug!("Polling cancellation requested");
            self.wake.notify_one();
        }
    }

    fn set_state(&self, next: PollState) {
        let mut state = self.state.lock();
        if *state != PollState::Stopped {
            *state = next;
        }
    }
}

/// Cloneable handle that can only cancel a loop
#[derive(Clone)]
pub struct CancelHandle {
    shared: Arc<Shared>,
}

impl CancelHandle {
    /// Request termination; see [`PollingLoop::cancel`]
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Handle to a running long-polling loop.
///
/// The loop starts as soon as the handle is created and keeps polling until
/// [`cancel`](Self::cancel) is called. Dropping the handle does not stop it.
pub struct PollingLoop {
    shared: Arc<Shared>,
    task_handle: JoinHandle<()>,
}

impl PollingLoop {
    /// Start polling the Bot API for `token`.
    ///
    /// Must be called from within a tokio runtime. `on_update` is invoked
    /// once per update, in the order the server returned them.
    pub fn create<F>(token: &str, options: PollingOptions, on_update: F) -> Result<Self>
    where
        F: FnMut(Update) -> HandlerResult + Send + 'static,
    {
        let source = HttpUpdateSource::new(token, &options)?;
        tracing::info!(endpoint = %source.redacted_endpoint(), "Starting Telegram update polling");
        Self::spawn(source, options, on_update)
    }

    /// Start polling an arbitrary [`UpdateSource`]
    pub fn spawn<S, F>(source: S, options: PollingOptions, on_update: F) -> Result<Self>
    where
        S: UpdateSource + 'static,
        F: FnMut(Update) -> HandlerResult + Send + 'static,
    {
        options.validate()?;
        let runtime = Handle::try_current().map_err(|_| PollerError::NoRuntime)?;

        let shared = Arc::new(Shared::new(options.initial_offset));
        let mut poller = Poller::new(source, options, Box::new(on_update), Arc::clone(&shared));

        let task_handle = runtime.spawn(async move {
            poller.run().await;
        });

        Ok(Self {
            shared,
            task_handle,
        })
    }

    /// Request termination of the loop.
    ///
    /// Idempotent and callable at any time. A request already in flight is
    /// allowed to finish and its batch is still delivered, but no further
    /// request is issued.
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    /// A cloneable handle that can cancel this loop from elsewhere
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    /// Last acknowledged update id
    pub fn offset(&self) -> i64 {
        self.shared.offset.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> PollState {
        *self.shared.state.lock()
    }

    /// When the most recent poll attempt completed, successful or not
    pub fn last_poll_time(&self) -> Option<SystemTime> {
        *self.shared.last_poll_time.lock()
    }

    pub fn stats(&self) -> PollStats {
        self.shared.stats.lock().clone()
    }

    /// Whether the loop task has exited
    pub fn is_finished(&self) -> bool {
        self.task_handle.is_finished()
    }

    /// Wait for the loop to terminate. Only returns after a cancellation.
    pub async fn join(self) -> Result<()> {
        self.task_handle
            .await
            .map_err(|e| PollerError::TaskJoin(e.to_string()))
    }

    /// Cancel the loop and wait for it to stop
    pub async fn shutdown(self) -> Result<()> {
        self.cancel();
        self.join().await
    }
}

impl std::fmt::Debug for PollingLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingLoop")
            .field("offset", &self.offset())
            .field("state", &self.state())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Offset after acknowledging `batch`: the id of its last update.
///
/// The offset never moves backwards, so a batch ending below `current` leaves
/// it unchanged.
pub fn advance_offset(current: i64, batch: &[Update]) -> i64 {
    match batch.last() {
        Some(last) if last.update_id > current => last.update_id,
        _ => current,
    }
}

/// The task side of a polling loop
struct Poller<S> {
    source: S,
    options: PollingOptions,
    handler: Handler,
    shared: Arc<Shared>,
}

impl<S: UpdateSource> Poller<S> {
    fn new(source: S, options: PollingOptions, handler: Handler, shared: Arc<Shared>) -> Self {
        Self {
            source,
            options,
            handler,
            shared,
        }
    }

    async fn run(&mut self) {
        tracing::info!(
            offset = self.shared.offset.load(Ordering::SeqCst),
            timeout_secs = self.options.timeout_secs(),
            interval_ms = self.options.interval.as_millis() as u64,
            "Polling loop started"
        );

        while !self.shared.is_cancelled() {
            let outcome = self.run_cycle().await;
            tracing::trace!(?outcome, "Poll cycle finished");

            if self.shared.is_cancelled() {
                break;
            }

            self.shared.set_state(PollState::Waiting);
            wait_interval(&self.shared, self.options.interval).await;
        }

        self.shared.set_state(PollState::Stopped);
        tracing::info!(
            offset = self.shared.offset.load(Ordering::SeqCst),
            "Polling is aborted"
        );
    }

    /// One request / deliver / acknowledge cycle. Never fails.
    async fn run_cycle(&mut self) -> CycleOutcome {
        self.shared.set_state(PollState::Polling);

        let offset = self.shared.offset.load(Ordering::SeqCst);
        let request = UpdatesRequest::after(offset, &self.options);
        tracing::debug!(offset = request.offset, "Polling for updates");

        let result = self
            .source
            .get_updates(&request)
            .await
            .and_then(reject_unacknowledgeable);
        *self.shared.last_poll_time.lock() = Some(SystemTime::now());

        let outcome = match result {
            Ok(updates) if updates.is_empty() => {
                tracing::trace!("No new updates");
                CycleOutcome::Empty
            }
            Ok(updates) => {
                let count = updates.len();
                let offset = self.deliver(updates);
                CycleOutcome::Delivered { count, offset }
            }
            Err(err) => {
                self.record_failure(&err);
                CycleOutcome::Failed(err.kind())
            }
        };

        let mut stats = self.shared.stats.lock();
        stats.cycles += 1;
        match outcome {
            CycleOutcome::Delivered { count, .. } => {
                stats.updates_delivered += count as u64;
                stats.consecutive_failures = 0;
            }
            CycleOutcome::Empty => stats.consecutive_failures = 0,
            CycleOutcome::Failed(_) => {}
        }

        outcome
    }

    /// Hand each update to the handler, then acknowledge the batch.
    fn deliver(&mut self, updates: Vec<Update>) -> i64 {
        let current = self.shared.offset.load(Ordering::SeqCst);
        let next = advance_offset(current, &updates);
        tracing::debug!(count = updates.len(), "Delivering updates");

        for update in updates {
            let update_id = update.update_id;
            let handler = &mut self.handler;
            let message = match catch_unwind(AssertUnwindSafe(|| handler(update))) {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(payload) => panic_message(&*payload),
            };

            let err = PollError::Callback { update_id, message };
            tracing::warn!(update_id, error = %err, "Update handler failed, continuing with batch");
            let mut stats = self.shared.stats.lock();
            stats.callback_failures += 1;
            stats.last_error = Some(err.to_string());
        }

        if next == current {
            tracing::warn!(offset = current, "Batch did not advance the offset");
        } else {
            self.shared.offset.store(next, Ordering::SeqCst);
            tracing::debug!(offset = next, "Updated offset");
        }
        next
    }

    fn record_failure(&self, err: &PollError) {
        let consecutive = {
            let mut stats = self.shared.stats.lock();
            stats.failed_cycles += 1;
            stats.consecutive_failures = stats.consecutive_failures.saturating_add(1);
            stats.last_error = Some(err.to_string());
            stats.consecutive_failures
        };

        tracing::warn!(
            kind = ?err.kind(),
            error = %err,
            consecutive_failures = consecutive,
            "Polling request failed, retrying after interval"
        );
    }
}

/// Sleep for `interval`, returning early if cancelled
async fn wait_interval(shared: &Shared, interval: Duration) {
    tracing::trace!(
        interval_ms = interval.as_millis() as u64,
        "Waiting before next poll"
    );

    tokio::select! {
        _ = tokio::time::sleep(interval) => {}
        _ = shared.wake.notified() => {}
    }
}

/// A batch ending at `i64::MAX` leaves no id to request next.
fn reject_unacknowledgeable(updates: Vec<Update>) -> PollResult<Vec<Update>> {
    match updates.last() {
        Some(last) if last.update_id == i64::MAX => Err(PollError::Malformed(format!(
            "update_id {} cannot be acknowledged",
            last.update_id
        ))),
        _ => Ok(updates),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
