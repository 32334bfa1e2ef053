//! Debounced autosave for one open document.
//!
//! Every edit replaces the pending snapshot and restarts the quiescence timer;
//! only the snapshot present when the timer expires is written, intermediate
//! ones are dropped. Writes for one document never overlap and leave in the
//! order their timers expired.

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::gateway::SyncGateway;
use crate::node::{Node, NodePatch};


pub const DEFAULT_DELAY: Duration = Duration::from_millis(1500);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    /// Nothing queued and nothing in flight.
    Idle,
    /// A write is waiting for quiescence or is in flight.
    Saving,
    /// The last write matches what the user sees.
    Saved,
}

impl fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveStatus::Idle => f.write_str("idle"),
            SaveStatus::Saving => f.write_str("saving"),
            SaveStatus::Saved => f.write_str("saved"),
        }
    }
}

/// Background retry of a failed write. The n-th retry waits
/// `base_delay * 2^(n-1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            base_delay: Duration::ZERO,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AutosaveConfig {
    pub delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_DELAY,
            retry: RetryPolicy::default(),
        }
    }
}

impl AutosaveConfig {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn without_retry(mut self) -> Self {
        self.retry = RetryPolicy::disabled();
        self
    }
}

struct State {
    latest: Option<Node>,
    timer: Option<JoinHandle<()>>,
    // bumped by every edit, flush and cancel; a timer or a finished write
    // from an older generation must not touch the status
    generation: u64,
    attempts: u32,
}

struct Inner {
    doc_id: Uuid,
    gateway: Arc<dyn SyncGateway>,
    config: AutosaveConfig,
    state: Mutex<State>,
    flight: AsyncMutex<()>,
    // writes taken out of `latest` that have not finished yet
    writes: watch::Sender<u32>,
    status: watch::Sender<SaveStatus>,
}

/// Counts one committed write until dropped, even if the write is abandoned.
struct WriteTicket<'a> {
    writes: &'a watch::Sender<u32>,
}

impl<'a> WriteTicket<'a> {
    // call with the state lock held, in the same section that takes `latest`
    fn issue(writes: &'a watch::Sender<u32>) -> Self {
        writes.send_modify(|n| *n += 1);
        Self { writes }
    }
}

impl Drop for WriteTicket<'_> {
    fn drop(&mut self) {
        self.writes.send_modify(|n| *n = n.saturating_sub(1));
    }
}

impl Inner {
    fn schedule(inner: &Arc<Inner>, state: &mut State, wait: Duration) {
        if let Some(handle) = state.timer.take() {
            handle.abort();
        }
        let generation = state.generation;
        state.timer = Some(tokio::spawn(Self::expire(inner.clone(), generation, wait)));
    }

    async fn expire(inner: Arc<Inner>, generation: u64, wait: Duration) {
        sleep(wait).await;
        let (snapshot, ticket) = {
            let mut state = inner.state.lock();
            if state.generation != generation {
                return;
            }
            // past this point the task is no longer abortable by an edit
            state.timer = None;
            let Some(snapshot) = state.latest.take() else {
                return;
            };
            inner.status.send_replace(SaveStatus::Saving);
            (snapshot, WriteTicket::issue(&inner.writes))
        };
        let _ = Self::write(&inner, snapshot, generation, ticket).await;
    }

    async fn write(
        inner: &Arc<Inner>,
        snapshot: Node,
        generation: u64,
        _ticket: WriteTicket<'_>,
    ) -> Result<Node> {
        let _flight = inner.flight.lock().await;
        debug!(id = %inner.doc_id, generation, "writing autosave");
        let result = inner
            .gateway
            .update(inner.doc_id, NodePatch::from_snapshot(&snapshot))
            .await;

        let mut state = inner.state.lock();
        if state.generation != generation {
            // a newer edit owns the status and has its own timer
            return result;
        }
        match &result {
            Ok(_) => {
                state.attempts = 0;
                inner.status.send_replace(SaveStatus::Saved);
            }
            Err(e) => {
                inner.status.send_replace(SaveStatus::Idle);
                state.latest = Some(snapshot);
                let retry = inner.config.retry;
                if state.attempts < retry.max_attempts {
                    state.attempts += 1;
                    let wait = retry.delay_for(state.attempts);
                    warn!(id = %inner.doc_id, error = %e, attempt = state.attempts, retry_in = ?wait, "autosave failed");
                    Self::schedule(inner, &mut state, wait);
                } else if retry.max_attempts > 0 {
                    error!(id = %inner.doc_id, error = %e, "autosave failed, giving up");
                } else {
                    warn!(id = %inner.doc_id, error = %e, "autosave failed");
                }
            }
        }
        result
    }
}

/// Write scheduler for a single document; clones share the same schedule.
#[derive(Clone)]
pub struct AutosaveCoordinator {
    inner: Arc<Inner>,
}

impl AutosaveCoordinator {
    pub fn new(doc_id: Uuid, gateway: Arc<dyn SyncGateway>, config: AutosaveConfig) -> Self {
        let (status, _) = watch::channel(SaveStatus::Idle);
        let (writes, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                doc_id,
                gateway,
                config,
                state: Mutex::new(State {
                    latest: None,
                    timer: None,
                    generation: 0,
                    attempts: 0,
                }),
                flight: AsyncMutex::new(()),
                writes,
                status,
            }),
        }
    }

    pub fn doc_id(&self) -> Uuid {
        self.inner.doc_id
    }

    pub fn status(&self) -> SaveStatus {
        *self.inner.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.inner.status.subscribe()
    }

    /// True while an edit is queued, in flight, or failed without a
    /// successful write since.
    pub fn has_unsaved_changes(&self) -> bool {
        let state = self.inner.state.lock();
        state.latest.is_some() || self.status() == SaveStatus::Saving
    }

    /// Queue `snapshot` as the latest state and restart the quiescence timer.
    /// Must be called from within a tokio runtime.
    pub fn record(&self, snapshot: Node) -> Result<()> {
        if snapshot.id != self.inner.doc_id {
            return Err(Error::validation(format!(
                "snapshot of {} sent to autosave for {}",
                snapshot.id, self.inner.doc_id
            )));
        }
        let mut state = self.inner.state.lock();
        state.generation += 1;
        state.attempts = 0;
        state.latest = Some(snapshot);
        Inner::schedule(&self.inner, &mut state, self.inner.config.delay);
        self.inner.status.send_replace(SaveStatus::Saving);
        debug!(id = %self.inner.doc_id, generation = state.generation, "autosave scheduled");
        Ok(())
    }

    /// Cancel the timer and write the pending snapshot now. With nothing
    /// pending, waits until every write already taken off the queue finished.
    pub async fn flush(&self) -> Result<()> {
        let pending = {
            let mut state = self.inner.state.lock();
            match state.latest.take() {
                Some(snapshot) => {
                    if let Some(handle) = state.timer.take() {
                        handle.abort();
                    }
                    state.generation += 1;
                    self.inner.status.send_replace(SaveStatus::Saving);
                    let ticket = WriteTicket::issue(&self.inner.writes);
                    Some((snapshot, state.generation, ticket))
                }
                None => None,
            }
        };
        match pending {
            Some((snapshot, generation, ticket)) => {
                Inner::write(&self.inner, snapshot, generation, ticket).await?;
            }
            None => {
                let mut writes = self.inner.writes.subscribe();
                // the sender lives in `inner`, which we hold
                let _ = writes.wait_for(|n| *n == 0).await;
            }
        }
        Ok(())
    }

    /// Drop the timer and the pending snapshot without writing.
    pub fn cancel(&self) {
        let mut state = self.inner.state.lock();
        if let Some(handle) = state.timer.take() {
            handle.abort();
        }
        state.generation += 1;
        state.latest = None;
        state.attempts = 0;
        self.inner.status.send_replace(SaveStatus::Idle);
    }
}
