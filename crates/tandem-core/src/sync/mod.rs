//! The live sync engine: keeps local plan state and the remote document
//! eventually consistent without feedback loops or write storms.
//!
//! One engine task per attached plan multiplexes four event sources with
//! `tokio::select!`: the store subscription, local edits, the debounce
//! deadline, and the retry deadline. Local state is published on a watch
//! channel (read-only consumers like the TUI just clone a receiver);
//! health is published on a second watch channel so a "not saved"
//! indicator can be shown instead of losing writes silently.

mod engine;
pub(crate) mod writes;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use tandem_store::models::TravelPlan;
use tandem_store::{PlanStore, PlanStream, StoreError};

use engine::EngineCore;
use writes::{RetryQueue, WriteOp};

pub use engine::Edit;

/// Tuning knobs for the engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Quiet period before a burst of date edits is flushed.
    pub debounce: Duration,
    /// First retry delay for a failed write; doubles per attempt.
    pub retry_base: Duration,
    /// Ceiling for the retry delay.
    pub retry_cap: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1000),
            retry_base: Duration::from_millis(500),
            retry_cap: Duration::from_secs(30),
        }
    }
}

/// Engine health, published on every state change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    /// The subscription is attached and delivering snapshots.
    pub live: bool,
    /// Local edits exist that the store has not acknowledged yet.
    pub dirty: bool,
    /// Most recent write failure, cleared once the queue drains.
    pub last_error: Option<String>,
}

/// The engine task is gone (cancelled, or its subscription ended).
#[derive(Debug, Error)]
#[error("sync engine has stopped")]
pub struct EngineStopped;

/// Client handle to a running engine.
pub struct SyncHandle {
    edits: mpsc::Sender<Edit>,
    state: watch::Receiver<TravelPlan>,
    status: watch::Receiver<SyncStatus>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Submit a local edit. Local state updates synchronously inside the
    /// engine; the store write follows (debounced for date edits).
    pub async fn edit(&self, edit: Edit) -> Result<(), EngineStopped> {
        self.edits.send(edit).await.map_err(|_| EngineStopped)
    }

    /// Watch the local plan state.
    pub fn state(&self) -> watch::Receiver<TravelPlan> {
        self.state.clone()
    }

    /// Watch engine health.
    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.status.clone()
    }

    /// The current local snapshot.
    pub fn current_plan(&self) -> TravelPlan {
        self.state.borrow().clone()
    }

    /// Stop the engine, flushing pending writes best-effort first.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// Attach an engine to `plan_id` on behalf of `identity`.
///
/// Subscribes (which enforces the store's read rule), seeds local state
/// from the initial snapshot, and spawns the engine task.
pub async fn attach(
    store: Arc<dyn PlanStore>,
    plan_id: &str,
    identity: &str,
    config: SyncConfig,
) -> Result<SyncHandle, StoreError> {
    let mut stream = store.subscribe(plan_id, identity).await?;
    let initial = stream
        .next()
        .await
        .ok_or_else(|| StoreError::SubscriptionLost {
            path: format!("travelPlans/{plan_id}"),
        })?;

    let core = EngineCore::new(initial.clone());

    let (state_tx, state_rx) = watch::channel(initial);
    let (status_tx, status_rx) = watch::channel(SyncStatus {
        live: true,
        ..SyncStatus::default()
    });
    let (edit_tx, edit_rx) = mpsc::channel(32);
    let cancel = CancellationToken::new();

    let task = tokio::spawn(run_engine(
        store,
        plan_id.to_owned(),
        config,
        core,
        stream,
        edit_rx,
        state_tx,
        status_tx,
        cancel.clone(),
    ));

    Ok(SyncHandle {
        edits: edit_tx,
        state: state_rx,
        status: status_rx,
        cancel,
        task,
    })
}

/// Issue each op; failures go to the retry queue instead of being lost.
async fn flush_ops(
    store: &dyn PlanStore,
    plan_id: &str,
    ops: Vec<WriteOp>,
    retry: &mut RetryQueue,
    last_error: &mut Option<String>,
) {
    for op in ops {
        if let Err(e) = op.apply(store, plan_id).await {
            tracing::warn!(
                plan_id = %plan_id,
                op = op.describe(),
                error = %e,
                "write failed, queueing for retry"
            );
            *last_error = Some(e.to_string());
            retry.push_failed(op, 0);
        }
    }
}

/// Re-issue every due retry; repeated failures back off further.
async fn flush_due_retries(
    store: &dyn PlanStore,
    plan_id: &str,
    retry: &mut RetryQueue,
    now: Instant,
    last_error: &mut Option<String>,
) {
    for pending in retry.take_due(now) {
        if let Err(e) = pending.op.apply(store, plan_id).await {
            tracing::warn!(
                plan_id = %plan_id,
                op = pending.op.describe(),
                attempt = pending.attempt + 1,
                error = %e,
                "retry failed"
            );
            *last_error = Some(e.to_string());
            retry.push_failed(pending.op, pending.attempt + 1);
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_engine(
    store: Arc<dyn PlanStore>,
    plan_id: String,
    config: SyncConfig,
    mut core: EngineCore,
    mut stream: PlanStream,
    mut edits: mpsc::Receiver<Edit>,
    state_tx: watch::Sender<TravelPlan>,
    status_tx: watch::Sender<SyncStatus>,
    cancel: CancellationToken,
) {
    let mut retry = RetryQueue::new(config.retry_base, config.retry_cap);
    let mut debounce_due: Option<Instant> = None;
    let mut last_error: Option<String> = None;
    let mut live = true;

    // The initial snapshot may have scheduled a self-heal write.
    let heal = core.take_immediate();
    if !heal.is_empty() {
        let _ = state_tx.send(core.plan().clone());
        flush_ops(&*store, &plan_id, heal, &mut retry, &mut last_error).await;
    }

    loop {
        let deadline = match (debounce_due, retry.next_due()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                // Final best-effort flush of anything still pending.
                if let Some(ops) = core.take_pending_dates() {
                    flush_ops(&*store, &plan_id, ops, &mut retry, &mut last_error).await;
                }
                let remaining: Vec<WriteOp> =
                    retry.take_all().into_iter().map(|p| p.op).collect();
                for op in remaining {
                    if let Err(e) = op.apply(&*store, &plan_id).await {
                        tracing::warn!(
                            plan_id = %plan_id,
                            op = op.describe(),
                            error = %e,
                            "write lost at shutdown"
                        );
                        last_error = Some(e.to_string());
                    }
                }
                live = false;
                break;
            }

            maybe_snapshot = stream.next() => match maybe_snapshot {
                Some(snapshot) => {
                    core.apply_remote(snapshot);
                    let _ = state_tx.send(core.plan().clone());
                    // Only the self-heal repair can be scheduled here.
                    let ops = core.take_immediate();
                    flush_ops(&*store, &plan_id, ops, &mut retry, &mut last_error).await;
                }
                None => {
                    tracing::warn!(plan_id = %plan_id, "plan subscription ended");
                    live = false;
                    break;
                }
            },

            maybe_edit = edits.recv() => match maybe_edit {
                Some(edit) => {
                    core.apply_edit(edit);
                    let _ = state_tx.send(core.plan().clone());
                    if core.has_pending_dates() {
                        // Any further date edit inside the quiet period
                        // restarts it.
                        debounce_due = Some(Instant::now() + config.debounce);
                    }
                    let ops = core.take_immediate();
                    flush_ops(&*store, &plan_id, ops, &mut retry, &mut last_error).await;
                }
                None => {
                    // Every handle dropped; flush what we can and stop.
                    if let Some(ops) = core.take_pending_dates() {
                        flush_ops(&*store, &plan_id, ops, &mut retry, &mut last_error).await;
                    }
                    live = false;
                    break;
                }
            },

            _ = async { tokio::time::sleep_until(deadline.unwrap()).await },
                    if deadline.is_some() => {
                let now = Instant::now();
                if debounce_due.is_some_and(|d| d <= now) {
                    debounce_due = None;
                    if let Some(ops) = core.take_pending_dates() {
                        flush_ops(&*store, &plan_id, ops, &mut retry, &mut last_error).await;
                    }
                }
                flush_due_retries(&*store, &plan_id, &mut retry, now, &mut last_error).await;
            }
        }

        if retry.is_empty() && !core.has_pending_dates() {
            last_error = None;
        }
        let _ = status_tx.send(SyncStatus {
            live,
            dirty: !retry.is_empty() || core.has_pending_dates(),
            last_error: last_error.clone(),
        });
    }

    let _ = status_tx.send(SyncStatus {
        live: false,
        dirty: !retry.is_empty() || core.has_pending_dates(),
        last_error,
    });
}
