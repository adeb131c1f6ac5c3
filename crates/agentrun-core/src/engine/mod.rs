//! Run Engine: drives a single run from `pending` to a terminal state,
//! interleaving model turns and tool invocations, respecting approvals, and
//! producing an ordered, durable journal. Generalizes the teacher's
//! `roci_core::agent_loop::runner` (`LoopRunner`/`Runner`,
//! `engine::{llm_phase, tool_phase}`) from an in-memory-only agent loop into
//! one whose every side effect is checkpointed against the journal.

mod driver;
mod llm_phase;
mod tool_phase;

use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::approvals::ApprovalRegistry;
use crate::bus::EventBus;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::journal::JournalStore;
use crate::model::{ApprovalDecision, RunId, ToolCallId};
use crate::model_client::ModelClient;
use crate::tools::ToolRegistry;

/// Derive a tool-call-id deterministically from the run, step, and the
/// call's position within the model's response — spec §4.5's "durable step"
/// requirement for tool-call-id generation, so retries after a crash
/// reproduce the same id and dedupe against prior partial journal entries.
pub fn tool_call_id(run_id: RunId, step_number: u32, index: usize) -> ToolCallId {
    format!("{run_id}:{step_number}:{index}")
}

/// Per-run in-memory lease held by whichever process is actively driving a
/// run — the in-memory half of the single-writer lease described in spec
/// §5; the durable half is the `runs.status` CAS transition in
/// [`JournalStore::try_acquire_run`].
type RunLeases = DashMap<RunId, ()>;

/// Drives runs to completion. One `RunEngine` instance is shared (behind an
/// `Arc`) by every in-process driver task and by the HTTP surface.
pub struct RunEngine {
    pub(crate) journal: Arc<dyn JournalStore>,
    pub(crate) approvals: Arc<dyn ApprovalRegistry>,
    pub(crate) tools: ToolRegistry,
    pub(crate) model: Arc<dyn ModelClient>,
    pub(crate) bus: Arc<EventBus>,
    pub(crate) config: EngineConfig,
    leases: RunLeases,
    cancellations: DashMap<RunId, CancellationToken>,
}

impl RunEngine {
    pub fn new(
        journal: Arc<dyn JournalStore>,
        approvals: Arc<dyn ApprovalRegistry>,
        tools: ToolRegistry,
        model: Arc<dyn ModelClient>,
        bus: Arc<EventBus>,
        config: EngineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            journal,
            approvals,
            tools,
            model,
            bus,
            config,
            leases: DashMap::new(),
            cancellations: DashMap::new(),
        })
    }

    /// Begin driving a `pending` (or previously `suspended`, now resumed)
    /// run. Spawns the driver task and returns immediately; progress is
    /// observed via [`RunEngine::subscribe`] or by polling
    /// `JournalStore::get_run`.
    pub async fn start(self: &Arc<Self>, run_id: RunId) -> Result<()> {
        self.acquire_and_spawn(run_id).await
    }

    /// Resolve the run's pending approval and, if the decision wakes the
    /// run, resume driving it. `feedback` is carried as the rejection
    /// reason when `decision` is `Rejected`.
    pub async fn resume(
        self: &Arc<Self>,
        run_id: RunId,
        decision: ApprovalDecision,
        feedback: Option<String>,
    ) -> Result<()> {
        let pending = self
            .approvals
            .pending_for_run(run_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("no pending approval for run {run_id}")))?;

        let resolved = self
            .approvals
            .resolve(pending.id, decision, feedback)
            .await?;
        if !resolved {
            return Err(EngineError::conflict(
                "approval was already resolved by a concurrent request",
            ));
        }

        self.acquire_and_spawn(run_id).await
    }

    /// Request cooperative cancellation. If a driver task is currently
    /// running the run, it observes the token at its next checkpoint and
    /// terminates the run as `cancelled`. If the run is currently
    /// `suspended` (no driver task holds it), cancellation is applied
    /// immediately: per spec's resolved Open Question, the engine appends
    /// `run-cancelled` directly and leaves any pending approval orphaned
    /// rather than resolving it.
    pub async fn cancel(self: &Arc<Self>, run_id: RunId, reason: Option<String>) -> Result<()> {
        let run = self.journal.get_run(run_id).await?;
        if run.status.is_terminal() {
            return Ok(());
        }

        self.cancellations
            .entry(run_id)
            .or_insert_with(CancellationToken::new)
            .cancel();

        if run.status == crate::model::RunStatus::Suspended {
            self.journal_append_and_publish(
                run_id,
                crate::model::JournalPayload::RunCancelled { reason },
                None,
            )
            .await?;
            self.journal
                .set_run_status(run_id, crate::model::RunStatus::Cancelled, None)
                .await?;
            self.bus.retire(run_id);
        }

        Ok(())
    }

    /// Subscribe to this run's entries: first every entry already durable
    /// past `since_sequence`, then a live tail until a terminal entry or the
    /// subscriber disconnects. Implements spec §4.2's replay-then-follow
    /// algorithm directly against the journal and bus this engine owns.
    pub fn subscribe(
        self: &Arc<Self>,
        run_id: RunId,
        since_sequence: u64,
    ) -> impl futures::Stream<Item = Result<crate::model::JournalEntry>> + 'static {
        let engine = Arc::clone(self);
        async_stream::try_stream! {
            let backlog = engine.journal.list(run_id, since_sequence).await?;
            let mut last_sequence = since_sequence;
            for entry in backlog {
                last_sequence = entry.sequence;
                let terminal = entry.payload.is_terminal();
                yield entry;
                if terminal {
                    return;
                }
            }

            let mut rx = engine.bus.subscribe(run_id);
            loop {
                match rx.recv().await {
                    Ok(entry) => {
                        if entry.sequence <= last_sequence {
                            continue;
                        }
                        last_sequence = entry.sequence;
                        let terminal = entry.payload.is_terminal();
                        yield entry;
                        if terminal {
                            return;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(run_id = %run_id, skipped, "subscriber lagged, resyncing from storage");
                        let catchup = engine.journal.list(run_id, last_sequence).await?;
                        for entry in catchup {
                            last_sequence = entry.sequence;
                            let terminal = entry.payload.is_terminal();
                            yield entry;
                            if terminal {
                                return;
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                }
            }
        }
    }

    /// The journal backing this engine. Exposed so callers (and tests) can
    /// read run/session state without going through HTTP.
    pub fn journal(&self) -> &Arc<dyn JournalStore> {
        &self.journal
    }

    /// The approval registry backing this engine.
    pub fn approvals(&self) -> &Arc<dyn ApprovalRegistry> {
        &self.approvals
    }

    /// Periodically resolve pending approvals older than
    /// `config.approval_timeout` as rejected. Intended to be spawned once
    /// per process lifetime by the server binary.
    pub async fn run_approval_expiry_sweep(self: Arc<Self>) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            if let Err(err) = self.sweep_expired_approvals().await {
                tracing::warn!(error = %err, "approval expiry sweep failed");
            }
        }
    }

    async fn sweep_expired_approvals(&self) -> Result<()> {
        let expired = self
            .approvals
            .list_expired(self.config.approval_timeout.as_secs() as i64)
            .await?;
        for approval in expired {
            let resolved = self
                .approvals
                .resolve(
                    approval.id,
                    ApprovalDecision::Rejected,
                    Some("timed out".to_string()),
                )
                .await?;
            if resolved {
                tracing::info!(run_id = %approval.run_id, approval_id = %approval.id, "approval expired, auto-rejected");
            }
        }
        Ok(())
    }

    async fn acquire_and_spawn(self: &Arc<Self>, run_id: RunId) -> Result<()> {
        let acquired = self.journal.try_acquire_run(run_id).await?;
        if !acquired {
            return Err(EngineError::conflict(format!(
                "run {run_id} is not in a pending or suspended state"
            )));
        }
        self.leases.insert(run_id, ());
        self.cancellations
            .entry(run_id)
            .or_insert_with(CancellationToken::new);

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            driver::drive(engine.clone(), run_id).await;
            engine.leases.remove(&run_id);
        });

        Ok(())
    }

    fn cancellation_token(&self, run_id: RunId) -> CancellationToken {
        self.cancellations
            .entry(run_id)
            .or_insert_with(CancellationToken::new)
            .clone()
    }

    /// Append an entry and immediately publish it to any live subscribers.
    /// Every side-effecting step in the driver goes through this instead of
    /// calling `journal.append` directly, so the bus never falls behind the
    /// durable record.
    pub(crate) async fn journal_append_and_publish(
        &self,
        run_id: RunId,
        payload: crate::model::JournalPayload,
        step_number: Option<u32>,
    ) -> Result<crate::model::JournalEntry> {
        let entry = self.journal.append(run_id, payload, step_number).await?;
        self.bus.publish(run_id, entry.clone());
        Ok(entry)
    }
}
