//! The per-run driver loop: repeatedly takes one step until the run
//! reaches a terminal state or suspends for approval. Grounded in the
//! teacher's `Runner for LoopRunner` split (`run_llm_phase`/`run_tool_phase`
//! called in a loop by `LoopRunner::start`'s spawned task).

use std::sync::Arc;

use crate::model::{JournalPayload, RunStatus};

use super::{llm_phase, RunEngine};

/// Outcome of a single step, deciding what the driver loop does next.
pub(crate) enum StepOutcome {
    /// The step completed and another step should be taken immediately.
    Continue,
    /// The run suspended waiting for a human decision; the driver exits and
    /// releases its lease. A later `resume` call spawns a fresh driver.
    Suspended,
    /// The run reached a terminal state (`completed`, `failed`, or
    /// `cancelled`); the driver exits for good.
    Terminal,
}

pub(crate) async fn drive(engine: Arc<RunEngine>, run_id: uuid::Uuid) {
    loop {
        match step_once(&engine, run_id).await {
            Ok(StepOutcome::Continue) => continue,
            Ok(StepOutcome::Suspended) => break,
            Ok(StepOutcome::Terminal) => {
                engine.bus.retire(run_id);
                break;
            }
            Err(err) => {
                tracing::error!(run_id = %run_id, error = %err, "run driver failed, marking run-error");
                let _ = engine
                    .journal_append_and_publish(
                        run_id,
                        JournalPayload::RunError {
                            error: err.to_string(),
                        },
                        None,
                    )
                    .await;
                let _ = engine
                    .journal
                    .set_run_status(run_id, RunStatus::Failed, None)
                    .await;
                engine.bus.retire(run_id);
                break;
            }
        }
    }
}

async fn step_once(
    engine: &Arc<RunEngine>,
    run_id: uuid::Uuid,
) -> crate::error::Result<StepOutcome> {
    let token = engine.cancellation_token(run_id);
    if token.is_cancelled() {
        return llm_phase::finalize_cancellation(engine, run_id, None).await;
    }

    let run = engine.journal.get_run(run_id).await?;
    if run.status.is_terminal() {
        return Ok(StepOutcome::Terminal);
    }

    llm_phase::run_step(engine, &run, &token).await
}
