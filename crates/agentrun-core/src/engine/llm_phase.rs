//! Single-step model turn: build context, call the model, journal its
//! output, then hand any proposed tool calls to [`super::tool_phase`].
//! Grounded in the teacher's `llm_phase::run_llm_phase`, with the durable-
//! step recheck (§4.5) inserted before the model is ever called again for a
//! step that already has unresolved tool calls on record.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::context::ConversationBuilder;
use crate::model::{JournalPayload, Run, RunResult, RunStatus};
use crate::model_client::FinishReason;

use super::driver::StepOutcome;
use super::tool_phase::{self, ToolCallResult};
use super::RunEngine;

pub(crate) async fn run_step(
    engine: &Arc<RunEngine>,
    run: &Run,
    token: &CancellationToken,
) -> crate::error::Result<StepOutcome> {
    let entries = engine.journal.list(run.id, 0).await?;

    if !entries
        .iter()
        .any(|e| matches!(e.payload, JournalPayload::RunStarted { .. }))
    {
        engine
            .journal_append_and_publish(
                run.id,
                JournalPayload::RunStarted {
                    task: run.task.clone(),
                    max_steps: run.config.max_steps,
                    agent_kind: run.agent_kind.clone(),
                },
                None,
            )
            .await?;
    }

    let current_step = entries.iter().filter_map(|e| e.step_number).max().unwrap_or(0);

    if current_step > 0 {
        if let Some(result) =
            tool_phase::resolve_pending(engine, run.id, current_step, &entries).await?
        {
            return match result {
                ToolCallResult::Suspended => Ok(StepOutcome::Suspended),
                ToolCallResult::Completed => {
                    finish_step(engine, run, current_step, true, FinishReason::ToolCalls).await
                }
            };
        }
    }

    let step_number = current_step + 1;
    if step_number > run.config.max_steps {
        return terminate(
            engine,
            run.id,
            JournalPayload::RunError {
                error: "step budget exhausted".to_string(),
            },
            RunStatus::Failed,
        )
        .await;
    }

    if token.is_cancelled() {
        return finalize_cancellation(engine, run.id, None).await;
    }

    let context = ConversationBuilder::new(engine.journal.as_ref(), engine.config.max_verbatim_runs)
        .build(run)
        .await?;
    let tool_names: Vec<String> = engine
        .tools
        .schemas()
        .into_iter()
        .map(|schema| schema.name)
        .collect();

    let response = tokio::time::timeout(
        engine.config.model_timeout,
        engine.model.step(&run.config.model, &context, &tool_names),
    )
    .await
    .map_err(|_| crate::error::EngineError::Timeout(engine.config.model_timeout.as_millis() as u64))??;

    if let Some(text) = response.text.filter(|t| !t.is_empty()) {
        engine
            .journal_append_and_publish(
                run.id,
                JournalPayload::Text { text },
                Some(step_number),
            )
            .await?;
    }

    let task_completed_sentinel = response
        .tool_calls
        .iter()
        .any(|call| call.name == crate::tools::COMPLETE_TASK_TOOL_NAME);

    for (index, call) in response.tool_calls.iter().enumerate() {
        if token.is_cancelled() {
            return finalize_cancellation(engine, run.id, None).await;
        }
        match tool_phase::execute_fresh(engine, run.id, step_number, index, call).await? {
            ToolCallResult::Completed => continue,
            ToolCallResult::Suspended => return Ok(StepOutcome::Suspended),
        }
    }

    finish_step(
        engine,
        run,
        step_number,
        !response.tool_calls.is_empty() && !task_completed_sentinel,
        if task_completed_sentinel {
            FinishReason::Stop
        } else {
            response.finish_reason
        },
    )
    .await
}

async fn finish_step(
    engine: &Arc<RunEngine>,
    run: &Run,
    step_number: u32,
    had_tool_calls: bool,
    finish_reason: FinishReason,
) -> crate::error::Result<StepOutcome> {
    engine
        .journal_append_and_publish(
            run.id,
            JournalPayload::StepComplete { step_number },
            Some(step_number),
        )
        .await?;

    if !had_tool_calls && finish_reason == FinishReason::Stop {
        return terminate(
            engine,
            run.id,
            JournalPayload::RunComplete {
                success: true,
                message: None,
                steps: step_number,
            },
            RunStatus::Completed,
        )
        .await;
    }

    if step_number >= run.config.max_steps {
        return terminate(
            engine,
            run.id,
            JournalPayload::RunError {
                error: "step budget exhausted".to_string(),
            },
            RunStatus::Failed,
        )
        .await;
    }

    Ok(StepOutcome::Continue)
}

async fn terminate(
    engine: &Arc<RunEngine>,
    run_id: uuid::Uuid,
    payload: JournalPayload,
    status: RunStatus,
) -> crate::error::Result<StepOutcome> {
    let result = match &payload {
        JournalPayload::RunComplete { success, message, steps } => Some(RunResult {
            success: *success,
            message: message.clone(),
            steps: *steps,
        }),
        JournalPayload::RunError { error } => Some(RunResult {
            success: false,
            message: Some(error.clone()),
            steps: 0,
        }),
        _ => None,
    };
    engine.journal_append_and_publish(run_id, payload, None).await?;
    engine.journal.set_run_status(run_id, status, result).await?;
    Ok(StepOutcome::Terminal)
}

pub(crate) async fn finalize_cancellation(
    engine: &Arc<RunEngine>,
    run_id: uuid::Uuid,
    reason: Option<String>,
) -> crate::error::Result<StepOutcome> {
    terminate(
        engine,
        run_id,
        JournalPayload::RunCancelled { reason },
        RunStatus::Cancelled,
    )
    .await
}
