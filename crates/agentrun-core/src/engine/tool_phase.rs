//! Tool-call handling for a single step: dispatching fresh proposals and
//! resuming ones left dangling by a suspension or a crash. Grounded in the
//! teacher's `tool_phase::run_tool_phase` (`ToolPhaseOutcome`), narrowed to
//! the engine's durable-step discipline instead of in-memory batching.

use std::sync::Arc;

use serde_json::Value;

use crate::model::{
    ApprovalStatus, JournalEntry, JournalPayload, ProposedToolCall, RunId,
};
use crate::tools::{ToolClassification, ToolExecutionContext};

use super::{tool_call_id, RunEngine};

/// Result of attempting to advance a single proposed tool call.
pub(crate) enum ToolCallResult {
    /// The call completed (successfully or not) and a `tool-complete` entry
    /// was appended; the step may continue to the next tool call.
    Completed,
    /// The call requires human approval and the run has suspended; the
    /// caller must stop processing this step entirely.
    Suspended,
}

/// Execute (or gate) a tool call the model just proposed, in step order.
pub(crate) async fn execute_fresh(
    engine: &Arc<RunEngine>,
    run_id: RunId,
    step_number: u32,
    index: usize,
    call: &ProposedToolCall,
) -> crate::error::Result<ToolCallResult> {
    let tcid = tool_call_id(run_id, step_number, index);

    match engine.tools.classify(&call.name) {
        None => {
            engine
                .journal_append_and_publish(
                    run_id,
                    JournalPayload::ToolComplete {
                        tool_call_id: tcid,
                        output: Value::Null,
                        success: false,
                        summary: "unknown tool".to_string(),
                    },
                    Some(step_number),
                )
                .await?;
            Ok(ToolCallResult::Completed)
        }
        Some(ToolClassification::Safe) => {
            engine
                .journal_append_and_publish(
                    run_id,
                    JournalPayload::ToolStarting {
                        tool_call_id: tcid.clone(),
                        tool_name: call.name.clone(),
                        args: call.arguments.clone(),
                    },
                    Some(step_number),
                )
                .await?;
            run_safe_tool(engine, run_id, step_number, &tcid, &call.name, call.arguments.clone())
                .await?;
            Ok(ToolCallResult::Completed)
        }
        Some(ToolClassification::RequiresApproval) => {
            let approval = engine
                .approvals
                .create(run_id, tcid.clone(), &call.name, call.arguments.clone(), step_number)
                .await?;
            engine
                .journal_append_and_publish(
                    run_id,
                    JournalPayload::ToolProposed {
                        tool_call_id: tcid.clone(),
                        tool_name: call.name.clone(),
                        args: call.arguments.clone(),
                    },
                    Some(step_number),
                )
                .await?;
            let approval_id = approval.id;
            engine
                .journal_append_and_publish(
                    run_id,
                    JournalPayload::RunSuspended {
                        reason: format!("tool `{}` requires approval", call.name),
                        pending_approval_id: approval_id,
                    },
                    Some(step_number),
                )
                .await?;
            engine
                .journal
                .set_run_status(run_id, crate::model::RunStatus::Suspended, None)
                .await?;
            Ok(ToolCallResult::Suspended)
        }
    }
}

/// Resume processing of a step left dangling by suspension or a crash. Scans
/// the already-durable entries for this step looking for a `tool-starting`
/// or `tool-proposed` with no matching `tool-complete`, and either re-runs
/// the side effect (safe tool, crash case) or consults the approval
/// decision (requires-approval tool, suspension case).
pub(crate) async fn resolve_pending(
    engine: &Arc<RunEngine>,
    run_id: RunId,
    step_number: u32,
    entries: &[JournalEntry],
) -> crate::error::Result<Option<ToolCallResult>> {
    let completed_ids: std::collections::HashSet<&str> = entries
        .iter()
        .filter_map(|e| match &e.payload {
            JournalPayload::ToolComplete { tool_call_id, .. } => Some(tool_call_id.as_str()),
            _ => None,
        })
        .collect();

    let dangling_start = entries.iter().find(|e| {
        e.step_number == Some(step_number)
            && matches!(&e.payload, JournalPayload::ToolStarting { tool_call_id, .. } if !completed_ids.contains(tool_call_id.as_str()))
    });
    if let Some(entry) = dangling_start {
        if let JournalPayload::ToolStarting {
            tool_call_id: tcid,
            tool_name,
            args,
        } = &entry.payload
        {
            run_safe_tool(engine, run_id, step_number, tcid, tool_name, args.clone()).await?;
            return Ok(Some(ToolCallResult::Completed));
        }
    }

    let dangling_proposed = entries.iter().find(|e| {
        e.step_number == Some(step_number)
            && matches!(&e.payload, JournalPayload::ToolProposed { tool_call_id, .. } if !completed_ids.contains(tool_call_id.as_str()))
    });
    if let Some(entry) = dangling_proposed {
        if let JournalPayload::ToolProposed {
            tool_call_id: tcid,
            tool_name,
            args,
        } = &entry.payload
        {
            // Look the approval up by its call id regardless of status: by
            // the time a resume drives this path, `RunEngine::resume` has
            // already resolved it, so a pending-only lookup would always
            // come back empty.
            let Some(approval) = engine.approvals.get_by_call(run_id, tcid).await? else {
                // No approval was ever recorded for this call — genuinely
                // orphaned. Treat as still-pending to be safe.
                return Ok(Some(ToolCallResult::Suspended));
            };

            match approval.status {
                ApprovalStatus::Pending => Ok(Some(ToolCallResult::Suspended)),
                ApprovalStatus::Approved => {
                    engine
                        .journal_append_and_publish(
                            run_id,
                            JournalPayload::RunResumed {
                                decision: crate::model::ApprovalDecision::Approved,
                                feedback: None,
                            },
                            Some(step_number),
                        )
                        .await?;
                    engine
                        .journal_append_and_publish(
                            run_id,
                            JournalPayload::ToolStarting {
                                tool_call_id: tcid.clone(),
                                tool_name: tool_name.clone(),
                                args: args.clone(),
                            },
                            Some(step_number),
                        )
                        .await?;
                    run_safe_tool(engine, run_id, step_number, tcid, tool_name, args.clone())
                        .await?;
                    Ok(Some(ToolCallResult::Completed))
                }
                ApprovalStatus::Rejected | ApprovalStatus::Expired => {
                    engine
                        .journal_append_and_publish(
                            run_id,
                            JournalPayload::RunResumed {
                                decision: crate::model::ApprovalDecision::Rejected,
                                feedback: approval.rejection_reason.clone(),
                            },
                            Some(step_number),
                        )
                        .await?;
                    let summary = match &approval.rejection_reason {
                        Some(reason) => format!("rejected: {reason}"),
                        None => "rejected".to_string(),
                    };
                    engine
                        .journal_append_and_publish(
                            run_id,
                            JournalPayload::ToolComplete {
                                tool_call_id: tcid.clone(),
                                output: Value::Null,
                                success: false,
                                summary,
                            },
                            Some(step_number),
                        )
                        .await?;
                    Ok(Some(ToolCallResult::Completed))
                }
            }
        } else {
            unreachable!("matched ToolProposed pattern above")
        }
    } else {
        Ok(None)
    }
}

async fn run_safe_tool(
    engine: &Arc<RunEngine>,
    run_id: RunId,
    step_number: u32,
    tool_call_id: &str,
    tool_name: &str,
    args: Value,
) -> crate::error::Result<()> {
    let ctx = ToolExecutionContext {
        run_id,
        step_number,
        timeout: engine.config.tool_timeout,
    };

    let outcome = match engine.tools.get(tool_name) {
        Some(tool) => tool
            .execute(&ctx, args)
            .await
            .unwrap_or_else(|err| crate::tools::ToolOutcome::failed(err.to_string())),
        None => crate::tools::ToolOutcome::failed("unknown tool"),
    };

    engine
        .journal_append_and_publish(
            run_id,
            JournalPayload::ToolComplete {
                tool_call_id: tool_call_id.to_string(),
                output: outcome.output,
                success: outcome.success,
                summary: outcome.summary,
            },
            Some(step_number),
        )
        .await?;
    Ok(())
}
