//! Session history assembly: turns a session's prior runs and a run's own
//! partial journal into the message list a [`crate::model_client::ModelClient`]
//! call needs. Grounded in the teacher's conversation-assembly step at the
//! top of `agent_loop::runner::engine::llm_phase`, generalized to read from
//! the durable journal instead of an in-memory transcript.

use crate::error::Result;
use crate::journal::JournalStore;
use crate::model::{ConversationMessage, JournalPayload, MessageRole, Run, RunId};

/// Builds model-ready conversation context from journal history.
///
/// The last `max_verbatim_runs` completed runs in a session are included in
/// full, translated to `user`/`assistant` message pairs; runs beyond that
/// window are collapsed to a single deterministic summary line. Failed and
/// still-running runs are excluded entirely (spec §4.5 step 1) — a failed
/// run is not useful context and a running one hasn't got a result yet.
pub struct ConversationBuilder<'a> {
    journal: &'a dyn JournalStore,
    max_verbatim_runs: usize,
}

impl<'a> ConversationBuilder<'a> {
    pub fn new(journal: &'a dyn JournalStore, max_verbatim_runs: usize) -> Self {
        Self {
            journal,
            max_verbatim_runs,
        }
    }

    /// Assemble context for `run`, whose own (possibly partial) journal is
    /// translated and appended after prior-run history, followed by the
    /// task as the final user message.
    pub async fn build(&self, run: &Run) -> Result<Vec<ConversationMessage>> {
        let mut messages = Vec::new();

        let mut prior_runs: Vec<Run> = self
            .journal
            .list_runs(run.session_id)
            .await?
            .into_iter()
            .filter(|r| r.id != run.id)
            .filter(|r| r.status == crate::model::RunStatus::Completed)
            .collect();
        prior_runs.sort_by_key(|r| r.run_number);

        let split = prior_runs.len().saturating_sub(self.max_verbatim_runs);
        let (elided, verbatim) = prior_runs.split_at(split);

        for run in elided {
            if let Some(summary) = self.summarize_run(run).await {
                messages.push(ConversationMessage {
                    role: MessageRole::Assistant,
                    content: summary,
                    tool_calls: Vec::new(),
                    tool_call_id: None,
                });
            }
        }

        for prior in verbatim {
            messages.push(ConversationMessage {
                role: MessageRole::User,
                content: prior.task.clone(),
                tool_calls: Vec::new(),
                tool_call_id: None,
            });
            messages.extend(self.translate_entries(prior.id).await?);
        }

        messages.push(ConversationMessage {
            role: MessageRole::User,
            content: run.task.clone(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        });
        messages.extend(self.translate_entries(run.id).await?);

        Ok(messages)
    }

    /// Best-effort one-line summary of an elided run. Never fails the
    /// caller — an unreadable prior run is dropped from context with a
    /// warning rather than blocking the new run from starting.
    async fn summarize_run(&self, run: &Run) -> Option<String> {
        match self.journal.list(run.id, 0).await {
            Ok(entries) => {
                let steps = entries
                    .iter()
                    .filter(|e| matches!(e.payload, JournalPayload::StepComplete { .. }))
                    .count();
                let outcome = run
                    .result
                    .as_ref()
                    .map(|r| {
                        if r.success {
                            "succeeded".to_string()
                        } else {
                            r.message.clone().unwrap_or_else(|| "failed".to_string())
                        }
                    })
                    .unwrap_or_else(|| "ended".to_string());
                Some(format!("{} → {outcome}, {steps} steps", run.task))
            }
            Err(err) => {
                tracing::warn!(run_id = %run.id, error = %err, "dropping unreadable prior run from context");
                None
            }
        }
    }

    async fn translate_entries(&self, run_id: RunId) -> Result<Vec<ConversationMessage>> {
        let entries = self.journal.list(run_id, 0).await?;
        let mut messages = Vec::new();

        for entry in entries {
            match entry.payload {
                JournalPayload::Text { text } => messages.push(ConversationMessage {
                    role: MessageRole::Assistant,
                    content: text,
                    tool_calls: Vec::new(),
                    tool_call_id: None,
                }),
                JournalPayload::ToolComplete {
                    tool_call_id,
                    summary,
                    ..
                } => messages.push(ConversationMessage {
                    role: MessageRole::Tool,
                    content: summary,
                    tool_calls: Vec::new(),
                    tool_call_id: Some(tool_call_id),
                }),
                _ => {}
            }
        }

        Ok(messages)
    }
}
