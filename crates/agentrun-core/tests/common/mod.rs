use std::sync::Arc;
use std::time::Duration;

use agentrun_core::prelude::*;
use agentrun_core::model::Run;

/// Build an engine wired with in-memory stores, the default tool registry,
/// and a scripted model client that plays back `steps` in order (repeating
/// the last one if the engine asks for more steps than were scripted).
pub fn build_engine(steps: Vec<ModelStepResponse>) -> Arc<RunEngine> {
    let journal: Arc<dyn JournalStore> = Arc::new(InMemoryJournalStore::new());
    let approvals: Arc<dyn ApprovalRegistry> = Arc::new(InMemoryApprovalRegistry::new());
    let tools = agentrun_core::tools::ToolRegistry::with_default_tools();
    let model: Arc<dyn ModelClient> = Arc::new(agentrun_core::model_client::ScriptedModelClient::new(steps));
    let bus = Arc::new(EventBus::new());
    let mut config = EngineConfig::default();
    config.approval_timeout = Duration::from_secs(3600);
    RunEngine::new(journal, approvals, tools, model, bus, config)
}

/// Poll `journal.get_run` until the run reaches a terminal or suspended
/// status, or the deadline elapses.
pub async fn wait_for(journal: &dyn JournalStore, run_id: agentrun_core::model::RunId) -> Run {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let run = journal.get_run(run_id).await.unwrap();
        if run.status.is_terminal() || run.status == agentrun_core::model::RunStatus::Suspended {
            return run;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("run {run_id} did not reach a stable status in time (still {:?})", run.status);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub fn stop_step(text: &str) -> ModelStepResponse {
    ModelStepResponse {
        text: Some(text.to_string()),
        tool_calls: Vec::new(),
        finish_reason: FinishReason::Stop,
    }
}

pub fn tool_call_step(tool_name: &str, args: serde_json::Value) -> ModelStepResponse {
    ModelStepResponse {
        text: None,
        tool_calls: vec![agentrun_core::model::ProposedToolCall {
            id: "model-assigned-id".to_string(),
            name: tool_name.to_string(),
            arguments: args,
        }],
        finish_reason: FinishReason::ToolCalls,
    }
}
