use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::Result;

use super::{Tool, ToolClassification, ToolExecutionContext, ToolOutcome};

/// Name the Run Engine recognizes as the "I'm done" sentinel (spec §4.5
/// step 6's "complete-task pseudo-tool"), checked regardless of the
/// model's own finish reason.
pub const COMPLETE_TASK_TOOL_NAME: &str = "complete_task";

/// No-op sentinel tool a model can call to end a run early even if its
/// finish reason wasn't `stop` — e.g. when a provider always reports
/// `tool-calls` for any turn that invokes a tool, including this one.
pub struct CompleteTaskTool;

#[async_trait]
impl Tool for CompleteTaskTool {
    fn name(&self) -> &str {
        COMPLETE_TASK_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Signals that the task is finished. Ends the run successfully."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "summary": { "type": "string" } },
        })
    }

    fn classification(&self) -> ToolClassification {
        ToolClassification::Safe
    }

    async fn execute(&self, _ctx: &ToolExecutionContext, args: Value) -> Result<ToolOutcome> {
        let summary = args
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or("task complete")
            .to_string();
        Ok(ToolOutcome::ok(Value::Null, summary))
    }
}
