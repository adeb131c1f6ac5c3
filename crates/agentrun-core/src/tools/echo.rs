use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{EngineError, Result};

use super::{Tool, ToolClassification, ToolExecutionContext, ToolOutcome};

/// Trivial safe tool, useful for demos and for exercising the non-approval
/// path in tests without touching the filesystem or a shell.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes the given text back unchanged."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"],
        })
    }

    fn classification(&self) -> ToolClassification {
        ToolClassification::Safe
    }

    async fn execute(&self, _ctx: &ToolExecutionContext, args: Value) -> Result<ToolOutcome> {
        let text = args
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::validation("echo requires a `text` argument"))?;
        Ok(ToolOutcome::ok(
            Value::String(text.to_string()),
            format!("echoed {} characters", text.len()),
        ))
    }
}
