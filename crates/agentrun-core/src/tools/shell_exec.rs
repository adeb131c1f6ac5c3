use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;

use crate::error::{EngineError, Result};

use super::{Tool, ToolClassification, ToolExecutionContext, ToolOutcome};

/// Runs a shell command via `sh -c`. Always requires approval — this is the
/// canonical "unsafe tool" the Run Engine's suspend/resume path exists for.
pub struct ShellExecTool {
    shell: String,
}

impl ShellExecTool {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }
}

impl Default for ShellExecTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ShellExecTool {
    fn name(&self) -> &str {
        "shell_exec"
    }

    fn description(&self) -> &str {
        "Runs a shell command and returns its stdout, stderr, and exit code. Requires human approval."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "command": { "type": "string" } },
            "required": ["command"],
        })
    }

    fn classification(&self) -> ToolClassification {
        ToolClassification::RequiresApproval
    }

    async fn execute(&self, ctx: &ToolExecutionContext, args: Value) -> Result<ToolOutcome> {
        let command = args
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::validation("shell_exec requires a `command` argument"))?;

        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .output();

        let output = tokio::time::timeout(ctx.timeout, child)
            .await
            .map_err(|_| EngineError::Timeout(ctx.timeout.as_millis() as u64))?
            .map_err(|e| EngineError::ToolExecution {
                tool_name: self.name().to_string(),
                message: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let success = output.status.success();
        let summary = if success {
            format!("exited 0, {} bytes stdout", stdout.len())
        } else {
            format!(
                "exited {}, {} bytes stderr",
                output.status.code().unwrap_or(-1),
                stderr.len()
            )
        };

        Ok(ToolOutcome {
            output: json!({ "stdout": stdout, "stderr": stderr, "exit_code": output.status.code() }),
            success,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn ctx() -> ToolExecutionContext {
        ToolExecutionContext {
            run_id: Uuid::new_v4(),
            step_number: 1,
            timeout: std::time::Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn runs_a_simple_command() {
        let tool = ShellExecTool::new();
        let outcome = tool
            .execute(&ctx(), json!({"command": "echo hi"}))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.output["stdout"], json!("hi\n"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_but_not_an_error() {
        let tool = ShellExecTool::new();
        let outcome = tool
            .execute(&ctx(), json!({"command": "exit 3"}))
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.output["exit_code"], json!(3));
    }

    #[tokio::test]
    async fn missing_command_argument_is_a_validation_error() {
        let tool = ShellExecTool::new();
        let err = tool.execute(&ctx(), json!({})).await.unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Validation);
    }
}
