//! Tool Registry & Executor: the set of tools a run may call, and the
//! dispatcher that runs one. Grounded in the teacher's `Tool` trait
//! (`roci_core::tools::tool`), narrowed to what a durable run needs: the
//! registry is a pure dispatcher with no knowledge of journaling, approvals,
//! or runs — any side-effect protections (allowlists, workspace
//! containment) live inside a tool's own `execute`.

mod complete_task;
mod echo;
mod shell_exec;

pub use complete_task::{CompleteTaskTool, COMPLETE_TASK_TOOL_NAME};
pub use echo::EchoTool;
pub use shell_exec::ShellExecTool;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Context a tool executes within.
pub struct ToolExecutionContext {
    pub run_id: crate::model::RunId,
    pub step_number: u32,
    pub timeout: Duration,
}

/// Outcome of a single tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub output: Value,
    pub success: bool,
    pub summary: String,
}

impl ToolOutcome {
    pub fn ok(output: Value, summary: impl Into<String>) -> Self {
        Self {
            output,
            success: true,
            summary: summary.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            output: Value::String(message.clone()),
            success: false,
            summary: message,
        }
    }
}

/// A tool's static classification, decided once at registration time. The
/// Run Engine consults this — never a tool's own judgment at call time — to
/// decide whether a proposed call must suspend for approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ToolClassification {
    Safe,
    RequiresApproval,
}

/// A single callable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Stable name the model refers to this tool by.
    fn name(&self) -> &str;

    /// Human-readable description surfaced in the tool schema sent to the
    /// model.
    fn description(&self) -> &str;

    /// JSON Schema for this tool's arguments.
    fn parameters(&self) -> Value;

    /// Whether a proposed call to this tool must be suspended for human
    /// approval before it runs.
    fn classification(&self) -> ToolClassification;

    /// Execute the tool against the given arguments.
    async fn execute(&self, ctx: &ToolExecutionContext, args: Value) -> Result<ToolOutcome>;
}

/// The set of tools available to a run, keyed by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Arc<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        let map = tools
            .into_iter()
            .map(|tool| (tool.name().to_string(), tool))
            .collect();
        Self {
            tools: Arc::new(map),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Classify a tool by name. `None` means the name isn't registered —
    /// the engine's "unknown classification" branch (spec step 4c).
    pub fn classify(&self, name: &str) -> Option<ToolClassification> {
        self.tools.get(name).map(|tool| tool.classification())
    }

    /// Schemas (name, description, parameters) for every registered tool, in
    /// the shape the Model Client needs to advertise available tools.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .values()
            .map(|tool| ToolSchema {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }

    /// The default registry: the echo tool (safe) and the shell-exec tool
    /// (requires approval). Server binaries are free to build a narrower or
    /// wider [`ToolRegistry`] themselves.
    pub fn with_default_tools() -> Self {
        Self::new(vec![
            Arc::new(EchoTool),
            Arc::new(ShellExecTool::new()),
            Arc::new(CompleteTaskTool),
        ])
    }
}

/// A tool's advertised shape, as sent to the model alongside conversation
/// context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tool_classifies_to_none() {
        let registry = ToolRegistry::with_default_tools();
        assert!(registry.classify("not_a_real_tool").is_none());
    }

    #[test]
    fn echo_is_registered_and_safe() {
        let registry = ToolRegistry::with_default_tools();
        assert_eq!(registry.classify("echo"), Some(ToolClassification::Safe));
        assert!(registry.get("echo").is_some());
    }

    #[test]
    fn shell_exec_requires_approval() {
        let registry = ToolRegistry::with_default_tools();
        assert_eq!(
            registry.classify("shell_exec"),
            Some(ToolClassification::RequiresApproval)
        );
    }
}
