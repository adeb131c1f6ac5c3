//! Domain model: sessions, runs, journal entries, and approval requests.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Identifier for a [`Session`].
pub type SessionId = Uuid;
/// Identifier for a [`Run`].
pub type RunId = Uuid;
/// Identifier for a [`JournalEntry`].
pub type JournalEntryId = Uuid;
/// Identifier for an [`ApprovalRequest`].
pub type ApprovalId = Uuid;
/// Identifier a model assigns to a proposed tool call; stable across retries
/// when derived deterministically (see [`crate::engine::tool_call_id`]).
pub type ToolCallId = String;

/// Lifecycle status of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Archived,
}

/// A logical conversation owned by a user; owns many [`Run`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub owner: String,
    pub agent_kind: String,
    pub title: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Status of a [`Run`]. Transitions are driven solely by the Run Engine
/// (and, for cancellation requests, the HTTP surface) — see
/// `agentrun-core::engine` for the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Suspended,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Whether this status has no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Per-run configuration: step budget and model selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub max_steps: u32,
    pub model: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            model: "default".to_string(),
        }
    }
}

/// Terminal outcome recorded once a run reaches a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub success: bool,
    pub message: Option<String>,
    pub steps: u32,
}

/// A single invocation of the engine within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub session_id: SessionId,
    pub run_number: u32,
    pub agent_kind: String,
    pub task: String,
    pub config: RunConfig,
    pub status: RunStatus,
    pub parent_run_id: Option<RunId>,
    pub result: Option<RunResult>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The tagged union of journal entry payloads. One variant per entry kind
/// named in the specification; this realizes the "dynamic payloads, tagged
/// sum" design note by serializing through a single `#[serde(tag)]` enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JournalPayload {
    RunStarted {
        task: String,
        max_steps: u32,
        agent_kind: String,
    },
    RunResumed {
        decision: ApprovalDecision,
        feedback: Option<String>,
    },
    Text {
        text: String,
    },
    ToolProposed {
        tool_call_id: ToolCallId,
        tool_name: String,
        args: Value,
    },
    ToolStarting {
        tool_call_id: ToolCallId,
        tool_name: String,
        args: Value,
    },
    ToolComplete {
        tool_call_id: ToolCallId,
        output: Value,
        success: bool,
        summary: String,
    },
    StepComplete {
        step_number: u32,
    },
    RunSuspended {
        reason: String,
        pending_approval_id: ApprovalId,
    },
    RunComplete {
        success: bool,
        message: Option<String>,
        steps: u32,
    },
    RunCancelled {
        reason: Option<String>,
    },
    RunError {
        error: String,
    },
    ChildRunStarted {
        child_run_id: RunId,
    },
    ChildRunCompleted {
        child_run_id: RunId,
        result: RunResult,
    },
}

impl JournalPayload {
    /// Short, stable kind name — used for the `entry_type` storage column
    /// and for matching invariants without destructuring the payload.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run-started",
            Self::RunResumed { .. } => "run-resumed",
            Self::Text { .. } => "text",
            Self::ToolProposed { .. } => "tool-proposed",
            Self::ToolStarting { .. } => "tool-starting",
            Self::ToolComplete { .. } => "tool-complete",
            Self::StepComplete { .. } => "step-complete",
            Self::RunSuspended { .. } => "run-suspended",
            Self::RunComplete { .. } => "run-complete",
            Self::RunCancelled { .. } => "run-cancelled",
            Self::RunError { .. } => "run-error",
            Self::ChildRunStarted { .. } => "child-run-started",
            Self::ChildRunCompleted { .. } => "child-run-completed",
        }
    }

    /// Whether an entry of this kind is a terminal entry for the run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::RunComplete { .. } | Self::RunCancelled { .. } | Self::RunError { .. }
        )
    }
}

/// The atomic, immutable unit of durable progress for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: JournalEntryId,
    pub run_id: RunId,
    pub sequence: u64,
    pub step_number: Option<u32>,
    pub payload: JournalPayload,
    pub created_at: DateTime<Utc>,
}

/// Status of an [`ApprovalRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

/// Decision a human (or the expiry sweep) made about a pending approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

/// A durable record of an unsafe tool call awaiting human resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: ApprovalId,
    pub run_id: RunId,
    pub tool_call_id: ToolCallId,
    pub tool_name: String,
    pub args: Value,
    pub step_number: u32,
    pub status: ApprovalStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// A single message in the reconstructed conversation fed to the model
/// client. Mirrors the teacher's `ModelMessage`/`Role` shape, generalized
/// away from any one provider's wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ProposedToolCall>,
    #[serde(default)]
    pub tool_call_id: Option<ToolCallId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
}

/// A tool call proposed by the model in a single step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedToolCall {
    pub id: ToolCallId,
    pub name: String,
    pub arguments: Value,
}

/// Arbitrary per-run metadata, used for runner limit overrides and the like
/// (mirrors the teacher's `RunRequest::metadata`).
pub type RunMetadata = HashMap<String, String>;
