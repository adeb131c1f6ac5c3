//! Request/response bodies for the REST surface, per §6.1's payload shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use agentrun_core::model::{
    ApprovalDecision, ApprovalRequest, JournalEntry, Run, RunResult, Session,
};

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub agent_kind: String,
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub owner: String,
    pub agent_kind: String,
    pub title: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            owner: session.owner,
            agent_kind: session.agent_kind,
            title: session.title,
            status: session.status.to_string(),
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RunConfigRequest {
    pub max_steps: Option<u32>,
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRunRequest {
    pub task: String,
    #[serde(default)]
    pub config: RunConfigRequest,
}

#[derive(Debug, Serialize)]
pub struct CreateRunResponse {
    pub run_id: Uuid,
    pub subscribe_url: String,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub id: Uuid,
    pub session_id: Uuid,
    pub run_number: u32,
    pub agent_kind: String,
    pub task: String,
    pub status: String,
    pub parent_run_id: Option<Uuid>,
    pub result: Option<RunResult>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<JournalEntryResponse>,
}

impl RunResponse {
    pub fn new(run: Run, entries: Vec<JournalEntry>) -> Self {
        Self {
            id: run.id,
            session_id: run.session_id,
            run_number: run.run_number,
            agent_kind: run.agent_kind,
            task: run.task,
            status: run.status.to_string(),
            parent_run_id: run.parent_run_id,
            result: run.result,
            started_at: run.started_at,
            completed_at: run.completed_at,
            created_at: run.created_at,
            entries: entries.into_iter().map(JournalEntryResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JournalEntryResponse {
    pub id: Uuid,
    pub sequence: u64,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub step: Option<u32>,
}

impl From<JournalEntry> for JournalEntryResponse {
    fn from(entry: JournalEntry) -> Self {
        Self {
            id: entry.id,
            sequence: entry.sequence,
            kind: entry.payload.kind(),
            payload: serde_json::to_value(&entry.payload).unwrap_or(serde_json::Value::Null),
            created_at: entry.created_at,
            step: entry.step_number,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DoneEnvelope {
    pub id: Uuid,
    pub status: String,
    pub result: Option<RunResult>,
}

#[derive(Debug, Deserialize)]
pub struct ResumeRequest {
    pub decision: ApprovalDecision,
    pub feedback: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PendingApprovalResponse {
    pub id: Uuid,
    pub run_id: Uuid,
    pub tool_call_id: String,
    pub tool_name: String,
    pub args: serde_json::Value,
    pub step_number: u32,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<ApprovalRequest> for PendingApprovalResponse {
    fn from(approval: ApprovalRequest) -> Self {
        Self {
            id: approval.id,
            run_id: approval.run_id,
            tool_call_id: approval.tool_call_id,
            tool_name: approval.tool_name,
            args: approval.args,
            step_number: approval.step_number,
            status: approval.status.to_string(),
            created_at: approval.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}
