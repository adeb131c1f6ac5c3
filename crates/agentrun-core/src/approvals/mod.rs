//! Approval Registry: durable storage for human-in-the-loop approval
//! requests. Grounded in the teacher's `ApprovalHandler` split — here the
//! "handler" is an HTTP client resolving the request rather than an
//! in-process callback.

mod memory;
mod sqlite;

pub use memory::InMemoryApprovalRegistry;
pub use sqlite::SqliteApprovalRegistry;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::model::{ApprovalDecision, ApprovalId, ApprovalRequest, ApprovalStatus, RunId, ToolCallId};

/// Durable storage for approval requests. Implementations are expected to
/// share the same underlying connection as the [`crate::journal::JournalStore`]
/// they're paired with, so a crash between "append run-suspended" and
/// "create approval row" cannot happen within a single sqlite file.
#[async_trait]
pub trait ApprovalRegistry: Send + Sync {
    /// Create a new pending approval request. Idempotent on
    /// `(run_id, tool_call_id)`: if a request for that pair already exists
    /// (in any status), it is returned unchanged instead of inserting a
    /// second row — this is what keeps a durable-step retry after a crash
    /// from producing two pending approvals for the same call.
    async fn create(
        &self,
        run_id: RunId,
        tool_call_id: ToolCallId,
        tool_name: &str,
        args: Value,
        step_number: u32,
    ) -> Result<ApprovalRequest>;

    /// Fetch an approval request by id.
    async fn get(&self, approval_id: ApprovalId) -> Result<ApprovalRequest>;

    /// Fetch the approval request for a specific `(run_id, tool_call_id)`
    /// pair, regardless of status. Unlike `pending_for_run`, this finds a
    /// request that has already been resolved, which is exactly what a
    /// resumed or recovering run needs to learn the human's decision.
    async fn get_by_call(
        &self,
        run_id: RunId,
        tool_call_id: &str,
    ) -> Result<Option<ApprovalRequest>>;

    /// The single pending approval for a run, if any. Callers rely on the
    /// engine never creating a second pending approval for the same run.
    async fn pending_for_run(&self, run_id: RunId) -> Result<Option<ApprovalRequest>>;

    /// Resolve a pending approval. Returns `false` (no-op) if the approval
    /// was not pending (already resolved), so callers can distinguish a
    /// race from a fresh resolution.
    async fn resolve(
        &self,
        approval_id: ApprovalId,
        decision: ApprovalDecision,
        rejection_reason: Option<String>,
    ) -> Result<bool>;

    /// All approval requests still pending past `older_than_secs`, across
    /// all runs — used by the expiry sweep.
    async fn list_expired(&self, older_than_secs: i64) -> Result<Vec<ApprovalRequest>>;
}

pub(crate) fn status_row(status: ApprovalStatus) -> &'static str {
    match status {
        ApprovalStatus::Pending => "pending",
        ApprovalStatus::Approved => "approved",
        ApprovalStatus::Rejected => "rejected",
        ApprovalStatus::Expired => "expired",
    }
}

pub(crate) fn status_from_row(value: &str) -> ApprovalStatus {
    match value {
        "approved" => ApprovalStatus::Approved,
        "rejected" => ApprovalStatus::Rejected,
        "expired" => ApprovalStatus::Expired,
        _ => ApprovalStatus::Pending,
    }
}

pub(crate) fn decision_row(decision: ApprovalDecision) -> &'static str {
    match decision {
        ApprovalDecision::Approved => "approved",
        ApprovalDecision::Rejected => "rejected",
    }
}
