use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::model::{
    ApprovalDecision, ApprovalId, ApprovalRequest, ApprovalStatus, RunId, ToolCallId,
};

use super::ApprovalRegistry;

/// In-memory approval registry, paired with [`crate::journal::InMemoryJournalStore`]
/// for tests.
#[derive(Default)]
pub struct InMemoryApprovalRegistry {
    approvals: Mutex<HashMap<ApprovalId, ApprovalRequest>>,
}

impl InMemoryApprovalRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalRegistry for InMemoryApprovalRegistry {
    async fn create(
        &self,
        run_id: RunId,
        tool_call_id: ToolCallId,
        tool_name: &str,
        args: Value,
        step_number: u32,
    ) -> Result<ApprovalRequest> {
        let mut approvals = self.approvals.lock();
        if let Some(existing) = approvals
            .values()
            .find(|a| a.run_id == run_id && a.tool_call_id == tool_call_id)
        {
            return Ok(existing.clone());
        }

        let request = ApprovalRequest {
            id: Uuid::new_v4(),
            run_id,
            tool_call_id,
            tool_name: tool_name.to_string(),
            args,
            step_number,
            status: ApprovalStatus::Pending,
            rejection_reason: None,
            created_at: Utc::now(),
            resolved_at: None,
        };
        approvals.insert(request.id, request.clone());
        Ok(request)
    }

    async fn get(&self, approval_id: ApprovalId) -> Result<ApprovalRequest> {
        self.approvals
            .lock()
            .get(&approval_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(format!("approval {approval_id} not found")))
    }

    async fn get_by_call(
        &self,
        run_id: RunId,
        tool_call_id: &str,
    ) -> Result<Option<ApprovalRequest>> {
        Ok(self
            .approvals
            .lock()
            .values()
            .find(|a| a.run_id == run_id && a.tool_call_id == tool_call_id)
            .cloned())
    }

    async fn pending_for_run(&self, run_id: RunId) -> Result<Option<ApprovalRequest>> {
        Ok(self
            .approvals
            .lock()
            .values()
            .find(|a| a.run_id == run_id && a.status == ApprovalStatus::Pending)
            .cloned())
    }

    async fn resolve(
        &self,
        approval_id: ApprovalId,
        decision: ApprovalDecision,
        rejection_reason: Option<String>,
    ) -> Result<bool> {
        let mut approvals = self.approvals.lock();
        let approval = approvals
            .get_mut(&approval_id)
            .ok_or_else(|| EngineError::not_found(format!("approval {approval_id} not found")))?;
        if approval.status != ApprovalStatus::Pending {
            return Ok(false);
        }
        approval.status = match decision {
            ApprovalDecision::Approved => ApprovalStatus::Approved,
            ApprovalDecision::Rejected => ApprovalStatus::Rejected,
        };
        approval.rejection_reason = rejection_reason;
        approval.resolved_at = Some(Utc::now());
        Ok(true)
    }

    async fn list_expired(&self, older_than_secs: i64) -> Result<Vec<ApprovalRequest>> {
        let cutoff = Utc::now() - chrono::Duration::seconds(older_than_secs);
        Ok(self
            .approvals
            .lock()
            .values()
            .filter(|a| a.status == ApprovalStatus::Pending && a.created_at < cutoff)
            .cloned()
            .collect())
    }
}
