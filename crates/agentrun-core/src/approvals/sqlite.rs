use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::model::{
    ApprovalDecision, ApprovalId, ApprovalRequest, ApprovalStatus, RunId, ToolCallId,
};

use super::{status_from_row, status_row, ApprovalRegistry};

/// SQLite-backed approval registry. Takes the same connection handle as the
/// paired [`crate::journal::SqliteJournalStore`] via
/// [`crate::journal::SqliteJournalStore::connection_handle`], so approval
/// rows and journal entries for a run live in one database file.
pub struct SqliteApprovalRegistry {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteApprovalRegistry {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_approval(row: &rusqlite::Row<'_>) -> rusqlite::Result<ApprovalRequest> {
    let id: String = row.get("id")?;
    let run_id: String = row.get("run_id")?;
    let status: String = row.get("status")?;
    let args_json: String = row.get("args")?;
    let created_at: String = row.get("created_at")?;
    let resolved_at: Option<String> = row.get("resolved_at")?;

    let args: Value = serde_json::from_str(&args_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(ApprovalRequest {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        run_id: Uuid::parse_str(&run_id).unwrap_or_default(),
        tool_call_id: row.get("tool_call_id")?,
        tool_name: row.get("tool_name")?,
        args,
        step_number: row.get("step_number")?,
        status: status_from_row(&status),
        rejection_reason: row.get("rejection_reason")?,
        created_at: parse_timestamp(&created_at),
        resolved_at: resolved_at.map(|s| parse_timestamp(&s)),
    })
}

#[async_trait]
impl ApprovalRegistry for SqliteApprovalRegistry {
    async fn create(
        &self,
        run_id: RunId,
        tool_call_id: ToolCallId,
        tool_name: &str,
        args: Value,
        step_number: u32,
    ) -> Result<ApprovalRequest> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let args_json = serde_json::to_string(&args)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO approvals (id, run_id, tool_call_id, tool_name, args, step_number,
                status, rejection_reason, created_at, resolved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8, NULL)
             ON CONFLICT(run_id, tool_call_id) DO NOTHING",
            params![
                id.to_string(),
                run_id.to_string(),
                &tool_call_id,
                tool_name,
                args_json,
                step_number,
                status_row(ApprovalStatus::Pending),
                now.to_rfc3339(),
            ],
        )?;
        conn.query_row(
            "SELECT id, run_id, tool_call_id, tool_name, args, step_number, status,
                    rejection_reason, created_at, resolved_at
             FROM approvals WHERE run_id = ?1 AND tool_call_id = ?2",
            params![run_id.to_string(), tool_call_id],
            row_to_approval,
        )
        .map_err(EngineError::from)
    }

    async fn get(&self, approval_id: ApprovalId) -> Result<ApprovalRequest> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, run_id, tool_call_id, tool_name, args, step_number, status,
                    rejection_reason, created_at, resolved_at
             FROM approvals WHERE id = ?1",
            params![approval_id.to_string()],
            row_to_approval,
        )
        .optional()?
        .ok_or_else(|| EngineError::not_found(format!("approval {approval_id} not found")))
    }

    async fn get_by_call(
        &self,
        run_id: RunId,
        tool_call_id: &str,
    ) -> Result<Option<ApprovalRequest>> {
        let conn = self.conn.lock();
        let approval = conn
            .query_row(
                "SELECT id, run_id, tool_call_id, tool_name, args, step_number, status,
                        rejection_reason, created_at, resolved_at
                 FROM approvals WHERE run_id = ?1 AND tool_call_id = ?2",
                params![run_id.to_string(), tool_call_id],
                row_to_approval,
            )
            .optional()?;
        Ok(approval)
    }

    async fn pending_for_run(&self, run_id: RunId) -> Result<Option<ApprovalRequest>> {
        let conn = self.conn.lock();
        let approval = conn
            .query_row(
                "SELECT id, run_id, tool_call_id, tool_name, args, step_number, status,
                        rejection_reason, created_at, resolved_at
                 FROM approvals WHERE run_id = ?1 AND status = ?2
                 ORDER BY created_at DESC LIMIT 1",
                params![run_id.to_string(), status_row(ApprovalStatus::Pending)],
                row_to_approval,
            )
            .optional()?;
        Ok(approval)
    }

    async fn resolve(
        &self,
        approval_id: ApprovalId,
        decision: ApprovalDecision,
        rejection_reason: Option<String>,
    ) -> Result<bool> {
        let new_status = match decision {
            ApprovalDecision::Approved => ApprovalStatus::Approved,
            ApprovalDecision::Rejected => ApprovalStatus::Rejected,
        };
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE approvals SET status = ?1, rejection_reason = ?2, resolved_at = ?3
             WHERE id = ?4 AND status = ?5",
            params![
                status_row(new_status),
                rejection_reason,
                Utc::now().to_rfc3339(),
                approval_id.to_string(),
                status_row(ApprovalStatus::Pending),
            ],
        )?;
        Ok(changed > 0)
    }

    async fn list_expired(&self, older_than_secs: i64) -> Result<Vec<ApprovalRequest>> {
        let cutoff = (Utc::now() - chrono::Duration::seconds(older_than_secs)).to_rfc3339();
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, run_id, tool_call_id, tool_name, args, step_number, status,
                    rejection_reason, created_at, resolved_at
             FROM approvals WHERE status = ?1 AND created_at < ?2",
        )?;
        let rows = stmt.query_map(
            params![status_row(ApprovalStatus::Pending), cutoff],
            row_to_approval,
        )?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(EngineError::from)
    }
}
