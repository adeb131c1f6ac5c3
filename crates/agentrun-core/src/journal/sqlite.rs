//! SQLite-backed journal store. Single connection behind a mutex, matching
//! the teacher's "one writer at a time" embedded-storage shape; sequence
//! numbers are allocated inside an `IMMEDIATE` transaction so concurrent
//! appends to the same run never race.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::model::{
    JournalEntry, JournalPayload, Run, RunConfig, RunId, RunResult, RunStatus, Session,
    SessionId, SessionStatus,
};

use super::{
    run_row_status, run_status_from_row, session_row_status, session_status_from_row,
    JournalStore,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    owner TEXT NOT NULL,
    agent_kind TEXT NOT NULL,
    title TEXT,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS runs (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions(id),
    run_number INTEGER NOT NULL,
    agent_kind TEXT NOT NULL,
    task TEXT NOT NULL,
    max_steps INTEGER NOT NULL,
    model TEXT NOT NULL,
    status TEXT NOT NULL,
    parent_run_id TEXT,
    result_success INTEGER,
    result_message TEXT,
    result_steps INTEGER,
    started_at TEXT,
    completed_at TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_runs_session ON runs(session_id);

CREATE TABLE IF NOT EXISTS journal_entries (
    id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES runs(id),
    sequence INTEGER NOT NULL,
    step_number INTEGER,
    entry_type TEXT NOT NULL,
    payload TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(run_id, sequence)
);

CREATE INDEX IF NOT EXISTS idx_journal_run_seq ON journal_entries(run_id, sequence);

CREATE TABLE IF NOT EXISTS approvals (
    id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES runs(id),
    tool_call_id TEXT NOT NULL,
    tool_name TEXT NOT NULL,
    args TEXT NOT NULL,
    step_number INTEGER NOT NULL,
    status TEXT NOT NULL,
    rejection_reason TEXT,
    created_at TEXT NOT NULL,
    resolved_at TEXT,
    UNIQUE(run_id, tool_call_id)
);

CREATE INDEX IF NOT EXISTS idx_approvals_run ON approvals(run_id);
"#;

/// SQLite-backed [`JournalStore`]. Cloning shares the same connection and
/// mutex, which is how the approval registry attaches to the same database
/// file without a second pool.
pub struct SqliteJournalStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteJournalStore {
    /// Open (creating if absent) a sqlite database at `path` and run schema
    /// migration.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory sqlite database, useful for tests that want real SQL
    /// semantics without a file on disk.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Shared handle to the underlying connection, used by
    /// [`crate::approvals::SqliteApprovalRegistry`] to operate on the same
    /// database file and mutex.
    pub fn connection_handle(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_uuid(value: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| EngineError::Storage(format!("bad {what} uuid: {e}")))
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let id: String = row.get("id")?;
    let status: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    Ok(Session {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        owner: row.get("owner")?,
        agent_kind: row.get("agent_kind")?,
        title: row.get("title")?,
        status: session_status_from_row(&status),
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn row_to_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<Run> {
    let id: String = row.get("id")?;
    let session_id: String = row.get("session_id")?;
    let status: String = row.get("status")?;
    let parent_run_id: Option<String> = row.get("parent_run_id")?;
    let result_success: Option<bool> = row.get("result_success")?;
    let result_message: Option<String> = row.get("result_message")?;
    let result_steps: Option<u32> = row.get("result_steps")?;
    let started_at: Option<String> = row.get("started_at")?;
    let completed_at: Option<String> = row.get("completed_at")?;
    let created_at: String = row.get("created_at")?;

    let result = result_success.map(|success| RunResult {
        success,
        message: result_message,
        steps: result_steps.unwrap_or(0),
    });

    Ok(Run {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        session_id: Uuid::parse_str(&session_id).unwrap_or_default(),
        run_number: row.get("run_number")?,
        agent_kind: row.get("agent_kind")?,
        task: row.get("task")?,
        config: RunConfig {
            max_steps: row.get("max_steps")?,
            model: row.get("model")?,
        },
        status: run_status_from_row(&status),
        parent_run_id: parent_run_id.and_then(|s| Uuid::parse_str(&s).ok()),
        result,
        started_at: started_at.map(|s| parse_timestamp(&s)),
        completed_at: completed_at.map(|s| parse_timestamp(&s)),
        created_at: parse_timestamp(&created_at),
    })
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<JournalEntry> {
    let id: String = row.get("id")?;
    let run_id: String = row.get("run_id")?;
    let payload_json: String = row.get("payload")?;
    let created_at: String = row.get("created_at")?;
    let sequence: i64 = row.get("sequence")?;
    let step_number: Option<u32> = row.get("step_number")?;

    let payload: JournalPayload = serde_json::from_str(&payload_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(JournalEntry {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        run_id: Uuid::parse_str(&run_id).unwrap_or_default(),
        sequence: sequence as u64,
        step_number,
        payload,
        created_at: parse_timestamp(&created_at),
    })
}

#[async_trait]
impl JournalStore for SqliteJournalStore {
    async fn create_session(
        &self,
        owner: &str,
        agent_kind: &str,
        title: Option<String>,
    ) -> Result<Session> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (id, owner, agent_kind, title, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                id.to_string(),
                owner,
                agent_kind,
                title,
                session_row_status(SessionStatus::Active),
                now.to_rfc3339(),
            ],
        )?;
        Ok(Session {
            id,
            owner: owner.to_string(),
            agent_kind: agent_kind.to_string(),
            title,
            status: SessionStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_session(&self, session_id: SessionId) -> Result<Session> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, owner, agent_kind, title, status, created_at, updated_at
             FROM sessions WHERE id = ?1",
            params![session_id.to_string()],
            row_to_session,
        )
        .optional()?
        .ok_or_else(|| EngineError::not_found(format!("session {session_id} not found")))
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, owner, agent_kind, title, status, created_at, updated_at
             FROM sessions ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map([], row_to_session)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(EngineError::from)
    }

    async fn archive_session(&self, session_id: SessionId) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE sessions SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![
                session_row_status(SessionStatus::Archived),
                Utc::now().to_rfc3339(),
                session_id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(EngineError::not_found(format!(
                "session {session_id} not found"
            )));
        }
        Ok(())
    }

    async fn create_run(
        &self,
        session_id: SessionId,
        agent_kind: &str,
        task: &str,
        config: RunConfig,
        parent_run_id: Option<RunId>,
    ) -> Result<Run> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let status: Option<String> = tx
            .query_row(
                "SELECT status FROM sessions WHERE id = ?1",
                params![session_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let status =
            status.ok_or_else(|| EngineError::not_found(format!("session {session_id} not found")))?;
        if session_status_from_row(&status) == SessionStatus::Archived {
            return Err(EngineError::conflict(format!(
                "session {session_id} is archived"
            )));
        }

        let run_number: i64 = tx.query_row(
            "SELECT COALESCE(MAX(run_number), 0) + 1 FROM runs WHERE session_id = ?1",
            params![session_id.to_string()],
            |row| row.get(0),
        )?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        tx.execute(
            "INSERT INTO runs (
                id, session_id, run_number, agent_kind, task, max_steps, model,
                status, parent_run_id, result_success, result_message, result_steps,
                started_at, completed_at, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, NULL, NULL, NULL, NULL, ?10)",
            params![
                id.to_string(),
                session_id.to_string(),
                run_number,
                agent_kind,
                task,
                config.max_steps,
                config.model,
                run_row_status(RunStatus::Pending),
                parent_run_id.map(|p| p.to_string()),
                now.to_rfc3339(),
            ],
        )?;
        tx.commit()?;

        Ok(Run {
            id,
            session_id,
            run_number: run_number as u32,
            agent_kind: agent_kind.to_string(),
            task: task.to_string(),
            config,
            status: RunStatus::Pending,
            parent_run_id,
            result: None,
            started_at: None,
            completed_at: None,
            created_at: now,
        })
    }

    async fn get_run(&self, run_id: RunId) -> Result<Run> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, session_id, run_number, agent_kind, task, max_steps, model, status,
                    parent_run_id, result_success, result_message, result_steps,
                    started_at, completed_at, created_at
             FROM runs WHERE id = ?1",
            params![run_id.to_string()],
            row_to_run,
        )
        .optional()?
        .ok_or_else(|| EngineError::not_found(format!("run {run_id} not found")))
    }

    async fn list_runs(&self, session_id: SessionId) -> Result<Vec<Run>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, session_id, run_number, agent_kind, task, max_steps, model, status,
                    parent_run_id, result_success, result_message, result_steps,
                    started_at, completed_at, created_at
             FROM runs WHERE session_id = ?1 ORDER BY run_number ASC",
        )?;
        let rows = stmt.query_map(params![session_id.to_string()], row_to_run)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(EngineError::from)
    }

    async fn set_run_status(
        &self,
        run_id: RunId,
        status: RunStatus,
        result: Option<RunResult>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();

        let changed = if status.is_terminal() {
            let result = result.unwrap_or(RunResult {
                success: false,
                message: None,
                steps: 0,
            });
            conn.execute(
                "UPDATE runs SET status = ?1, result_success = ?2, result_message = ?3,
                    result_steps = ?4, completed_at = ?5 WHERE id = ?6",
                params![
                    run_row_status(status),
                    result.success,
                    result.message,
                    result.steps,
                    now,
                    run_id.to_string(),
                ],
            )?
        } else if matches!(status, RunStatus::Running) {
            conn.execute(
                "UPDATE runs SET status = ?1,
                    started_at = COALESCE(started_at, ?2) WHERE id = ?3",
                params![run_row_status(status), now, run_id.to_string()],
            )?
        } else {
            conn.execute(
                "UPDATE runs SET status = ?1 WHERE id = ?2",
                params![run_row_status(status), run_id.to_string()],
            )?
        };

        if changed == 0 {
            return Err(EngineError::not_found(format!("run {run_id} not found")));
        }
        Ok(())
    }

    async fn try_acquire_run(&self, run_id: RunId) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let status: Option<String> = tx
            .query_row(
                "SELECT status FROM runs WHERE id = ?1",
                params![run_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(status) = status else {
            return Err(EngineError::not_found(format!("run {run_id} not found")));
        };
        let status = run_status_from_row(&status);
        if !matches!(status, RunStatus::Pending | RunStatus::Suspended) {
            tx.commit()?;
            return Ok(false);
        }

        tx.execute(
            "UPDATE runs SET status = ?1, started_at = COALESCE(started_at, ?2) WHERE id = ?3",
            params![
                run_row_status(RunStatus::Running),
                Utc::now().to_rfc3339(),
                run_id.to_string(),
            ],
        )?;
        tx.commit()?;
        Ok(true)
    }

    async fn append(
        &self,
        run_id: RunId,
        payload: JournalPayload,
        step_number: Option<u32>,
    ) -> Result<JournalEntry> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let exists: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM runs WHERE id = ?1",
                params![run_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(EngineError::not_found(format!("run {run_id} not found")));
        }

        let sequence: i64 = tx.query_row(
            "SELECT COALESCE(MAX(sequence), 0) + 1 FROM journal_entries WHERE run_id = ?1",
            params![run_id.to_string()],
            |row| row.get(0),
        )?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        let payload_json = serde_json::to_string(&payload)?;
        tx.execute(
            "INSERT INTO journal_entries (id, run_id, sequence, step_number, entry_type, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id.to_string(),
                run_id.to_string(),
                sequence,
                step_number,
                payload.kind(),
                payload_json,
                now.to_rfc3339(),
            ],
        )?;
        tx.commit()?;

        Ok(JournalEntry {
            id,
            run_id,
            sequence: sequence as u64,
            step_number,
            payload,
            created_at: now,
        })
    }

    async fn list(&self, run_id: RunId, after_sequence: u64) -> Result<Vec<JournalEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, run_id, sequence, step_number, payload, created_at
             FROM journal_entries WHERE run_id = ?1 AND sequence > ?2 ORDER BY sequence ASC",
        )?;
        let rows = stmt.query_map(
            params![run_id.to_string(), after_sequence as i64],
            row_to_entry,
        )?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(EngineError::from)
    }

    async fn highest_sequence(&self, run_id: RunId) -> Result<u64> {
        let conn = self.conn.lock();
        let seq: i64 = conn.query_row(
            "SELECT COALESCE(MAX(sequence), 0) FROM journal_entries WHERE run_id = ?1",
            params![run_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(seq as u64)
    }
}
