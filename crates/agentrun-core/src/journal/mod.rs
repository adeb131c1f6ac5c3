//! Journal Store: the append-only, per-run ordered event log that is the
//! single source of truth for a run's history. See the module-level
//! contract in the specification §4.1.

mod memory;
mod sqlite;

pub use memory::InMemoryJournalStore;
pub use sqlite::SqliteJournalStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{
    JournalEntry, JournalPayload, Run, RunConfig, RunId, RunResult, RunStatus, Session,
    SessionId, SessionStatus,
};

/// Durable storage for sessions, runs, and their journal entries.
///
/// Implementations must guarantee that within a run, sequence numbers are
/// dense, strictly increasing, and unique, and that a successful `append`
/// is durable against a subsequent process crash.
#[async_trait]
pub trait JournalStore: Send + Sync {
    /// Create a new session in status `active`.
    async fn create_session(
        &self,
        owner: &str,
        agent_kind: &str,
        title: Option<String>,
    ) -> Result<Session>;

    /// Fetch a session by id.
    async fn get_session(&self, session_id: SessionId) -> Result<Session>;

    /// List all sessions, most recently updated first.
    async fn list_sessions(&self) -> Result<Vec<Session>>;

    /// Mark a session archived. Idempotent.
    async fn archive_session(&self, session_id: SessionId) -> Result<()>;

    /// Create a new run in status `pending`, allocating the next
    /// `run_number` within the session.
    async fn create_run(
        &self,
        session_id: SessionId,
        agent_kind: &str,
        task: &str,
        config: RunConfig,
        parent_run_id: Option<RunId>,
    ) -> Result<Run>;

    /// Fetch run metadata.
    async fn get_run(&self, run_id: RunId) -> Result<Run>;

    /// List runs belonging to a session, oldest first.
    async fn list_runs(&self, session_id: SessionId) -> Result<Vec<Run>>;

    /// Update a run's status and, for terminal transitions, its result.
    async fn set_run_status(
        &self,
        run_id: RunId,
        status: RunStatus,
        result: Option<RunResult>,
    ) -> Result<()>;

    /// Attempt to acquire the single-writer lease for a run: atomically
    /// transition from `pending`/`suspended` to `running`. Returns `true`
    /// if this call performed the transition, `false` if the run was not
    /// in an acquirable state (already running or terminal).
    async fn try_acquire_run(&self, run_id: RunId) -> Result<bool>;

    /// Atomically allocate the next sequence number for `run_id` and
    /// persist the entry.
    async fn append(
        &self,
        run_id: RunId,
        payload: JournalPayload,
        step_number: Option<u32>,
    ) -> Result<JournalEntry>;

    /// List all entries for a run with sequence number greater than
    /// `after_sequence`, in ascending order. Finite — does not wait for
    /// future entries.
    async fn list(&self, run_id: RunId, after_sequence: u64) -> Result<Vec<JournalEntry>>;

    /// Highest sequence number appended for a run so far (0 if none).
    async fn highest_sequence(&self, run_id: RunId) -> Result<u64>;
}

pub(crate) fn session_row_status(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Active => "active",
        SessionStatus::Archived => "archived",
    }
}

pub(crate) fn session_status_from_row(value: &str) -> SessionStatus {
    match value {
        "archived" => SessionStatus::Archived,
        _ => SessionStatus::Active,
    }
}

pub(crate) fn run_row_status(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Pending => "pending",
        RunStatus::Running => "running",
        RunStatus::Suspended => "suspended",
        RunStatus::Completed => "completed",
        RunStatus::Failed => "failed",
        RunStatus::Cancelled => "cancelled",
    }
}

pub(crate) fn run_status_from_row(value: &str) -> RunStatus {
    match value {
        "running" => RunStatus::Running,
        "suspended" => RunStatus::Suspended,
        "completed" => RunStatus::Completed,
        "failed" => RunStatus::Failed,
        "cancelled" => RunStatus::Cancelled,
        _ => RunStatus::Pending,
    }
}
