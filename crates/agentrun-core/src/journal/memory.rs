//! In-memory journal store for unit tests, grounded in the mutex-guarded
//! map shape used elsewhere in the retrieval pack for run-state stores.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::model::{
    JournalEntry, JournalPayload, Run, RunConfig, RunId, RunResult, RunStatus, Session,
    SessionId, SessionStatus,
};

use super::JournalStore;

#[derive(Default)]
struct State {
    sessions: HashMap<SessionId, Session>,
    runs: HashMap<RunId, Run>,
    runs_by_session: HashMap<SessionId, Vec<RunId>>,
    entries: HashMap<RunId, Vec<JournalEntry>>,
}

/// In-memory journal store. Not durable — intended for tests only.
#[derive(Default)]
pub struct InMemoryJournalStore {
    state: Mutex<State>,
}

impl InMemoryJournalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JournalStore for InMemoryJournalStore {
    async fn create_session(
        &self,
        owner: &str,
        agent_kind: &str,
        title: Option<String>,
    ) -> Result<Session> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            agent_kind: agent_kind.to_string(),
            title,
            status: SessionStatus::Active,
            created_at: now,
            updated_at: now,
        };
        let mut state = self.state.lock();
        state.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, session_id: SessionId) -> Result<Session> {
        self.state
            .lock()
            .sessions
            .get(&session_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(format!("session {session_id} not found")))
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = self.state.lock().sessions.values().cloned().collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    async fn archive_session(&self, session_id: SessionId) -> Result<()> {
        let mut state = self.state.lock();
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| EngineError::not_found(format!("session {session_id} not found")))?;
        session.status = SessionStatus::Archived;
        session.updated_at = Utc::now();
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
        let mut state = self.state.lock();
        if !state.sessions.contains_key(&session_id) {
            return Err(EngineError::not_found(format!(
                "session {session_id} not found"
            )));
        }
        if state
            .sessions
            .get(&session_id)
            .is_some_and(|s| s.status == SessionStatus::Archived)
        {
            return Err(EngineError::conflict(format!(
                "session {session_id} is archived"
            )));
        }
        let run_number = state
            .runs_by_session
            .get(&session_id)
            .map(|runs| runs.len() as u32 + 1)
            .unwrap_or(1);
        let run = Run {
            id: Uuid::new_v4(),
            session_id,
            run_number,
            agent_kind: agent_kind.to_string(),
            task: task.to_string(),
            config,
            status: RunStatus::Pending,
            parent_run_id,
            result: None,
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
        };
        state.runs.insert(run.id, run.clone());
        state
            .runs_by_session
            .entry(session_id)
            .or_default()
            .push(run.id);
        state.entries.insert(run.id, Vec::new());
        Ok(run)
    }

    async fn get_run(&self, run_id: RunId) -> Result<Run> {
        self.state
            .lock()
            .runs
            .get(&run_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(format!("run {run_id} not found")))
    }

    async fn list_runs(&self, session_id: SessionId) -> Result<Vec<Run>> {
        let state = self.state.lock();
        let ids = state
            .runs_by_session
            .get(&session_id)
            .cloned()
            .unwrap_or_default();
        Ok(ids
            .into_iter()
            .filter_map(|id| state.runs.get(&id).cloned())
            .collect())
    }

    async fn set_run_status(
        &self,
        run_id: RunId,
        status: RunStatus,
        result: Option<RunResult>,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let run = state
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| EngineError::not_found(format!("run {run_id} not found")))?;
        run.status = status;
        if run.started_at.is_none() && matches!(status, RunStatus::Running) {
            run.started_at = Some(Utc::now());
        }
        if status.is_terminal() {
            run.completed_at = Some(Utc::now());
            run.result = result;
        }
        Ok(())
    }

    async fn try_acquire_run(&self, run_id: RunId) -> Result<bool> {
        let mut state = self.state.lock();
        let run = state
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| EngineError::not_found(format!("run {run_id} not found")))?;
        if matches!(run.status, RunStatus::Pending | RunStatus::Suspended) {
            run.status = RunStatus::Running;
            if run.started_at.is_none() {
                run.started_at = Some(Utc::now());
            }
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn append(
        &self,
        run_id: RunId,
        payload: JournalPayload,
        step_number: Option<u32>,
    ) -> Result<JournalEntry> {
        let mut state = self.state.lock();
        if !state.runs.contains_key(&run_id) {
            return Err(EngineError::not_found(format!("run {run_id} not found")));
        }
        let entries = state.entries.entry(run_id).or_default();
        let sequence = entries.last().map(|e| e.sequence).unwrap_or(0) + 1;
        let entry = JournalEntry {
            id: Uuid::new_v4(),
            run_id,
            sequence,
            step_number,
            payload,
            created_at: Utc::now(),
        };
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn list(&self, run_id: RunId, after_sequence: u64) -> Result<Vec<JournalEntry>> {
        let state = self.state.lock();
        let entries = state.entries.get(&run_id).cloned().unwrap_or_default();
        Ok(entries
            .into_iter()
            .filter(|e| e.sequence > after_sequence)
            .collect())
    }

    async fn highest_sequence(&self, run_id: RunId) -> Result<u64> {
        let state = self.state.lock();
        Ok(state
            .entries
            .get(&run_id)
            .and_then(|entries| entries.last())
            .map(|e| e.sequence)
            .unwrap_or(0))
    }
}
