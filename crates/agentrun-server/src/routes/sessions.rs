//! `/sessions` routes (spec §4.6).

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use agentrun_core::model::RunConfig;

use crate::error::AppError;
use crate::types::{
    CreateRunRequest, CreateRunResponse, CreateSessionRequest, RunResponse, SessionResponse,
};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_session).get(list_sessions))
        .route("/:id", get(get_session))
        .route("/:id/archive", post(archive_session))
        .route("/:id/runs", post(create_run))
}

async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state
        .engine
        .journal()
        .create_session("default", &req.agent_kind, req.title)
        .await?;
    Ok(Json(session.into()))
}

async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<Vec<SessionResponse>>, AppError> {
    let sessions = state.engine.journal().list_sessions().await?;
    Ok(Json(sessions.into_iter().map(Into::into).collect()))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.engine.journal().get_session(id).await?;
    Ok(Json(session.into()))
}

async fn archive_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    state.engine.journal().archive_session(id).await?;
    let session = state.engine.journal().get_session(id).await?;
    Ok(Json(session.into()))
}

async fn create_run(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<CreateRunRequest>,
) -> Result<Json<CreateRunResponse>, AppError> {
    let session = state.engine.journal().get_session(session_id).await?;
    let defaults = RunConfig::default();
    let config = RunConfig {
        max_steps: req.config.max_steps.unwrap_or(defaults.max_steps),
        model: req.config.model.unwrap_or(defaults.model),
    };

    let run = state
        .engine
        .journal()
        .create_run(session_id, &session.agent_kind, &req.task, config, None)
        .await?;
    state.engine.start(run.id).await?;

    Ok(Json(CreateRunResponse {
        run_id: run.id,
        subscribe_url: format!("/runs/{}/subscribe", run.id),
    }))
}

/// Re-exported for `routes::runs` to build the run-detail response without
/// duplicating the entry-fetch-and-assemble logic.
pub(crate) async fn fetch_run_response(
    state: &AppState,
    run_id: Uuid,
) -> Result<RunResponse, AppError> {
    let run = state.engine.journal().get_run(run_id).await?;
    let entries = state.engine.journal().list(run_id, 0).await?;
    Ok(RunResponse::new(run, entries))
}
