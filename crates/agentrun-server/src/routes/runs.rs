//! `/runs` routes (spec §4.6): inspect, subscribe, resume, cancel, and read
//! the pending approval for a single run.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::Sse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::routes::sessions::fetch_run_response;
use crate::sse::subscribe_stream;
use crate::types::{PendingApprovalResponse, ResumeRequest, RunResponse};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:id", get(get_run))
        .route("/:id/subscribe", get(subscribe))
        .route("/:id/resume", post(resume))
        .route("/:id/cancel", post(cancel))
        .route("/:id/pending-approval", get(pending_approval))
}

async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RunResponse>, AppError> {
    Ok(Json(fetch_run_response(&state, id).await?))
}

#[derive(Debug, Deserialize)]
struct SubscribeQuery {
    #[serde(rename = "since-sequence")]
    since_sequence: Option<u64>,
}

async fn subscribe(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<SubscribeQuery>,
    headers: HeaderMap,
) -> Sse<impl futures::Stream<Item = Result<axum::response::sse::Event, std::convert::Infallible>>>
{
    let since_sequence = query
        .since_sequence
        .or_else(|| {
            headers
                .get("Last-Event-Id")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
        })
        .unwrap_or(0);

    subscribe_stream(state.engine, id, since_sequence)
}

async fn resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ResumeRequest>,
) -> Result<Json<RunResponse>, AppError> {
    state.engine.resume(id, req.decision, req.feedback).await?;
    Ok(Json(fetch_run_response(&state, id).await?))
}

async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RunResponse>, AppError> {
    state.engine.cancel(id, None).await?;
    Ok(Json(fetch_run_response(&state, id).await?))
}

async fn pending_approval(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Option<PendingApprovalResponse>>, AppError> {
    let pending = state.engine.approvals().pending_for_run(id).await?;
    Ok(Json(pending.map(Into::into)))
}
