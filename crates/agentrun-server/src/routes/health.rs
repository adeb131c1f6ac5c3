//! `GET /health` — unauthenticated liveness probe (spec §4.6, §6).

use axum::Json;

use crate::types::StatusResponse;

pub async fn health() -> Json<StatusResponse> {
    Json(StatusResponse { status: "ok" })
}
