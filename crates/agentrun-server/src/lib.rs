//! HTTP + SSE surface for the durable agent run engine. A thin axum layer
//! over [`agentrun_core::engine::RunEngine`] — every route either reads
//! durable state or forwards to the engine; no business logic lives here.
//! Grounded in the teacher's `krusty_server` crate (`AppState`,
//! `build_router`, `start_server`).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::Method;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use agentrun_core::approvals::SqliteApprovalRegistry;
use agentrun_core::bus::EventBus;
use agentrun_core::config::EngineConfig;
use agentrun_core::engine::RunEngine;
use agentrun_core::journal::SqliteJournalStore;
use agentrun_core::model_client::ModelClient;
use agentrun_core::tools::ToolRegistry;

pub mod error;
pub mod routes;
pub mod sse;
pub mod types;

/// Shared application state — just the engine. Every handler reaches the
/// journal, approvals, and bus through it.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RunEngine>,
}

/// Build the axum router and the shared [`AppState`] it closes over.
pub fn build_router(engine: Arc<RunEngine>) -> Router {
    let state = AppState { engine };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    routes::router()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Assemble a [`RunEngine`] wired against an on-disk SQLite journal, the
/// given model client, and the default tool registry. The approval registry
/// shares the journal's connection, as the engine requires. Intended for
/// the server binary; tests and embedders are free to build a `RunEngine`
/// directly with whichever backing stores they need.
pub fn build_engine(
    config: EngineConfig,
    model: Arc<dyn ModelClient>,
) -> anyhow::Result<Arc<RunEngine>> {
    let journal = Arc::new(SqliteJournalStore::open(&config.sqlite_path)?);
    let approvals = Arc::new(SqliteApprovalRegistry::new(journal.connection_handle()));
    let tools = ToolRegistry::with_default_tools();
    let bus = Arc::new(EventBus::new());

    Ok(RunEngine::new(journal, approvals, tools, model, bus, config))
}

/// Bind and serve. Blocks until the listener is closed.
pub async fn serve(engine: Arc<RunEngine>, port: u16) -> anyhow::Result<()> {
    let app = build_router(Arc::clone(&engine));
    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;

    tracing::info!(%addr, "agentrun-server listening");

    tokio::spawn(engine.run_approval_expiry_sweep());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
