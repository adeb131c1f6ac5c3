//! agentrun-server binary: bind the HTTP + SSE surface to a durable,
//! sqlite-backed [`agentrun_core::engine::RunEngine`] and serve it.
//!
//! The concrete model provider's wire format is explicitly out of scope
//! (see crate docs) — this binary drives the engine with a scripted model
//! client so the server is runnable end to end without credentials. Swap
//! `build_model_client` for a real `ModelClient` impl to talk to an actual
//! provider.

use std::sync::Arc;

use agentrun_core::config::EngineConfig;
use agentrun_core::model_client::{FinishReason, ModelClient, ModelStepResponse, ScriptedModelClient};

fn build_model_client() -> Arc<dyn ModelClient> {
    Arc::new(ScriptedModelClient::new(vec![ModelStepResponse {
        text: Some(
            "No live model provider is configured for this server; finishing the run as-is."
                .to_string(),
        ),
        tool_calls: Vec::new(),
        finish_reason: FinishReason::Stop,
    }]))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = EngineConfig::from_env();
    let model = build_model_client();
    let engine = agentrun_server::build_engine(config, model)?;

    let port = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080);

    agentrun_server::serve(engine, port).await
}
