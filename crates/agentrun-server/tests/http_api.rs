//! End-to-end HTTP coverage: bind the real router to an ephemeral port and
//! drive it with `reqwest`, the way the pack's `system-tests` crates exercise
//! a server over its actual wire protocol rather than calling handlers
//! directly.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use agentrun_core::model_client::{FinishReason, ModelStepResponse, ScriptedModelClient};
use agentrun_core::prelude::*;
use agentrun_server::build_router;
use serde_json::json;

async fn spawn_server(steps: Vec<ModelStepResponse>) -> String {
    let journal: Arc<dyn JournalStore> = Arc::new(InMemoryJournalStore::new());
    let approvals: Arc<dyn ApprovalRegistry> = Arc::new(InMemoryApprovalRegistry::new());
    let tools = agentrun_core::tools::ToolRegistry::with_default_tools();
    let model: Arc<dyn ModelClient> = Arc::new(ScriptedModelClient::new(steps));
    let bus = Arc::new(EventBus::new());
    let mut config = EngineConfig::default();
    config.approval_timeout = Duration::from_secs(3600);
    let engine = RunEngine::new(journal, approvals, tools, model, bus, config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let app = build_router(engine);

    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });

    format!("http://{addr}")
}

#[tokio::test]
async fn health_check() {
    let base = spawn_server(vec![]).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn create_session_and_run_completes_over_http() {
    let base = spawn_server(vec![ModelStepResponse {
        text: Some("done".to_string()),
        tool_calls: Vec::new(),
        finish_reason: FinishReason::Stop,
    }])
    .await;
    let client = reqwest::Client::new();

    let session: serde_json::Value = client
        .post(format!("{base}/sessions"))
        .json(&json!({"agent_kind": "coder", "title": "demo"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let session_id = session["id"].as_str().unwrap();

    let created: serde_json::Value = client
        .post(format!("{base}/sessions/{session_id}/runs"))
        .json(&json!({"task": "say hi"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let run_id = created["run_id"].as_str().unwrap();
    assert_eq!(created["subscribe_url"], format!("/runs/{run_id}/subscribe"));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let run: serde_json::Value = client
            .get(format!("{base}/runs/{run_id}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if run["status"] == "completed" {
            assert!(run["entries"].as_array().unwrap().iter().any(|e| e["type"] == "run-complete"));
            break;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("run did not complete in time: {run:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn unknown_run_returns_404() {
    let base = spawn_server(vec![]).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base}/runs/{}", uuid::Uuid::new_v4()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn approval_gated_run_surfaces_pending_approval_and_resumes() {
    let base = spawn_server(vec![
        ModelStepResponse {
            text: None,
            tool_calls: vec![agentrun_core::model::ProposedToolCall {
                id: "call-1".to_string(),
                name: "shell_exec".to_string(),
                arguments: json!({"command": "echo hi"}),
            }],
            finish_reason: FinishReason::ToolCalls,
        },
        ModelStepResponse {
            text: Some("all done".to_string()),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
        },
    ])
    .await;
    let client = reqwest::Client::new();

    let session: serde_json::Value = client
        .post(format!("{base}/sessions"))
        .json(&json!({"agent_kind": "coder", "title": null}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let session_id = session["id"].as_str().unwrap();

    let created: serde_json::Value = client
        .post(format!("{base}/sessions/{session_id}/runs"))
        .json(&json!({"task": "run a command"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let run_id = created["run_id"].as_str().unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let pending = loop {
        let pending: serde_json::Value = client
            .get(format!("{base}/runs/{run_id}/pending-approval"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if !pending.is_null() {
            break pending;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("no pending approval surfaced in time");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };
    assert_eq!(pending["tool_name"], "shell_exec");
    assert_eq!(pending["status"], "pending");

    let resumed: serde_json::Value = client
        .post(format!("{base}/runs/{run_id}/resume"))
        .json(&json!({"decision": "approved", "feedback": null}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_ne!(resumed["status"], "suspended");
}
