//! Property-style tests for the seven universal invariants a durable run's
//! journal must satisfy regardless of which path (happy path, approval,
//! cancellation, crash-resume) produced it.

mod common;

use std::collections::HashSet;

use agentrun_core::model::{ApprovalDecision, JournalPayload, RunConfig, RunStatus};
use common::{build_engine, stop_step, tool_call_step, wait_for};
use futures::StreamExt;
use serde_json::json;

/// 1. Journal monotonicity: sequence numbers are strictly increasing,
/// starting at 1, with no gaps.
#[tokio::test]
async fn journal_monotonicity() {
    let engine = build_engine(vec![
        tool_call_step("echo", json!({"text": "hi"})),
        stop_step("done"),
    ]);
    let session = engine.journal().create_session("t", "a", None).await.unwrap();
    let run = engine.journal()
        .create_run(session.id, "a", "task", RunConfig::default(), None)
        .await
        .unwrap();
    engine.start(run.id).await.unwrap();
    wait_for(engine.journal().as_ref(), run.id).await;

    let entries = engine.journal().list(run.id, 0).await.unwrap();
    assert!(!entries.is_empty());
    for (expected, entry) in (1u64..).zip(entries.iter()) {
        assert_eq!(entry.sequence, expected);
    }
}

/// 2. Terminality: once a terminal entry exists, nothing follows it.
#[tokio::test]
async fn terminality_no_entries_after_terminal() {
    let engine = build_engine(vec![stop_step("hi")]);
    let session = engine.journal().create_session("t", "a", None).await.unwrap();
    let run = engine.journal()
        .create_run(session.id, "a", "task", RunConfig::default(), None)
        .await
        .unwrap();
    engine.start(run.id).await.unwrap();
    wait_for(engine.journal().as_ref(), run.id).await;

    let entries = engine.journal().list(run.id, 0).await.unwrap();
    let terminal_index = entries
        .iter()
        .position(|e| e.payload.is_terminal())
        .expect("a completed run must have a terminal entry");
    assert_eq!(terminal_index, entries.len() - 1);
}

/// 3. Tool pairing: every `tool-complete` has an earlier `tool-proposed` or
/// `tool-starting` with the same id, and `tool-starting` appears only for
/// safe tools or approved calls.
#[tokio::test]
async fn tool_pairing_across_safe_and_approved_paths() {
    for (steps, approve) in [
        (vec![tool_call_step("echo", json!({"text": "hi"})), stop_step("done")], None),
        (
            vec![
                tool_call_step("shell_exec", json!({"command": "ls"})),
                stop_step("done"),
            ],
            Some(true),
        ),
        (
            vec![
                tool_call_step("shell_exec", json!({"command": "ls"})),
                stop_step("done"),
            ],
            Some(false),
        ),
    ] {
        let engine = build_engine(steps);
        let session = engine.journal().create_session("t", "a", None).await.unwrap();
        let run = engine.journal()
            .create_run(session.id, "a", "task", RunConfig::default(), None)
            .await
            .unwrap();
        engine.start(run.id).await.unwrap();
        wait_for(engine.journal().as_ref(), run.id).await;

        if let Some(approved) = approve {
            let decision = if approved {
                ApprovalDecision::Approved
            } else {
                ApprovalDecision::Rejected
            };
            engine
                .resume(run.id, decision, Some("reason".to_string()))
                .await
                .unwrap();
            wait_for(engine.journal().as_ref(), run.id).await;
        }

        let entries = engine.journal().list(run.id, 0).await.unwrap();
        let mut opened: HashSet<String> = HashSet::new();
        for entry in &entries {
            match &entry.payload {
                JournalPayload::ToolProposed { tool_call_id, .. }
                | JournalPayload::ToolStarting { tool_call_id, .. } => {
                    opened.insert(tool_call_id.clone());
                }
                JournalPayload::ToolComplete { tool_call_id, .. } => {
                    assert!(
                        opened.contains(tool_call_id),
                        "tool-complete {tool_call_id} with no earlier tool-proposed/tool-starting"
                    );
                }
                _ => {}
            }
        }

        let has_starting = entries
            .iter()
            .any(|e| e.payload.kind() == "tool-starting");
        match approve {
            None => assert!(has_starting, "safe tool call must produce tool-starting"),
            Some(true) => assert!(has_starting, "approved call must produce tool-starting"),
            Some(false) => assert!(!has_starting, "rejected call must not produce tool-starting"),
        }
    }
}

/// 4. At most one pending approval per run at any moment.
#[tokio::test]
async fn at_most_one_pending_approval() {
    let engine = build_engine(vec![
        tool_call_step("shell_exec", json!({"command": "ls"})),
        stop_step("done"),
    ]);
    let session = engine.journal().create_session("t", "a", None).await.unwrap();
    let run = engine.journal()
        .create_run(session.id, "a", "task", RunConfig::default(), None)
        .await
        .unwrap();
    engine.start(run.id).await.unwrap();
    wait_for(engine.journal().as_ref(), run.id).await;

    let pending = engine.approvals().pending_for_run(run.id).await.unwrap();
    assert!(pending.is_some());

    // Resolving it must leave zero pending, never more than one at any time.
    engine
        .resume(run.id, ApprovalDecision::Approved, None)
        .await
        .unwrap();
    wait_for(engine.journal().as_ref(), run.id).await;
    assert!(engine.approvals()
        .pending_for_run(run.id)
        .await
        .unwrap()
        .is_none());
}

/// 5. Subscribe idempotence: a full backlog read via `list` matches what a
/// subscriber collects from sequence 0, modulo the live-vs-static framing.
#[tokio::test]
async fn subscribe_matches_list_backlog() {
    let engine = build_engine(vec![
        tool_call_step("echo", json!({"text": "hi"})),
        stop_step("done"),
    ]);
    let session = engine.journal().create_session("t", "a", None).await.unwrap();
    let run = engine.journal()
        .create_run(session.id, "a", "task", RunConfig::default(), None)
        .await
        .unwrap();
    engine.start(run.id).await.unwrap();
    wait_for(engine.journal().as_ref(), run.id).await;

    let listed = engine.journal().list(run.id, 0).await.unwrap();

    let mut stream = Box::pin(engine.subscribe(run.id, 0));
    let mut streamed = Vec::new();
    while let Some(item) = stream.next().await {
        streamed.push(item.unwrap());
    }

    assert_eq!(listed.len(), streamed.len());
    for (a, b) in listed.iter().zip(streamed.iter()) {
        assert_eq!(a.sequence, b.sequence);
        assert_eq!(a.payload.kind(), b.payload.kind());
    }
}

/// 6. Resume exclusivity: a second concurrent resume for the same run is
/// rejected and does not produce a duplicate `run-resumed` entry.
#[tokio::test]
async fn resume_exclusivity() {
    let engine = build_engine(vec![
        tool_call_step("shell_exec", json!({"command": "ls"})),
        stop_step("done"),
    ]);
    let session = engine.journal().create_session("t", "a", None).await.unwrap();
    let run = engine.journal()
        .create_run(session.id, "a", "task", RunConfig::default(), None)
        .await
        .unwrap();
    engine.start(run.id).await.unwrap();
    wait_for(engine.journal().as_ref(), run.id).await;

    let first = engine.resume(run.id, ApprovalDecision::Approved, None).await;
    assert!(first.is_ok());
    let second = engine.resume(run.id, ApprovalDecision::Approved, None).await;
    assert!(second.is_err());

    wait_for(engine.journal().as_ref(), run.id).await;
    let entries = engine.journal().list(run.id, 0).await.unwrap();
    let resumed_count = entries
        .iter()
        .filter(|e| e.payload.kind() == "run-resumed")
        .count();
    assert_eq!(resumed_count, 1);
}

/// 7. Cancellation terminality: after a successful cancel, the run reaches
/// a terminal state and nothing non-terminal follows.
#[tokio::test]
async fn cancellation_terminality() {
    let engine = build_engine(vec![tool_call_step("shell_exec", json!({"command": "ls"}))]);
    let session = engine.journal().create_session("t", "a", None).await.unwrap();
    let run = engine.journal()
        .create_run(session.id, "a", "task", RunConfig::default(), None)
        .await
        .unwrap();
    engine.start(run.id).await.unwrap();
    wait_for(engine.journal().as_ref(), run.id).await;

    engine.cancel(run.id, None).await.unwrap();

    let run = engine.journal().get_run(run.id).await.unwrap();
    assert_eq!(run.status, RunStatus::Cancelled);

    let entries = engine.journal().list(run.id, 0).await.unwrap();
    assert_eq!(entries.last().unwrap().payload.kind(), "run-cancelled");
}
