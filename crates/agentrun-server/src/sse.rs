//! Server-Sent Events framing for `GET /runs/{id}/subscribe`, per §6.2:
//! `event: event` entries followed by a single terminal `event: done`. Built
//! directly on [`RunEngine::subscribe`]'s replay-then-follow stream, mirroring
//! the teacher's `Sse::new(...).keep_alive(...)` construction in
//! `krusty_server::routes::chat`.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};

use agentrun_core::engine::RunEngine;
use agentrun_core::model::RunId;
use std::sync::Arc;

use crate::types::{DoneEnvelope, JournalEntryResponse};

pub fn subscribe_stream(
    engine: Arc<RunEngine>,
    run_id: RunId,
    since_sequence: u64,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let entries = engine.subscribe(run_id, since_sequence);

    let stream = async_stream::stream! {
        futures::pin_mut!(entries);
        while let Some(item) = entries.next().await {
            match item {
                Ok(entry) => {
                    let terminal = entry.payload.is_terminal();
                    let body = JournalEntryResponse::from(entry);
                    let data = serde_json::to_string(&body).unwrap_or_else(|_| "{}".to_string());
                    yield Ok(Event::default().event("event").id(body.sequence.to_string()).data(data));

                    if terminal {
                        if let Ok(run) = engine.journal().get_run(run_id).await {
                            let done = DoneEnvelope {
                                id: run.id,
                                status: run.status.to_string(),
                                result: run.result,
                            };
                            if let Ok(data) = serde_json::to_string(&done) {
                                yield Ok(Event::default().event("done").data(data));
                            }
                        }
                        return;
                    }
                }
                Err(err) => {
                    tracing::warn!(run_id = %run_id, error = %err, "subscribe stream error");
                    return;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
