//! Event Bus: fan-out of journal entries to live SSE subscribers. Grounded
//! in the teacher's `RunEventEmitter` (one logical event stream per run) and
//! in the bounded-channel sizing the Krusty server uses for its SSE
//! transport.

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::{JournalEntry, RunId};

/// Channel capacity per run. A lagging subscriber (one that falls this far
/// behind) is told to resync via [`BusError::Lagged`] rather than being
/// allowed to build unbounded backlog.
const CHANNEL_CAPACITY: usize = 256;

/// Error surfaced to a subscriber loop.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("subscriber lagged, {0} entries dropped — resync from storage")]
    Lagged(u64),
}

/// Broadcasts journal entries for in-flight runs to any number of live SSE
/// subscribers. Completed runs are not retained here — history for them
/// comes straight from the [`crate::journal::JournalStore`].
#[derive(Default)]
pub struct EventBus {
    channels: DashMap<RunId, broadcast::Sender<JournalEntry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an entry to any subscribers of `run_id`. A no-op if nobody is
    /// currently subscribed — the entry is still durable in the journal, so
    /// nothing is lost, only the live push is skipped.
    pub fn publish(&self, run_id: RunId, entry: JournalEntry) {
        if let Some(sender) = self.channels.get(&run_id) {
            // Err means no receivers; fine, the channel is lazily dropped
            // the next time every subscriber for this run disconnects.
            let _ = sender.send(entry);
        }
    }

    /// Subscribe to live entries for `run_id`, creating the channel if this
    /// is the first subscriber. Callers are expected to first backfill with
    /// [`crate::journal::JournalStore::list`] up to the sequence number they
    /// observed just before calling this, to avoid a gap between history and
    /// live tail (see [`crate::engine::RunEngine::subscribe`]).
    pub fn subscribe(&self, run_id: RunId) -> broadcast::Receiver<JournalEntry> {
        self.channels
            .entry(run_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Drop the channel for a run once it reaches a terminal state and no
    /// longer needs live fan-out. Safe to call even if subscribers are still
    /// attached; they simply see the stream end.
    pub fn retire(&self, run_id: RunId) {
        self.channels.remove(&run_id);
    }
}
