//! Durable agent run engine: a journal-backed state machine that drives
//! long-lived, interruptible agent runs to completion, gating unsafe tool
//! calls on human approval and fanning out every journal entry to live
//! subscribers.
//!
//! This crate has no HTTP dependency — see `agentrun-server` for the REST +
//! SSE surface built on top of [`engine::RunEngine`].

pub mod approvals;
pub mod bus;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod journal;
pub mod model;
pub mod model_client;
pub mod tools;

pub mod prelude {
    //! Common imports for callers driving the engine end to end.
    pub use crate::approvals::{ApprovalRegistry, InMemoryApprovalRegistry, SqliteApprovalRegistry};
    pub use crate::bus::EventBus;
    pub use crate::config::EngineConfig;
    pub use crate::engine::RunEngine;
    pub use crate::error::{EngineError, Result};
    pub use crate::journal::{InMemoryJournalStore, JournalStore, SqliteJournalStore};
    pub use crate::model::*;
    pub use crate::model_client::{FinishReason, ModelClient, ModelStepResponse};
    pub use crate::tools::{Tool, ToolRegistry};
}
