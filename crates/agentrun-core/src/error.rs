//! Error types for the agent run engine.

use thiserror::Error;

/// Primary error type for all engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("model error: {0}")]
    Model(String),

    #[error("tool execution error: tool={tool_name} — {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("timeout after {0}ms")]
    Timeout(u64),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse-grained error category, used to map onto HTTP status codes in the
/// server crate and to decide local retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Conflict,
    Storage,
    Model,
    ToolExecution,
    Timeout,
    Unknown,
}

impl EngineError {
    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::Conflict(_) => ErrorCategory::Conflict,
            Self::Storage(_) | Self::Sqlite(_) | Self::Serialization(_) | Self::Io(_) => {
                ErrorCategory::Storage
            }
            Self::Model(_) => ErrorCategory::Model,
            Self::ToolExecution { .. } | Self::UnknownTool(_) => ErrorCategory::ToolExecution,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::InvalidState(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether a caller may usefully retry the same logical operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Storage | ErrorCategory::Timeout
        )
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, EngineError>;
