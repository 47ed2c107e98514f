//! Error types for the orchestration layer

use thiserror::Error;

/// Orchestration error types
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("session {0} already has an active turn")]
    SessionBusy(String),

    #[error("agent invocation failed: {0}")]
    Agent(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, CoreError>;
