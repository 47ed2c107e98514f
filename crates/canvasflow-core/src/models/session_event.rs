//! Session update events for live observers.
//!
//! These events are fanned out over the broadcast channel and forwarded to
//! the frontend by the transport layer. Every event carries its session and
//! canvas context so a multi-session transport can route it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

/// Event name for session update events
pub const SESSION_UPDATE_EVENT: &str = "session_update";

/// A session update emitted during a chat turn
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionUpdate {
    /// Session this event belongs to
    pub session_id: String,
    /// Canvas grouping context, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canvas_id: Option<String>,
    /// Event timestamp (Unix ms)
    #[ts(type = "number")]
    pub timestamp: i64,
    /// Event payload
    pub kind: SessionUpdateKind,
}

/// Types of session update events
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionUpdateKind {
    /// Incremental assistant text
    Delta { text: String },

    /// Tool call initiated
    ToolCall {
        id: String,
        name: String,
        /// JSON-encoded arguments known at start time
        arguments: String,
    },

    /// Streaming slice of a tool call's arguments
    ToolCallArguments { id: String, text: String },

    /// Finished tool invocation result
    ToolCallResult {
        id: String,
        #[ts(type = "any")]
        message: Value,
    },

    /// Complete current message list
    AllMessages {
        #[ts(type = "any[]")]
        messages: Vec<Value>,
    },

    /// Turn failed
    Error { error: String },

    /// Turn finished (completed, failed or cancelled)
    Done,
}

impl SessionUpdate {
    fn now() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn new(session_id: &str, canvas_id: Option<&str>, kind: SessionUpdateKind) -> Self {
        Self {
            session_id: session_id.to_string(),
            canvas_id: canvas_id.map(str::to_string),
            timestamp: Self::now(),
            kind,
        }
    }

    /// Create a text delta event
    pub fn delta(session_id: &str, canvas_id: Option<&str>, text: &str) -> Self {
        Self::new(
            session_id,
            canvas_id,
            SessionUpdateKind::Delta {
                text: text.to_string(),
            },
        )
    }

    /// Create a tool call start event
    pub fn tool_call(session_id: &str, canvas_id: Option<&str>, id: &str, name: &str) -> Self {
        Self::new(
            session_id,
            canvas_id,
            SessionUpdateKind::ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                arguments: "{}".to_string(),
            },
        )
    }

    /// Create a tool call arguments event
    pub fn tool_call_arguments(
        session_id: &str,
        canvas_id: Option<&str>,
        id: &str,
        text: &str,
    ) -> Self {
        Self::new(
            session_id,
            canvas_id,
            SessionUpdateKind::ToolCallArguments {
                id: id.to_string(),
                text: text.to_string(),
            },
        )
    }

    /// Create a tool call result event
    pub fn tool_call_result(
        session_id: &str,
        canvas_id: Option<&str>,
        id: &str,
        message: Value,
    ) -> Self {
        Self::new(
            session_id,
            canvas_id,
            SessionUpdateKind::ToolCallResult {
                id: id.to_string(),
                message,
            },
        )
    }

    /// Create a full message list event
    pub fn all_messages(session_id: &str, canvas_id: Option<&str>, messages: Vec<Value>) -> Self {
        Self::new(
            session_id,
            canvas_id,
            SessionUpdateKind::AllMessages { messages },
        )
    }

    /// Create a turn error event
    pub fn error(session_id: &str, canvas_id: Option<&str>, error: &str) -> Self {
        Self::new(
            session_id,
            canvas_id,
            SessionUpdateKind::Error {
                error: error.to_string(),
            },
        )
    }

    /// Create a turn done event
    pub fn done(session_id: &str, canvas_id: Option<&str>) -> Self {
        Self::new(session_id, canvas_id, SessionUpdateKind::Done)
    }
}
