//! Data models for the orchestration layer.
//!
//! Chat rows and session records are defined next to their storage in
//! canvasflow-storage and re-exported here.

pub mod agent_event;
pub mod session_event;

pub use agent_event::{
    AgentEvent, AgentMessage, MessageFragment, ToolCallChunk, ToolCallHeader, ToolResult,
};
pub use canvasflow_storage::{ChatRole, ChatSession, NewMessage, StoredMessage};
pub use session_event::{SESSION_UPDATE_EVENT, SessionUpdate, SessionUpdateKind};
