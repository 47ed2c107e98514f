//! Inbound event model for the agent execution graph's stream.
//!
//! The graph emits heterogeneous chunks at variable granularity. Ingestion
//! converts them into this closed tagged type so the rest of the pipeline
//! never has to re-apply presence-of-field heuristics.

use canvasflow_storage::{ChatRole, NewMessage};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One message as rendered by the agent graph (OpenAI-style payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Message id assigned by the graph; doubles as the upsert key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Per-invocation correlation key, if the graph issued one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub role: ChatRole,
    /// Rendered content: a plain string or a list of content blocks.
    #[serde(default)]
    pub content: Value,
    /// Remaining payload fields (tool-call descriptors etc.), kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AgentMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: None,
            run_id: None,
            role,
            content: Value::String(content.into()),
            extra: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Flatten the content field into display text.
    ///
    /// Structured content keeps only its text blocks; image and other
    /// non-text blocks contribute nothing.
    pub fn rendered_text(&self) -> String {
        match &self.content {
            Value::String(text) => text.clone(),
            Value::Array(blocks) => blocks
                .iter()
                .filter_map(|block| {
                    if block.get("type").and_then(Value::as_str) == Some("text") {
                        block.get("text").and_then(Value::as_str)
                    } else {
                        None
                    }
                })
                .collect::<Vec<_>>()
                .join(""),
            _ => String::new(),
        }
    }

    /// Full structured representation for persistence and broadcast.
    pub fn raw(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Convert into a message-log upsert for the given session.
    pub fn to_new_message(&self, session_id: &str) -> NewMessage {
        let mut message =
            NewMessage::new(session_id, self.role, self.rendered_text()).with_raw(self.raw());
        if let Some(id) = &self.id {
            message = message.with_message_id(id.clone());
        }
        if let Some(run_id) = &self.run_id {
            message = message.with_run_id(run_id.clone());
        }
        message
    }
}

/// A newly named tool call announced by the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallHeader {
    pub id: String,
    pub name: String,
}

/// A streamed slice of a tool call's JSON arguments.
///
/// The opening chunk names the call; continuations carry only the call id
/// and a partial argument string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolCallChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// The finished result of a tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub message: AgentMessage,
}

/// One incremental fragment of an in-flight assistant turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallHeader>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_call_chunks: Vec<ToolCallChunk>,
}

impl MessageFragment {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn tool_result(call_id: impl Into<String>, message: AgentMessage) -> Self {
        Self {
            tool_result: Some(ToolResult {
                call_id: call_id.into(),
                message,
            }),
            ..Self::default()
        }
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tool_calls: vec![ToolCallHeader {
                id: id.into(),
                name: name.into(),
            }],
            ..Self::default()
        }
    }

    pub fn arguments_chunk(id: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            tool_call_chunks: vec![ToolCallChunk {
                id: Some(id.into()),
                name: None,
                arguments: Some(arguments.into()),
            }],
            ..Self::default()
        }
    }
}

/// One event from the agent graph's stream for a single invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Complete current message list, superseding all prior partial state.
    Snapshot { messages: Vec<AgentMessage> },
    /// One fragment of the in-flight assistant turn.
    Message { fragment: MessageFragment },
    /// Unrecognized stream tag; consumers must ignore it.
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rendered_text_plain_string() {
        let message = AgentMessage::new(ChatRole::Assistant, "hello");
        assert_eq!(message.rendered_text(), "hello");
    }

    #[test]
    fn test_rendered_text_content_blocks() {
        let mut message = AgentMessage::new(ChatRole::Assistant, "");
        message.content = json!([
            {"type": "text", "text": "a cat"},
            {"type": "image_url", "image_url": {"url": "http://example/img.png"}},
            {"type": "text", "text": " on a beach"},
        ]);
        assert_eq!(message.rendered_text(), "a cat on a beach");
    }

    #[test]
    fn test_raw_keeps_extra_fields() {
        let payload = json!({
            "id": "m1",
            "role": "assistant",
            "content": "",
            "tool_calls": [{"id": "t1", "name": "image_create"}],
        });
        let message: AgentMessage = serde_json::from_value(payload.clone()).unwrap();
        assert_eq!(message.raw(), payload);
    }

    #[test]
    fn test_to_new_message_carries_keys() {
        let message = AgentMessage::new(ChatRole::User, "hi")
            .with_id("m1")
            .with_run_id("run-1");
        let new = message.to_new_message("session-1");
        assert_eq!(new.message_id.as_deref(), Some("m1"));
        assert_eq!(new.run_id.as_deref(), Some("run-1"));
        assert_eq!(new.session_id, "session-1");
        assert_eq!(new.content, "hi");
    }

    #[test]
    fn test_unknown_event_tag_deserializes() {
        let event: AgentEvent =
            serde_json::from_str(r#"{"kind": "debug_trace", "data": {"x": 1}}"#).unwrap();
        assert!(matches!(event, AgentEvent::Unknown));
    }
}
