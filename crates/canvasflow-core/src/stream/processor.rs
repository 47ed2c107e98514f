//! Stream processor - reconstructs messages from one agent invocation.
//!
//! The processor consumes the invocation's event stream and produces three
//! kinds of outward effects: live delta broadcasts, full-snapshot broadcasts,
//! and message-log writes. Broadcasts are best-effort; the log write path is
//! the durable one, and only snapshot events touch it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::broadcast::SessionBroadcaster;
use crate::config::ToolConfirmationPolicy;
use crate::error::Result;
use crate::models::{
    AgentEvent, AgentMessage, MessageFragment, SessionUpdate, ToolCallChunk, ToolCallHeader,
};
use crate::storage::MessageStore;
use crate::stream::classify::{FragmentKind, classify};

/// Partially assembled tool call; lives for one processor run only.
#[derive(Debug)]
struct PendingToolCall {
    name: String,
    arguments: String,
}

/// Consumes one invocation's event stream.
pub struct StreamProcessor {
    session_id: String,
    canvas_id: Option<String>,
    store: Arc<dyn MessageStore>,
    broadcaster: SessionBroadcaster,
    confirmation: ToolConfirmationPolicy,
    /// Count of messages already durably saved for this session.
    last_saved: usize,
    pending: HashMap<String, PendingToolCall>,
    started_calls: HashSet<String>,
    last_streaming_call_id: Option<String>,
}

impl StreamProcessor {
    pub fn new(
        session_id: impl Into<String>,
        canvas_id: Option<String>,
        store: Arc<dyn MessageStore>,
        broadcaster: SessionBroadcaster,
        confirmation: ToolConfirmationPolicy,
        last_saved: usize,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            canvas_id,
            store,
            broadcaster,
            confirmation,
            last_saved,
            pending: HashMap::new(),
            started_calls: HashSet::new(),
            last_streaming_call_id: None,
        }
    }

    /// Drive the stream until it ends or cancellation is observed.
    ///
    /// A failure while handling one event is logged and the loop continues
    /// with the next event; nothing here takes the whole stream down.
    pub async fn run(&mut self, mut events: mpsc::Receiver<AgentEvent>, cancel: CancellationToken) {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            if let Err(error) = self.handle_event(event).await {
                warn!(
                    session_id = %self.session_id,
                    error = %error,
                    "Failed to process agent event; continuing"
                );
            }

            if cancel.is_cancelled() {
                break;
            }
        }

        // A cancelled turn must not leak half-built tool calls.
        self.pending.clear();
        self.last_streaming_call_id = None;
    }

    async fn handle_event(&mut self, event: AgentEvent) -> Result<()> {
        match event {
            AgentEvent::Snapshot { messages } => self.handle_snapshot(&messages).await,
            AgentEvent::Message { fragment } => self.handle_fragment(fragment).await,
            AgentEvent::Unknown => Ok(()),
        }
    }

    /// Broadcast the full message list, then persist everything past the
    /// already-saved prefix.
    ///
    /// Observation and persistence are decoupled: the broadcast goes out even
    /// if every write fails. A failed write does not block later messages in
    /// the batch, but rewinds the saved offset so the next snapshot retries
    /// from the first gap; upserts are idempotent, so re-writing the suffix
    /// is safe.
    async fn handle_snapshot(&mut self, messages: &[AgentMessage]) -> Result<()> {
        let raw: Vec<Value> = messages.iter().map(AgentMessage::raw).collect();
        self.broadcaster.send(SessionUpdate::all_messages(
            &self.session_id,
            self.canvas_id.as_deref(),
            raw,
        ));

        let mut first_failure = None;
        for (position, message) in messages.iter().enumerate().skip(self.last_saved) {
            if let Err(error) = self
                .store
                .upsert(message.to_new_message(&self.session_id))
                .await
            {
                warn!(
                    session_id = %self.session_id,
                    position,
                    error = %error,
                    "Failed to persist snapshot message; will retry on next snapshot"
                );
                first_failure.get_or_insert(position);
            }
        }
        self.last_saved = first_failure.unwrap_or(messages.len());

        Ok(())
    }

    async fn handle_fragment(&mut self, fragment: MessageFragment) -> Result<()> {
        match classify(&fragment) {
            FragmentKind::ToolResult => {
                // Results reach the log via the covering snapshot; surfacing
                // them here is the lower-latency path for observers.
                if let Some(result) = fragment.tool_result {
                    self.broadcaster.send(SessionUpdate::tool_call_result(
                        &self.session_id,
                        self.canvas_id.as_deref(),
                        &result.call_id,
                        result.message.raw(),
                    ));
                }
            }
            FragmentKind::Text => {
                if let Some(text) = fragment.text.as_deref() {
                    self.broadcaster.send(SessionUpdate::delta(
                        &self.session_id,
                        self.canvas_id.as_deref(),
                        text,
                    ));
                }
            }
            FragmentKind::ToolCallStart => self.handle_tool_call_starts(&fragment.tool_calls),
            FragmentKind::ToolCallArguments => {
                self.handle_argument_chunks(&fragment.tool_call_chunks)
            }
            FragmentKind::Empty => {}
        }
        Ok(())
    }

    fn handle_tool_call_starts(&mut self, calls: &[ToolCallHeader]) {
        for call in calls {
            if call.name.is_empty() || !self.started_calls.insert(call.id.clone()) {
                continue;
            }

            self.pending.insert(
                call.id.clone(),
                PendingToolCall {
                    name: call.name.clone(),
                    arguments: String::new(),
                },
            );
            self.last_streaming_call_id = Some(call.id.clone());

            if self.confirmation.requires_confirmation(&call.name) {
                debug!(
                    session_id = %self.session_id,
                    tool = %call.name,
                    "Tool drives its own confirmation flow; suppressing start event"
                );
                continue;
            }

            self.broadcaster.send(SessionUpdate::tool_call(
                &self.session_id,
                self.canvas_id.as_deref(),
                &call.id,
                &call.name,
            ));
        }
    }

    fn handle_argument_chunks(&mut self, chunks: &[ToolCallChunk]) {
        for chunk in chunks {
            if chunk.name.is_some() {
                // Opening chunk; continuations follow under this id.
                if let Some(id) = &chunk.id {
                    self.last_streaming_call_id = Some(id.clone());
                }
                continue;
            }

            let Some(call_id) = chunk
                .id
                .clone()
                .or_else(|| self.last_streaming_call_id.clone())
            else {
                warn!(
                    session_id = %self.session_id,
                    "Dropping argument chunk with no active tool call"
                );
                continue;
            };
            let Some(pending) = self.pending.get_mut(&call_id) else {
                warn!(
                    session_id = %self.session_id,
                    call_id = %call_id,
                    "Dropping argument chunk for unknown tool call"
                );
                continue;
            };
            let Some(text) = chunk.arguments.as_deref() else {
                continue;
            };

            pending.arguments.push_str(text);
            self.last_streaming_call_id = Some(call_id.clone());
            self.broadcaster.send(SessionUpdate::tool_call_arguments(
                &self.session_id,
                self.canvas_id.as_deref(),
                &call_id,
                text,
            ));
        }
    }

    /// Accumulated argument text for a pending call, if any.
    pub fn pending_arguments(&self, call_id: &str) -> Option<&str> {
        self.pending
            .get(call_id)
            .map(|pending| pending.arguments.as_str())
    }

    /// Name a pending call was started with, if any.
    pub fn pending_name(&self, call_id: &str) -> Option<&str> {
        self.pending
            .get(call_id)
            .map(|pending| pending.name.as_str())
    }
}
