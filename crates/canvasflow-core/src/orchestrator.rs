//! Session orchestrator - the turn lifecycle around the stream processor.
//!
//! A turn moves through started -> streaming -> {completed | cancelled |
//! failed}, and always ends with the same cleanup: the registry entry is
//! removed and observers receive a done event, no matter how the stream
//! ended.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::agent::{AgentInvoker, TurnContext};
use crate::broadcast::SessionBroadcaster;
use crate::config::ToolConfirmationPolicy;
use crate::error::Result;
use crate::models::{AgentMessage, ChatSession, SessionUpdate, StoredMessage};
use crate::registry::StreamTaskRegistry;
use crate::storage::MessageStore;
use crate::stream::StreamProcessor;

const EVENT_BUFFER: usize = 64;
const TITLE_MAX_CHARS: usize = 200;

/// One chat turn submitted by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurnRequest {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canvas_id: Option<String>,
    /// Ordered prior messages, ending with the new user message.
    pub messages: Vec<AgentMessage>,
    pub model: String,
    pub provider: String,
}

/// Terminal state of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    Completed,
    Cancelled,
    Failed,
}

/// Result of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    Cancelled,
    NotFoundOrDone,
}

/// Wires the store, registry, broadcaster and agent graph into one turn
/// pipeline. Shared across sessions; each turn runs independently.
pub struct SessionOrchestrator {
    store: Arc<dyn MessageStore>,
    broadcaster: SessionBroadcaster,
    registry: Arc<StreamTaskRegistry>,
    agent: Arc<dyn AgentInvoker>,
    confirmation: ToolConfirmationPolicy,
}

impl SessionOrchestrator {
    pub fn new(
        store: Arc<dyn MessageStore>,
        broadcaster: SessionBroadcaster,
        registry: Arc<StreamTaskRegistry>,
        agent: Arc<dyn AgentInvoker>,
        confirmation: ToolConfirmationPolicy,
    ) -> Self {
        Self {
            store,
            broadcaster,
            registry,
            agent,
            confirmation,
        }
    }

    /// Run one chat turn to its terminal state.
    ///
    /// Agent failures are terminal for the turn but not for the caller: they
    /// surface as [`TurnOutcome::Failed`] plus an error broadcast, never as
    /// an `Err`. Errors before streaming starts (a failed user-message write,
    /// a busy session) are caller errors and do propagate.
    pub async fn handle_turn(&self, request: ChatTurnRequest) -> Result<TurnOutcome> {
        let session_id = request.session_id.clone();
        let canvas_id = request.canvas_id.clone();

        // First turn of a conversation: record the session itself.
        if request.messages.len() == 1 {
            let title = title_from_prompt(&request.messages[0]);
            let mut session =
                ChatSession::new(&session_id, title, &request.model, &request.provider);
            if let Some(canvas) = &canvas_id {
                session = session.with_canvas(canvas.clone());
            }
            self.store.save_session(session).await?;
        }

        // The triggering user message is durable before the agent starts, so
        // a crash mid-stream still leaves a consistent log.
        if let Some(last) = request.messages.last() {
            self.store.upsert(last.to_new_message(&session_id)).await?;
        }

        let task = self.registry.register(&session_id)?;
        debug!(session_id = %session_id, "Chat turn registered, starting stream");

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let context = TurnContext {
            session_id: session_id.clone(),
            canvas_id: canvas_id.clone(),
            messages: request.messages.clone(),
        };
        let agent = Arc::clone(&self.agent);
        let agent_cancel = task.cancel_token();
        let invocation =
            tokio::spawn(async move { agent.invoke(context, events_tx, agent_cancel).await });

        let mut processor = StreamProcessor::new(
            &session_id,
            canvas_id.clone(),
            Arc::clone(&self.store),
            self.broadcaster.clone(),
            self.confirmation.clone(),
            request.messages.len(),
        );
        processor.run(events_rx, task.cancel_token()).await;

        let outcome = if task.is_cancelled() {
            invocation.abort();
            info!(session_id = %session_id, "Chat turn cancelled during stream");
            TurnOutcome::Cancelled
        } else {
            match invocation.await {
                Ok(Ok(())) => TurnOutcome::Completed,
                Ok(Err(error)) => {
                    warn!(session_id = %session_id, error = %error, "Agent invocation failed");
                    self.broadcaster.send(SessionUpdate::error(
                        &session_id,
                        canvas_id.as_deref(),
                        &error.to_string(),
                    ));
                    TurnOutcome::Failed
                }
                Err(join_error) => {
                    warn!(
                        session_id = %session_id,
                        error = %join_error,
                        "Agent invocation died unexpectedly"
                    );
                    self.broadcaster.send(SessionUpdate::error(
                        &session_id,
                        canvas_id.as_deref(),
                        &join_error.to_string(),
                    ));
                    TurnOutcome::Failed
                }
            }
        };

        // Cleanup runs for every terminal state: the registry entry goes
        // away and observers always get a done event.
        task.mark_done();
        self.registry.unregister(&session_id);
        self.broadcaster
            .send(SessionUpdate::done(&session_id, canvas_id.as_deref()));

        Ok(outcome)
    }

    /// Request cancellation of the session's in-flight turn.
    pub fn cancel(&self, session_id: &str) -> CancelOutcome {
        match self.registry.lookup(session_id) {
            Some(task) if !task.is_done() => {
                task.cancel();
                CancelOutcome::Cancelled
            }
            _ => CancelOutcome::NotFoundOrDone,
        }
    }

    /// Stored history for a session, in insertion order.
    pub async fn history(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        Ok(self.store.history(session_id).await?)
    }

    /// The most recently stored message across all sessions.
    pub async fn latest_message(&self) -> Result<Option<StoredMessage>> {
        Ok(self.store.latest().await?)
    }

    /// Sessions belonging to a canvas.
    pub async fn sessions(&self, canvas_id: &str) -> Result<Vec<ChatSession>> {
        Ok(self.store.sessions(canvas_id).await?)
    }
}

fn title_from_prompt(message: &AgentMessage) -> String {
    message
        .rendered_text()
        .chars()
        .take(TITLE_MAX_CHARS)
        .collect()
}
