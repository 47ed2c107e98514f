//! Seam to the agent execution graph.
//!
//! The graph plans and executes model and tool calls for one conversational
//! turn. This crate treats it as an opaque event producer: implementations
//! push [`AgentEvent`]s into the channel as generation progresses and return
//! when the invocation ends.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::models::{AgentEvent, AgentMessage};

/// Context handed to the agent graph for one turn.
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub session_id: String,
    pub canvas_id: Option<String>,
    /// Ordered prior messages, ending with the triggering user message.
    pub messages: Vec<AgentMessage>,
}

/// Agent execution graph for dependency injection.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// Run one invocation, streaming events into `events`.
    ///
    /// Implementations should stop generating promptly once `cancel` fires;
    /// the consumer side stops reading regardless. Dropping the sender ends
    /// the stream.
    async fn invoke(
        &self,
        context: TurnContext,
        events: mpsc::Sender<AgentEvent>,
        cancel: CancellationToken,
    ) -> anyhow::Result<()>;
}
