//! In-process volatile message store.
//!
//! Used for tests and single-process deployments without persistence. All
//! state sits behind one mutex; the lock is held only for the duration of a
//! single read or write, never across external I/O.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::MessageStore;
use crate::models::{ChatSession, NewMessage, StoredMessage};

#[derive(Default)]
struct MemoryState {
    /// Insertion-ordered log across all sessions.
    messages: Vec<StoredMessage>,
    /// message_id -> position in `messages`.
    index: HashMap<String, usize>,
    sessions: HashMap<String, ChatSession>,
}

/// Volatile [`MessageStore`] backend.
#[derive(Default)]
pub struct MemoryMessageStore {
    inner: Mutex<MemoryState>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn upsert(&self, message: NewMessage) -> Result<StoredMessage> {
        let message_id = message
            .message_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let now = chrono::Utc::now().timestamp_millis();

        let mut state = self.inner.lock();
        let stored = match state.index.get(&message_id).copied() {
            Some(position) => {
                let previous = &state.messages[position];
                let stored = StoredMessage {
                    message_id: message_id.clone(),
                    run_id: message.run_id.or_else(|| previous.run_id.clone()),
                    session_id: message.session_id,
                    role: message.role,
                    content: message.content,
                    raw: message.raw,
                    created_at: previous.created_at,
                    updated_at: now,
                };
                state.messages[position] = stored.clone();
                stored
            }
            None => {
                let stored = StoredMessage {
                    message_id: message_id.clone(),
                    run_id: message.run_id,
                    session_id: message.session_id,
                    role: message.role,
                    content: message.content,
                    raw: message.raw,
                    created_at: now,
                    updated_at: now,
                };
                let position = state.messages.len();
                state.index.insert(message_id, position);
                state.messages.push(stored.clone());
                stored
            }
        };

        Ok(stored)
    }

    async fn history(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        let state = self.inner.lock();
        Ok(state
            .messages
            .iter()
            .filter(|message| message.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn latest(&self) -> Result<Option<StoredMessage>> {
        let state = self.inner.lock();
        Ok(state.messages.last().cloned())
    }

    async fn save_session(&self, session: ChatSession) -> Result<ChatSession> {
        let mut state = self.inner.lock();
        let mut merged = session;
        if let Some(previous) = state.sessions.get(&merged.id) {
            merged.created_at = previous.created_at;
        }
        state.sessions.insert(merged.id.clone(), merged.clone());
        Ok(merged)
    }

    async fn sessions(&self, canvas_id: &str) -> Result<Vec<ChatSession>> {
        let state = self.inner.lock();
        let mut sessions: Vec<ChatSession> = state
            .sessions
            .values()
            .filter(|session| session.canvas_id.as_deref() == Some(canvas_id))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }
}
