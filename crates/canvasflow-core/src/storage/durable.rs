//! Durable message store backed by canvasflow-storage's redb tables.

use anyhow::Result;
use async_trait::async_trait;
use canvasflow_storage::Storage;

use super::MessageStore;
use crate::models::{ChatSession, NewMessage, StoredMessage};

/// Durable [`MessageStore`] backend.
///
/// Upserts run inside a single write transaction, so concurrent writers for
/// the same message id serialize at the database layer.
pub struct RedbMessageStore {
    storage: Storage,
}

impl RedbMessageStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &str) -> Result<Self> {
        Ok(Self {
            storage: Storage::new(path)?,
        })
    }

    /// Wrap an already-initialized storage instance.
    pub fn from_storage(storage: Storage) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl MessageStore for RedbMessageStore {
    async fn upsert(&self, message: NewMessage) -> Result<StoredMessage> {
        self.storage.messages.upsert(message)
    }

    async fn history(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        self.storage.messages.history(session_id)
    }

    async fn latest(&self) -> Result<Option<StoredMessage>> {
        self.storage.messages.latest()
    }

    async fn save_session(&self, session: ChatSession) -> Result<ChatSession> {
        self.storage.sessions.save(&session)
    }

    async fn sessions(&self, canvas_id: &str) -> Result<Vec<ChatSession>> {
        self.storage.sessions.list_by_canvas(canvas_id)
    }
}
