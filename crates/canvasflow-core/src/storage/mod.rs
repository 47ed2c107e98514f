//! Message log store with interchangeable backends.
//!
//! One trait, two implementations: a volatile in-process store and a durable
//! redb-backed store. The backend is chosen once at startup via
//! [`open_store`]; business logic only ever sees `Arc<dyn MessageStore>`.

pub mod durable;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::{ChatSession, NewMessage, StoredMessage};

pub use durable::RedbMessageStore;
pub use memory::MemoryMessageStore;

/// Durable per-session chat log.
///
/// Upsert is idempotent on message id: an existing row is rewritten in place
/// (role, content, raw, updated_at) without moving its position in the log;
/// an absent id appends at the tail. Concurrent upserts for the same id are
/// serialized by the backend.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert or update one message row.
    async fn upsert(&self, message: NewMessage) -> Result<StoredMessage>;

    /// All messages for a session, in insertion order.
    async fn history(&self, session_id: &str) -> Result<Vec<StoredMessage>>;

    /// The most recently inserted message, if any.
    async fn latest(&self) -> Result<Option<StoredMessage>>;

    /// Create or update a session record; created_at survives updates.
    async fn save_session(&self, session: ChatSession) -> Result<ChatSession>;

    /// Sessions belonging to a canvas, most recently updated first.
    async fn sessions(&self, canvas_id: &str) -> Result<Vec<ChatSession>>;
}

/// Storage backend, selected by deployment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    Durable { path: String },
}

/// Open the configured message store.
pub fn open_store(backend: &StoreBackend) -> Result<Arc<dyn MessageStore>> {
    Ok(match backend {
        StoreBackend::Memory => Arc::new(MemoryMessageStore::new()),
        StoreBackend::Durable { path } => Arc::new(RedbMessageStore::open(path)?),
    })
}
