//! Canvasflow Storage - durable persistence layer for chat sessions.
//!
//! This crate provides the persistence layer for Canvasflow, using redb as the
//! embedded database. It owns the on-disk message log and session records;
//! higher-level orchestration lives in the canvasflow-core crate.
//!
//! # Tables
//!
//! - `chat_sessions` - Session records, keyed by session id
//! - `chat_messages:data` - Message rows, keyed by message id
//! - `chat_messages:order` - Insertion-order index mapping a global sequence
//!   number to `(session_id, message_id)`
//! - `chat_messages:seq` - Monotonic sequence counter

pub mod chat_session;
pub mod message_log;

use anyhow::Result;
use redb::Database;
use std::sync::Arc;

pub use chat_session::{ChatSession, ChatSessionStorage};
pub use message_log::{ChatRole, MessageLogStorage, NewMessage, StoredMessage};

/// Central storage manager that initializes all storage subsystems.
pub struct Storage {
    db: Arc<Database>,
    pub sessions: ChatSessionStorage,
    pub messages: MessageLogStorage,
}

impl Storage {
    /// Create a new storage instance at the given path.
    ///
    /// This will create the database file if it doesn't exist and initialize
    /// all required tables.
    pub fn new(path: &str) -> Result<Self> {
        let db = Arc::new(Database::create(path)?);

        let sessions = ChatSessionStorage::new(db.clone())?;
        let messages = MessageLogStorage::new(db.clone())?;

        Ok(Self {
            db,
            sessions,
            messages,
        })
    }

    /// Get a reference to the underlying database
    pub fn get_db(&self) -> Arc<Database> {
        self.db.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_storage_initializes_all_tables() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let storage = Storage::new(db_path.to_str().unwrap()).unwrap();

        assert_eq!(storage.messages.count().unwrap(), 0);
        assert_eq!(storage.sessions.count().unwrap(), 0);
    }
}
