//! Chat session storage - session records grouped by canvas.
//!
//! Sessions are created on a conversation's first turn and are never deleted
//! by the streaming subsystem, so this storage intentionally exposes no
//! delete operation.

use anyhow::Result;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ts_rs::TS;

const CHAT_SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("chat_sessions");

/// Chat session representing one persisted conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ChatSession {
    /// Stable, caller-supplied session id.
    pub id: String,
    /// Optional grouping context for multi-session canvases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canvas_id: Option<String>,
    pub title: String,
    pub model: String,
    pub provider: String,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
}

impl ChatSession {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        model: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: id.into(),
            canvas_id: None,
            title: title.into(),
            model: model.into(),
            provider: provider.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_canvas(mut self, canvas_id: impl Into<String>) -> Self {
        self.canvas_id = Some(canvas_id.into());
        self
    }
}

/// Session record storage backed by redb.
#[derive(Debug, Clone)]
pub struct ChatSessionStorage {
    db: Arc<Database>,
}

impl ChatSessionStorage {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(CHAT_SESSIONS)?;
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Save a session (create or update).
    ///
    /// An existing record keeps its created_at timestamp.
    pub fn save(&self, session: &ChatSession) -> Result<ChatSession> {
        let existing = self.get(&session.id)?;
        let mut merged = session.clone();
        if let Some(previous) = existing {
            merged.created_at = previous.created_at;
        }

        let json = serde_json::to_vec(&merged)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CHAT_SESSIONS)?;
            table.insert(merged.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(merged)
    }

    /// Get a session by id.
    pub fn get(&self, id: &str) -> Result<Option<ChatSession>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CHAT_SESSIONS)?;

        if let Some(bytes) = table.get(id)? {
            Ok(Some(serde_json::from_slice(bytes.value())?))
        } else {
            Ok(None)
        }
    }

    /// List sessions belonging to a canvas, most recently updated first.
    pub fn list_by_canvas(&self, canvas_id: &str) -> Result<Vec<ChatSession>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CHAT_SESSIONS)?;

        let mut sessions = Vec::new();
        for item in table.iter()? {
            let (_, bytes) = item?;
            let session: ChatSession = serde_json::from_slice(bytes.value())?;
            if session.canvas_id.as_deref() == Some(canvas_id) {
                sessions.push(session);
            }
        }
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(sessions)
    }

    /// Check if a session exists.
    pub fn exists(&self, id: &str) -> Result<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CHAT_SESSIONS)?;
        Ok(table.get(id)?.is_some())
    }

    /// Count all sessions.
    pub fn count(&self) -> Result<usize> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CHAT_SESSIONS)?;
        Ok(table.len()? as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn setup() -> (ChatSessionStorage, tempfile::TempDir) {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(Database::create(db_path).unwrap());
        let storage = ChatSessionStorage::new(db).unwrap();
        (storage, temp_dir)
    }

    #[test]
    fn test_save_and_get() {
        let (storage, _temp_dir) = setup();

        let session =
            ChatSession::new("session-1", "A cat on a beach", "gpt-4o", "openai")
                .with_canvas("canvas-1");
        storage.save(&session).unwrap();

        let retrieved = storage.get("session-1").unwrap().unwrap();
        assert_eq!(retrieved.title, "A cat on a beach");
        assert_eq!(retrieved.canvas_id.as_deref(), Some("canvas-1"));
    }

    #[test]
    fn test_save_twice_keeps_created_at() {
        let (storage, _temp_dir) = setup();

        let session = ChatSession::new("session-1", "First", "gpt-4o", "openai");
        let first = storage.save(&session).unwrap();

        let mut renamed = first.clone();
        renamed.title = "Second".to_string();
        let second = storage.save(&renamed).unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert_eq!(storage.count().unwrap(), 1);
        assert_eq!(storage.get("session-1").unwrap().unwrap().title, "Second");
    }

    #[test]
    fn test_list_by_canvas_filters_and_sorts() {
        let (storage, _temp_dir) = setup();

        let mut a = ChatSession::new("s1", "a", "gpt-4o", "openai").with_canvas("canvas-1");
        a.updated_at = 1000;
        let mut b = ChatSession::new("s2", "b", "gpt-4o", "openai").with_canvas("canvas-1");
        b.updated_at = 3000;
        let c = ChatSession::new("s3", "c", "gpt-4o", "openai").with_canvas("canvas-2");

        for session in [&a, &b, &c] {
            storage.save(session).unwrap();
        }

        let sessions = storage.list_by_canvas("canvas-1").unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, "s2");
        assert_eq!(sessions[1].id, "s1");
    }

    #[test]
    fn test_get_nonexistent() {
        let (storage, _temp_dir) = setup();
        assert!(storage.get("missing").unwrap().is_none());
        assert!(!storage.exists("missing").unwrap());
    }
}
