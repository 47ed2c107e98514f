//! Message log storage - ordered, upsertable chat message persistence.
//!
//! Messages are stored in a data table keyed by message id, with a separate
//! insertion-order index so a session's history replays in the order rows
//! were first written. Upserts by message id rewrite the data row in place
//! and never touch the index, so re-processing the same terminal snapshot
//! cannot duplicate or reorder a session's log.

use anyhow::Result;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;
use ts_rs::TS;

const MESSAGE_DATA: TableDefinition<&str, &[u8]> = TableDefinition::new("chat_messages:data");
const MESSAGE_ORDER: TableDefinition<&str, (&str, &str)> =
    TableDefinition::new("chat_messages:order");
const MESSAGE_SEQ: TableDefinition<&str, u64> = TableDefinition::new("chat_messages:seq");

const SEQ_KEY: &str = "message";

/// Role of a chat message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, PartialEq, Eq)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
    Tool,
}

/// A message row as stored in the log.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StoredMessage {
    /// Stable idempotency key; unique across the deployment.
    pub message_id: String,
    /// Ephemeral correlation key issued by the agent graph, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub session_id: String,
    pub role: ChatRole,
    /// Rendered text/markdown of the message.
    pub content: String,
    /// Full structured payload, including tool-call descriptors.
    #[ts(type = "any")]
    pub raw: Value,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
}

/// Input for an upsert into the message log.
#[derive(Debug, Clone)]
pub struct NewMessage {
    /// Caller-supplied idempotency key; a fresh id is generated when absent.
    pub message_id: Option<String>,
    pub run_id: Option<String>,
    pub session_id: String,
    pub role: ChatRole,
    pub content: String,
    pub raw: Value,
}

impl NewMessage {
    pub fn new(session_id: impl Into<String>, role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            message_id: None,
            run_id: None,
            session_id: session_id.into(),
            role,
            content: content.into(),
            raw: Value::Null,
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = raw;
        self
    }
}

/// Durable message log backed by redb.
#[derive(Debug, Clone)]
pub struct MessageLogStorage {
    db: Arc<Database>,
}

impl MessageLogStorage {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(MESSAGE_DATA)?;
        write_txn.open_table(MESSAGE_ORDER)?;
        write_txn.open_table(MESSAGE_SEQ)?;
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Insert or update a message row, keyed by message id.
    ///
    /// An existing row keeps its created_at timestamp and its position in the
    /// insertion order; role, content and raw are overwritten. A new row is
    /// appended at the tail of the log.
    pub fn upsert(&self, message: NewMessage) -> Result<StoredMessage> {
        let message_id = message
            .message_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let now = chrono::Utc::now().timestamp_millis();

        let txn = self.db.begin_write()?;
        let stored = {
            let mut data = txn.open_table(MESSAGE_DATA)?;

            let previous = match data.get(message_id.as_str())? {
                Some(existing) => Some(serde_json::from_slice::<StoredMessage>(existing.value())?),
                None => None,
            };

            let stored = match &previous {
                Some(prev) => StoredMessage {
                    message_id: message_id.clone(),
                    run_id: message.run_id.or_else(|| prev.run_id.clone()),
                    session_id: message.session_id,
                    role: message.role,
                    content: message.content,
                    raw: message.raw,
                    created_at: prev.created_at,
                    updated_at: now,
                },
                None => StoredMessage {
                    message_id: message_id.clone(),
                    run_id: message.run_id,
                    session_id: message.session_id,
                    role: message.role,
                    content: message.content,
                    raw: message.raw,
                    created_at: now,
                    updated_at: now,
                },
            };

            let serialized = serde_json::to_vec(&stored)?;
            data.insert(message_id.as_str(), serialized.as_slice())?;
            drop(data);

            if previous.is_none() {
                let mut seq = txn.open_table(MESSAGE_SEQ)?;
                let next = seq.get(SEQ_KEY)?.map(|v| v.value()).unwrap_or(0) + 1;
                seq.insert(SEQ_KEY, next)?;
                drop(seq);

                let mut order = txn.open_table(MESSAGE_ORDER)?;
                order.insert(
                    Self::order_key(next).as_str(),
                    (stored.session_id.as_str(), message_id.as_str()),
                )?;
            }

            stored
        };
        txn.commit()?;

        Ok(stored)
    }

    /// All messages for a session, in insertion order.
    ///
    /// Rows whose data is missing or unreadable are skipped so one damaged
    /// entry cannot hide the rest of the history.
    pub fn history(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        let read_txn = self.db.begin_read()?;
        let order = read_txn.open_table(MESSAGE_ORDER)?;
        let data = read_txn.open_table(MESSAGE_DATA)?;

        let mut messages = Vec::new();
        for item in order.iter()? {
            let (_, entry) = item?;
            let (owner, message_id) = entry.value();
            if owner != session_id {
                continue;
            }
            match Self::load(&data, message_id)? {
                Some(message) => messages.push(message),
                None => warn!(session_id, message_id, "Indexed message row missing"),
            }
        }

        Ok(messages)
    }

    /// The most recently inserted message across all sessions, if any.
    pub fn latest(&self) -> Result<Option<StoredMessage>> {
        let read_txn = self.db.begin_read()?;
        let order = read_txn.open_table(MESSAGE_ORDER)?;
        let data = read_txn.open_table(MESSAGE_DATA)?;

        if let Some((_, entry)) = order.last()? {
            let (_, message_id) = entry.value();
            Self::load(&data, message_id)
        } else {
            Ok(None)
        }
    }

    /// Check if a message id exists.
    pub fn exists(&self, message_id: &str) -> Result<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MESSAGE_DATA)?;
        Ok(table.get(message_id)?.is_some())
    }

    /// Count all message rows.
    pub fn count(&self) -> Result<usize> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MESSAGE_DATA)?;
        Ok(table.len()? as usize)
    }

    fn load(
        data: &impl ReadableTable<&'static str, &'static [u8]>,
        message_id: &str,
    ) -> Result<Option<StoredMessage>> {
        if let Some(bytes) = data.get(message_id)? {
            match serde_json::from_slice(bytes.value()) {
                Ok(message) => Ok(Some(message)),
                Err(error) => {
                    warn!(message_id, error = %error, "Failed to decode message row");
                    Ok(None)
                }
            }
        } else {
            Ok(None)
        }
    }

    fn order_key(seq: u64) -> String {
        format!("{seq:020}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn setup() -> (MessageLogStorage, tempfile::TempDir) {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(Database::create(db_path).unwrap());
        let storage = MessageLogStorage::new(db).unwrap();
        (storage, temp_dir)
    }

    #[test]
    fn test_upsert_inserts_and_generates_id() {
        let (storage, _temp_dir) = setup();

        let stored = storage
            .upsert(NewMessage::new("session-1", ChatRole::User, "hello"))
            .unwrap();

        assert!(!stored.message_id.is_empty());
        assert_eq!(stored.session_id, "session-1");
        assert_eq!(stored.created_at, stored.updated_at);
        assert!(storage.exists(&stored.message_id).unwrap());
    }

    #[test]
    fn test_upsert_is_idempotent_on_message_id() {
        let (storage, _temp_dir) = setup();

        let first = storage
            .upsert(NewMessage::new("session-1", ChatRole::Assistant, "draft").with_message_id("m1"))
            .unwrap();
        let second = storage
            .upsert(NewMessage::new("session-1", ChatRole::Assistant, "final").with_message_id("m1"))
            .unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert_eq!(storage.count().unwrap(), 1);

        let history = storage.history("session-1").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "final");
    }

    #[test]
    fn test_upsert_preserves_ordering_position() {
        let (storage, _temp_dir) = setup();

        for id in ["m1", "m2", "m3"] {
            storage
                .upsert(NewMessage::new("session-1", ChatRole::User, id).with_message_id(id))
                .unwrap();
        }
        storage
            .upsert(NewMessage::new("session-1", ChatRole::User, "rewritten").with_message_id("m1"))
            .unwrap();

        let history = storage.history("session-1").unwrap();
        let ids: Vec<&str> = history.iter().map(|m| m.message_id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
        assert_eq!(history[0].content, "rewritten");
    }

    #[test]
    fn test_history_is_partitioned_by_session() {
        let (storage, _temp_dir) = setup();

        storage
            .upsert(NewMessage::new("session-1", ChatRole::User, "a").with_message_id("a1"))
            .unwrap();
        storage
            .upsert(NewMessage::new("session-2", ChatRole::User, "b").with_message_id("b1"))
            .unwrap();
        storage
            .upsert(NewMessage::new("session-1", ChatRole::Assistant, "c").with_message_id("a2"))
            .unwrap();

        let history = storage.history("session-1").unwrap();
        let ids: Vec<&str> = history.iter().map(|m| m.message_id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2"]);
    }

    #[test]
    fn test_latest_tracks_insertion_not_update() {
        let (storage, _temp_dir) = setup();

        assert!(storage.latest().unwrap().is_none());

        storage
            .upsert(NewMessage::new("session-1", ChatRole::User, "first").with_message_id("m1"))
            .unwrap();
        storage
            .upsert(NewMessage::new("session-1", ChatRole::Assistant, "second").with_message_id("m2"))
            .unwrap();
        storage
            .upsert(NewMessage::new("session-1", ChatRole::User, "edited").with_message_id("m1"))
            .unwrap();

        let latest = storage.latest().unwrap().unwrap();
        assert_eq!(latest.message_id, "m2");
    }

    #[test]
    fn test_raw_payload_round_trip() {
        let (storage, _temp_dir) = setup();

        let raw = json!({"role": "assistant", "tool_calls": [{"id": "t1", "name": "image_create"}]});
        storage
            .upsert(
                NewMessage::new("session-1", ChatRole::Assistant, "")
                    .with_message_id("m1")
                    .with_run_id("run-9")
                    .with_raw(raw.clone()),
            )
            .unwrap();

        let history = storage.history("session-1").unwrap();
        assert_eq!(history[0].raw, raw);
        assert_eq!(history[0].run_id.as_deref(), Some("run-9"));
    }
}
