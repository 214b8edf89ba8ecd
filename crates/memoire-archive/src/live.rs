//! Live-store collaborators.
//!
//! The archival engine consumes the live chat list and the live message
//! store through these traits; it never reaches into their internals.  Two
//! implementations ship with the crate: an in-memory store useful as a test
//! double, and a SQLite-backed store colocated with the archive database so
//! a deployment can run everything on one file.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::{ArchiveError, Result};
use crate::models::{LiveChat, LiveMessage, MessagePriority, MessageStatus};
use crate::rows::millis_to_utc;

/// The chat list the engine archives from and restores into.
pub trait LiveChatStore: Send + Sync {
    fn all_chats(&self) -> Result<Vec<LiveChat>>;
    fn chat(&self, chat_id: &str) -> Result<Option<LiveChat>>;
    fn save_chat(&self, chat: &LiveChat) -> Result<()>;
    fn remove_chat(&self, chat_id: &str) -> Result<()>;
}

/// The message store the engine drains on archive and replays into on
/// restore.
pub trait LiveMessageStore: Send + Sync {
    fn messages(&self, chat_id: &str) -> Result<Vec<LiveMessage>>;
    fn save_message(&self, message: &LiveMessage) -> Result<()>;
    fn clear_messages(&self, chat_id: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// In-memory store (test double)
// ---------------------------------------------------------------------------

/// In-memory live store.  Individual message saves can be made to fail, to
/// exercise the partial-restore path.
#[derive(Default)]
pub struct MemoryLiveStore {
    chats: Mutex<HashMap<String, LiveChat>>,
    messages: Mutex<HashMap<String, Vec<LiveMessage>>>,
    failing_message_ids: Mutex<Vec<String>>,
}

impl MemoryLiveStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed a chat together with its messages.
    pub fn seed_chat(&self, chat: LiveChat, messages: Vec<LiveMessage>) {
        let chat_id = chat.id.clone();
        self.chats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(chat_id.clone(), chat);
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(chat_id, messages);
    }

    /// Make future saves of the given message id fail.
    pub fn fail_saves_for(&self, message_id: &str) {
        self.failing_message_ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message_id.to_string());
    }
}

impl LiveChatStore for MemoryLiveStore {
    fn all_chats(&self) -> Result<Vec<LiveChat>> {
        Ok(self
            .chats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect())
    }

    fn chat(&self, chat_id: &str) -> Result<Option<LiveChat>> {
        Ok(self
            .chats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(chat_id)
            .cloned())
    }

    fn save_chat(&self, chat: &LiveChat) -> Result<()> {
        self.chats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(chat.id.clone(), chat.clone());
        Ok(())
    }

    fn remove_chat(&self, chat_id: &str) -> Result<()> {
        self.chats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(chat_id);
        Ok(())
    }
}

impl LiveMessageStore for MemoryLiveStore {
    fn messages(&self, chat_id: &str) -> Result<Vec<LiveMessage>> {
        Ok(self
            .messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(chat_id)
            .cloned()
            .unwrap_or_default())
    }

    fn save_message(&self, message: &LiveMessage) -> Result<()> {
        let failing = self
            .failing_message_ids
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if failing.iter().any(|id| id == &message.id) {
            return Err(ArchiveError::LiveStore(format!(
                "simulated save failure for message {}",
                message.id
            )));
        }
        drop(failing);

        let mut messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        let list = messages.entry(message.chat_id.clone()).or_default();
        list.retain(|m| m.id != message.id);
        list.push(message.clone());
        list.sort_by_key(|m| m.timestamp);
        Ok(())
    }

    fn clear_messages(&self, chat_id: &str) -> Result<()> {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(chat_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SQLite-backed store
// ---------------------------------------------------------------------------

/// Live store persisted in the `live_chats` / `live_messages` tables of the
/// archive database.  JSON columns are stored in the clear; field-level
/// encryption is an archival concern.
pub struct SqliteLiveStore {
    db: Arc<Database>,
}

impl SqliteLiveStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl LiveChatStore for SqliteLiveStore {
    fn all_chats(&self) -> Result<Vec<LiveChat>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, contact_name, contact_public_key, last_message_time,
                    unread_count, is_online, has_unsent
             FROM live_chats
             ORDER BY last_message_time DESC",
        )?;
        let rows = stmt.query_map([], row_to_live_chat)?;

        let mut chats = Vec::new();
        for row in rows {
            chats.push(row?);
        }
        Ok(chats)
    }

    fn chat(&self, chat_id: &str) -> Result<Option<LiveChat>> {
        let conn = self.db.lock()?;
        let chat = conn
            .query_row(
                "SELECT id, contact_name, contact_public_key, last_message_time,
                        unread_count, is_online, has_unsent
                 FROM live_chats WHERE id = ?1",
                params![chat_id],
                row_to_live_chat,
            )
            .optional()?;
        Ok(chat)
    }

    fn save_chat(&self, chat: &LiveChat) -> Result<()> {
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO live_chats
                 (id, contact_name, contact_public_key, last_message_time,
                  unread_count, is_online, has_unsent)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                chat.id,
                chat.contact_name,
                chat.contact_public_key,
                chat.last_message_time.map(|t| t.timestamp_millis()),
                chat.unread_count,
                chat.is_online,
                chat.has_unsent_messages,
            ],
        )?;
        Ok(())
    }

    fn remove_chat(&self, chat_id: &str) -> Result<()> {
        let conn = self.db.lock()?;
        conn.execute("DELETE FROM live_chats WHERE id = ?1", params![chat_id])?;
        Ok(())
    }
}

impl LiveMessageStore for SqliteLiveStore {
    fn messages(&self, chat_id: &str) -> Result<Vec<LiveMessage>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, chat_id, content, timestamp, is_from_me, status,
                    reply_to_message_id, thread_id, is_starred, is_forwarded, priority,
                    edited_at, original_content, has_media, media_type, metadata_json,
                    delivery_receipt_json, read_receipt_json, reactions_json,
                    attachments_json, encryption_info_json
             FROM live_messages
             WHERE chat_id = ?1
             ORDER BY timestamp ASC",
        )?;
        let rows = stmt.query_map(params![chat_id], row_to_live_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    fn save_message(&self, message: &LiveMessage) -> Result<()> {
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO live_messages
                 (id, chat_id, content, timestamp, is_from_me, status,
                  reply_to_message_id, thread_id, is_starred, is_forwarded, priority,
                  edited_at, original_content, has_media, media_type, metadata_json,
                  delivery_receipt_json, read_receipt_json, reactions_json,
                  attachments_json, encryption_info_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                     ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
            params![
                message.id,
                message.chat_id,
                message.content,
                message.timestamp.timestamp_millis(),
                message.is_from_me,
                message.status.as_str(),
                message.reply_to_message_id,
                message.thread_id,
                message.is_starred,
                message.is_forwarded,
                message.priority.as_str(),
                message.edited_at.map(|t| t.timestamp_millis()),
                message.original_content,
                message.has_media,
                message.media_type,
                to_json_column(&message.metadata)?,
                to_json_column(&message.delivery_receipt)?,
                to_json_column(&message.read_receipt)?,
                if message.reactions.is_empty() {
                    None
                } else {
                    Some(serde_json::to_string(&message.reactions)?)
                },
                if message.attachments.is_empty() {
                    None
                } else {
                    Some(serde_json::to_string(&message.attachments)?)
                },
                to_json_column(&message.encryption_info)?,
            ],
        )?;
        Ok(())
    }

    fn clear_messages(&self, chat_id: &str) -> Result<()> {
        let conn = self.db.lock()?;
        conn.execute(
            "DELETE FROM live_messages WHERE chat_id = ?1",
            params![chat_id],
        )?;
        Ok(())
    }
}

fn to_json_column<T: serde::Serialize>(value: &Option<T>) -> Result<Option<String>> {
    value
        .as_ref()
        .map(|v| serde_json::to_string(v).map_err(Into::into))
        .transpose()
}

fn row_to_live_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<LiveChat> {
    Ok(LiveChat {
        id: row.get(0)?,
        contact_name: row.get(1)?,
        contact_public_key: row.get(2)?,
        last_message_time: row.get::<_, Option<i64>>(3)?.map(millis_to_utc),
        unread_count: row.get::<_, i64>(4)?.max(0) as u32,
        is_online: row.get(5)?,
        has_unsent_messages: row.get(6)?,
    })
}

fn parse_json_column<T: serde::de::DeserializeOwned>(value: Option<String>) -> Option<T> {
    value.as_deref().and_then(|j| serde_json::from_str(j).ok())
}

fn row_to_live_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<LiveMessage> {
    let status: String = row.get(5)?;
    let priority: String = row.get(10)?;

    Ok(LiveMessage {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        content: row.get(2)?,
        timestamp: millis_to_utc(row.get(3)?),
        is_from_me: row.get(4)?,
        status: MessageStatus::parse(&status),
        reply_to_message_id: row.get(6)?,
        thread_id: row.get(7)?,
        is_starred: row.get(8)?,
        is_forwarded: row.get(9)?,
        priority: MessagePriority::parse(&priority),
        edited_at: row.get::<_, Option<i64>>(11)?.map(millis_to_utc),
        original_content: row.get(12)?,
        has_media: row.get(13)?,
        media_type: row.get(14)?,
        metadata: parse_json_column(row.get(15)?),
        delivery_receipt: parse_json_column(row.get(16)?),
        read_receipt: parse_json_column(row.get(17)?),
        reactions: parse_json_column(row.get(18)?).unwrap_or_default(),
        attachments: parse_json_column(row.get(19)?).unwrap_or_default(),
        encryption_info: parse_json_column(row.get(20)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn chat(id: &str, name: &str) -> LiveChat {
        LiveChat {
            id: id.to_string(),
            contact_name: name.to_string(),
            contact_public_key: None,
            last_message_time: Some(Utc::now()),
            unread_count: 0,
            is_online: false,
            has_unsent_messages: false,
        }
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryLiveStore::new();
        let now = Utc::now();
        store.seed_chat(
            chat("c1", "Alice"),
            vec![LiveMessage::text("m1", "c1", "bonjour", now)],
        );

        assert_eq!(store.messages("c1").unwrap().len(), 1);
        assert!(store.chat("c1").unwrap().is_some());

        store.clear_messages("c1").unwrap();
        assert!(store.messages("c1").unwrap().is_empty());
    }

    #[test]
    fn memory_store_simulated_failure() {
        let store = MemoryLiveStore::new();
        store.fail_saves_for("m2");
        let now = Utc::now();

        assert!(store
            .save_message(&LiveMessage::text("m1", "c1", "ok", now))
            .is_ok());
        assert!(store
            .save_message(&LiveMessage::text("m2", "c1", "broken", now))
            .is_err());
    }

    #[test]
    fn sqlite_store_round_trip() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = SqliteLiveStore::new(db);
        let now = Utc::now();

        store.save_chat(&chat("c1", "Alice")).unwrap();
        let mut msg = LiveMessage::text("m1", "c1", "salut", now);
        msg.priority = MessagePriority::High;
        msg.attachments.push(crate::models::Attachment {
            name: "photo.jpg".into(),
            mime_type: Some("image/jpeg".into()),
            size_bytes: 1234,
        });
        store.save_message(&msg).unwrap();

        let loaded = store.messages("c1").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].priority, MessagePriority::High);
        assert_eq!(loaded[0].attachments.len(), 1);

        store.remove_chat("c1").unwrap();
        assert!(store.chat("c1").unwrap().is_none());
    }
}
