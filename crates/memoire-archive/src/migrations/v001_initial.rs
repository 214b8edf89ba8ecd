//! v001 -- Initial schema creation.
//!
//! Creates the archive tables (`archived_chats`, `archived_messages`) and
//! the colocated live tables (`live_chats`, `live_messages`) used by the
//! SQLite-backed live store.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Live chats (colocated live store)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS live_chats (
    id                 TEXT PRIMARY KEY NOT NULL,
    contact_name       TEXT NOT NULL,
    contact_public_key TEXT,
    last_message_time  INTEGER,                  -- epoch millis
    unread_count       INTEGER NOT NULL DEFAULT 0,
    is_online          INTEGER NOT NULL DEFAULT 0,
    has_unsent         INTEGER NOT NULL DEFAULT 0
);

-- ----------------------------------------------------------------
-- Live messages (colocated live store)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS live_messages (
    id                   TEXT PRIMARY KEY NOT NULL,
    chat_id              TEXT NOT NULL,
    content              TEXT NOT NULL,
    timestamp            INTEGER NOT NULL,       -- epoch millis
    is_from_me           INTEGER NOT NULL,
    status               TEXT NOT NULL,
    reply_to_message_id  TEXT,
    thread_id            TEXT,
    is_starred           INTEGER NOT NULL DEFAULT 0,
    is_forwarded         INTEGER NOT NULL DEFAULT 0,
    priority             TEXT NOT NULL DEFAULT 'normal',
    edited_at            INTEGER,
    original_content     TEXT,
    has_media            INTEGER NOT NULL DEFAULT 0,
    media_type           TEXT,
    metadata_json        TEXT,
    delivery_receipt_json TEXT,
    read_receipt_json    TEXT,
    reactions_json       TEXT,
    attachments_json     TEXT,
    encryption_info_json TEXT
);

CREATE INDEX IF NOT EXISTS idx_live_messages_chat_ts
    ON live_messages(chat_id, timestamp ASC);

-- ----------------------------------------------------------------
-- Archived chats (one row per archive)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS archived_chats (
    archive_id            TEXT PRIMARY KEY NOT NULL,
    original_chat_id      TEXT NOT NULL,
    contact_name          TEXT NOT NULL,
    contact_public_key    TEXT,
    archived_at           INTEGER NOT NULL,      -- epoch millis
    last_message_time     INTEGER,
    message_count         INTEGER NOT NULL,
    archive_reason        TEXT,                  -- encrypted
    estimated_size        INTEGER NOT NULL,
    is_compressed         INTEGER NOT NULL DEFAULT 0,
    compression_ratio     REAL,
    metadata_json         TEXT NOT NULL,         -- encrypted
    compression_info_json TEXT,
    custom_data_json      TEXT                   -- encrypted
);

CREATE INDEX IF NOT EXISTS idx_archived_chats_archived_at
    ON archived_chats(archived_at DESC);
CREATE INDEX IF NOT EXISTS idx_archived_chats_contact
    ON archived_chats(contact_name);

-- ----------------------------------------------------------------
-- Archived messages (one row per message, FK -> archived_chats)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS archived_messages (
    id                    TEXT PRIMARY KEY NOT NULL,  -- "<archive_id>:<original id>"
    archive_id            TEXT NOT NULL,
    original_message_id   TEXT NOT NULL,
    chat_id               TEXT NOT NULL,
    content               TEXT NOT NULL,              -- encrypted
    timestamp             INTEGER NOT NULL,           -- epoch millis
    is_from_me            INTEGER NOT NULL,
    status                TEXT NOT NULL,
    reply_to_message_id   TEXT,
    thread_id             TEXT,
    is_starred            INTEGER NOT NULL DEFAULT 0,
    is_forwarded          INTEGER NOT NULL DEFAULT 0,
    priority              TEXT NOT NULL DEFAULT 'normal',
    edited_at             INTEGER,
    original_content      TEXT,                       -- encrypted
    has_media             INTEGER NOT NULL DEFAULT 0,
    media_type            TEXT,
    archived_at           INTEGER NOT NULL,
    original_timestamp    INTEGER NOT NULL,
    metadata_json         TEXT,                       -- encrypted
    delivery_receipt_json TEXT,                       -- encrypted
    read_receipt_json     TEXT,                       -- encrypted
    reactions_json        TEXT,                       -- encrypted
    attachments_json      TEXT,                       -- encrypted
    encryption_info_json  TEXT,                       -- not encrypted
    archive_metadata_json TEXT NOT NULL,              -- encrypted
    preserved_state_json  TEXT,                       -- encrypted
    searchable_text       TEXT NOT NULL,              -- plaintext, indexed

    FOREIGN KEY (archive_id) REFERENCES archived_chats(archive_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_archived_messages_archive_ts
    ON archived_messages(archive_id, original_timestamp ASC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
