//! v002 -- Trigger-maintained full-text index.
//!
//! Adds an FTS5 shadow table over `archived_messages.searchable_text` kept
//! consistent by AFTER INSERT / AFTER DELETE triggers, so the index can
//! never drift from the message rows.  Archived rows are immutable, so no
//! update trigger is needed.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS archived_messages_fts USING fts5(
    archive_id UNINDEXED,
    searchable_text,
    content='archived_messages',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS archived_messages_ai
AFTER INSERT ON archived_messages BEGIN
    INSERT INTO archived_messages_fts(rowid, archive_id, searchable_text)
    VALUES (new.rowid, new.archive_id, new.searchable_text);
END;

CREATE TRIGGER IF NOT EXISTS archived_messages_ad
AFTER DELETE ON archived_messages BEGIN
    INSERT INTO archived_messages_fts(archived_messages_fts, rowid, archive_id, searchable_text)
    VALUES ('delete', old.rowid, old.archive_id, old.searchable_text);
END;
"#;

/// Apply the full-text index migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
