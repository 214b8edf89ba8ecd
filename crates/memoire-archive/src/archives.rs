//! SQL for archive rows.
//!
//! Free functions over `&Connection` so they work both standalone and
//! inside a transaction (`Transaction` derefs to `Connection`).

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::ArchiveFilter;
use crate::rows::{ArchivedChatRow, ArchivedMessageRow};

const CHAT_COLUMNS: &str = "archive_id, original_chat_id, contact_name, contact_public_key, \
     archived_at, last_message_time, message_count, archive_reason, estimated_size, \
     is_compressed, compression_ratio, metadata_json, compression_info_json, custom_data_json";

const MESSAGE_COLUMNS: &str = "id, archive_id, original_message_id, chat_id, content, timestamp, \
     is_from_me, status, reply_to_message_id, thread_id, is_starred, is_forwarded, priority, \
     edited_at, original_content, has_media, media_type, archived_at, original_timestamp, \
     metadata_json, delivery_receipt_json, read_receipt_json, reactions_json, attachments_json, \
     encryption_info_json, archive_metadata_json, preserved_state_json, searchable_text";

pub(crate) fn insert_chat(conn: &Connection, row: &ArchivedChatRow) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO archived_chats ({CHAT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        ),
        params![
            row.archive_id,
            row.original_chat_id,
            row.contact_name,
            row.contact_public_key,
            row.archived_at,
            row.last_message_time,
            row.message_count,
            row.archive_reason,
            row.estimated_size,
            row.is_compressed,
            row.compression_ratio,
            row.metadata_json,
            row.compression_info_json,
            row.custom_data_json,
        ],
    )?;
    Ok(())
}

pub(crate) fn insert_message(conn: &Connection, row: &ArchivedMessageRow) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO archived_messages ({MESSAGE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                     ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28)"
        ),
        params![
            row.id,
            row.archive_id,
            row.original_message_id,
            row.chat_id,
            row.content,
            row.timestamp,
            row.is_from_me,
            row.status,
            row.reply_to_message_id,
            row.thread_id,
            row.is_starred,
            row.is_forwarded,
            row.priority,
            row.edited_at,
            row.original_content,
            row.has_media,
            row.media_type,
            row.archived_at,
            row.original_timestamp,
            row.metadata_json,
            row.delivery_receipt_json,
            row.read_receipt_json,
            row.reactions_json,
            row.attachments_json,
            row.encryption_info_json,
            row.archive_metadata_json,
            row.preserved_state_json,
            row.searchable_text,
        ],
    )?;
    Ok(())
}

pub(crate) fn get_chat(conn: &Connection, archive_id: &str) -> Result<Option<ArchivedChatRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {CHAT_COLUMNS} FROM archived_chats WHERE archive_id = ?1"),
            params![archive_id],
            row_to_chat_row,
        )
        .optional()?;
    Ok(row)
}

/// Load all message rows for an archive in original timestamp order.
pub(crate) fn get_messages(conn: &Connection, archive_id: &str) -> Result<Vec<ArchivedMessageRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM archived_messages
         WHERE archive_id = ?1
         ORDER BY original_timestamp ASC, original_message_id ASC"
    ))?;

    let rows = stmt.query_map(params![archive_id], row_to_message_row)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Delete an archive's message rows.  Explicit rather than left to the
/// foreign-key cascade, so the FTS delete triggers always see each row.
pub(crate) fn delete_messages(conn: &Connection, archive_id: &str) -> Result<usize> {
    let affected = conn.execute(
        "DELETE FROM archived_messages WHERE archive_id = ?1",
        params![archive_id],
    )?;
    Ok(affected)
}

/// Delete an archive row.  Returns `true` if a row was deleted.
pub(crate) fn delete_chat(conn: &Connection, archive_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "DELETE FROM archived_chats WHERE archive_id = ?1",
        params![archive_id],
    )?;
    Ok(affected > 0)
}

/// List chat rows matching a filter, most recently archived first.
///
/// `limit = None` means unbounded (SQLite `LIMIT -1`).
pub(crate) fn list_chats(
    conn: &Connection,
    filter: &ArchiveFilter,
    limit: Option<usize>,
    offset: usize,
) -> Result<Vec<ArchivedChatRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CHAT_COLUMNS} FROM archived_chats
         WHERE (?1 IS NULL OR LOWER(contact_name) = LOWER(?1))
           AND (?2 IS NULL OR archived_at >= ?2)
           AND (?3 IS NULL OR archived_at <= ?3)
           AND (?4 = 0 OR is_compressed = 1)
         ORDER BY archived_at DESC
         LIMIT ?5 OFFSET ?6"
    ))?;

    let rows = stmt.query_map(
        params![
            filter.contact_name,
            filter.archived_after.map(|t| t.timestamp_millis()),
            filter.archived_before.map(|t| t.timestamp_millis()),
            filter.only_compressed,
            limit.map(|l| l as i64).unwrap_or(-1),
            offset as i64,
        ],
        row_to_chat_row,
    )?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Aggregate totals for statistics, straight from SQL.
pub(crate) struct ChatAggregates {
    pub total_archives: usize,
    pub total_messages: u64,
    pub total_size_bytes: u64,
    pub compressed_archives: usize,
    pub average_compression_ratio: Option<f64>,
}

pub(crate) fn aggregates(conn: &Connection) -> Result<ChatAggregates> {
    conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(message_count), 0),
                COALESCE(SUM(estimated_size), 0),
                COALESCE(SUM(is_compressed), 0),
                AVG(compression_ratio)
         FROM archived_chats",
        [],
        |row| {
            Ok(ChatAggregates {
                total_archives: row.get::<_, i64>(0)?.max(0) as usize,
                total_messages: row.get::<_, i64>(1)?.max(0) as u64,
                total_size_bytes: row.get::<_, i64>(2)?.max(0) as u64,
                compressed_archives: row.get::<_, i64>(3)?.max(0) as usize,
                average_compression_ratio: row.get::<_, Option<f64>>(4)?,
            })
        },
    )
    .map_err(Into::into)
}

/// Archive counts grouped by `YYYY-MM` of the archive timestamp.
pub(crate) fn counts_per_month(conn: &Connection) -> Result<Vec<(String, usize)>> {
    let mut stmt = conn.prepare(
        "SELECT strftime('%Y-%m', archived_at / 1000, 'unixepoch') AS month, COUNT(*)
         FROM archived_chats
         GROUP BY month
         ORDER BY month",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?.max(0) as usize))
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Archive counts grouped by contact name.
pub(crate) fn counts_per_contact(conn: &Connection) -> Result<Vec<(String, usize)>> {
    let mut stmt = conn.prepare(
        "SELECT contact_name, COUNT(*)
         FROM archived_chats
         GROUP BY contact_name
         ORDER BY contact_name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?.max(0) as usize))
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_chat_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ArchivedChatRow> {
    Ok(ArchivedChatRow {
        archive_id: row.get(0)?,
        original_chat_id: row.get(1)?,
        contact_name: row.get(2)?,
        contact_public_key: row.get(3)?,
        archived_at: row.get(4)?,
        last_message_time: row.get(5)?,
        message_count: row.get(6)?,
        archive_reason: row.get(7)?,
        estimated_size: row.get(8)?,
        is_compressed: row.get(9)?,
        compression_ratio: row.get(10)?,
        metadata_json: row.get(11)?,
        compression_info_json: row.get(12)?,
        custom_data_json: row.get(13)?,
    })
}

pub(crate) fn row_to_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ArchivedMessageRow> {
    Ok(ArchivedMessageRow {
        id: row.get(0)?,
        archive_id: row.get(1)?,
        original_message_id: row.get(2)?,
        chat_id: row.get(3)?,
        content: row.get(4)?,
        timestamp: row.get(5)?,
        is_from_me: row.get(6)?,
        status: row.get(7)?,
        reply_to_message_id: row.get(8)?,
        thread_id: row.get(9)?,
        is_starred: row.get(10)?,
        is_forwarded: row.get(11)?,
        priority: row.get(12)?,
        edited_at: row.get(13)?,
        original_content: row.get(14)?,
        has_media: row.get(15)?,
        media_type: row.get(16)?,
        archived_at: row.get(17)?,
        original_timestamp: row.get(18)?,
        metadata_json: row.get(19)?,
        delivery_receipt_json: row.get(20)?,
        read_receipt_json: row.get(21)?,
        reactions_json: row.get(22)?,
        attachments_json: row.get(23)?,
        encryption_info_json: row.get(24)?,
        archive_metadata_json: row.get(25)?,
        preserved_state_json: row.get(26)?,
        searchable_text: row.get(27)?,
    })
}
