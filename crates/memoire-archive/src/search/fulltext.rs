//! Engine-backed search strategy.
//!
//! The FTS5 shadow table is kept consistent by storage-engine triggers on
//! every insert/delete of message rows, which removes the whole class of
//! out-of-sync-index bugs; `index_chat` and `remove_chat` therefore have
//! nothing to do.  One MATCH statement returns matching message rows,
//! newest first, capped at twice the requested limit to leave room for
//! post-filtering.

use std::sync::Arc;

use rusqlite::params;

use crate::database::Database;
use crate::error::Result;
use crate::models::{ArchivedChat, SearchFilter};
use crate::search::{tokenize, SearchIndex};

pub struct FullTextIndex {
    db: Arc<Database>,
}

impl FullTextIndex {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl SearchIndex for FullTextIndex {
    fn index_chat(&self, _chat: &ArchivedChat) -> Result<()> {
        // Maintained by triggers on archived_messages.
        Ok(())
    }

    fn search(&self, query: &str, filter: &SearchFilter, limit: usize) -> Result<Vec<String>> {
        let Some(match_expr) = build_match_query(query) else {
            return Ok(Vec::new());
        };

        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(
            "SELECT m.archive_id
             FROM archived_messages_fts f
             JOIN archived_messages m ON m.rowid = f.rowid
             JOIN archived_chats c ON c.archive_id = m.archive_id
             WHERE f.archived_messages_fts MATCH ?1
               AND (?2 IS NULL OR LOWER(c.contact_name) = LOWER(?2))
               AND (?3 IS NULL OR m.original_timestamp >= ?3)
               AND (?4 IS NULL OR m.original_timestamp <= ?4)
             ORDER BY m.original_timestamp DESC
             LIMIT ?5",
        )?;

        let rows = stmt.query_map(
            params![
                match_expr,
                filter.contact_name,
                filter.after.map(|t| t.timestamp_millis()),
                filter.before.map(|t| t.timestamp_millis()),
                (limit * 2) as i64,
            ],
            |row| row.get::<_, String>(0),
        )?;

        // Collapse message hits into unique archive ids, keeping recency order.
        let mut candidates = Vec::new();
        for row in rows {
            let archive_id = row?;
            if !candidates.contains(&archive_id) {
                candidates.push(archive_id);
            }
        }
        Ok(candidates)
    }

    fn remove_chat(&self, _archive_id: &str) -> Result<()> {
        // Delete triggers keep the shadow table consistent.
        Ok(())
    }
}

/// Build an FTS5 MATCH expression: sanitized prefix terms joined with AND.
fn build_match_query(query: &str) -> Option<String> {
    let terms: Vec<String> = tokenize(query)
        .into_iter()
        .map(|t| format!("\"{t}\"*"))
        .collect();

    if terms.is_empty() {
        return None;
    }
    Some(terms.join(" AND "))
}
