//! Hand-rolled search strategy.
//!
//! Posting lists map a key (word, lower-cased contact name, or `YYYY-MM`
//! bucket) to the set of archive ids containing it.  Lists are persisted as
//! JSON arrays in `search_postings`; every read-modify-write cycle runs
//! inside one transaction while holding the connection lock, so concurrent
//! writers cannot interleave.  A query's candidate set is the intersection
//! (AND semantics) of the per-token lists, further intersected with the
//! contact and date indices.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Datelike, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::database::Database;
use crate::error::Result;
use crate::models::{ArchivedChat, SearchFilter};
use crate::rows::millis_to_utc;
use crate::search::{month_key, tokenize, SearchIndex};

const KIND_TERM: &str = "term";
const KIND_CONTACT: &str = "contact";
const KIND_MONTH: &str = "month";

pub struct InvertedIndex {
    db: Arc<Database>,
}

impl InvertedIndex {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Rebuild all posting lists from the archive tables.  Used when the
    /// strategy is enabled on a database previously maintained by the
    /// full-text strategy.  Term lists for whole-compressed archives cannot
    /// be recovered (their text sits inside an encrypted blob); those
    /// archives remain findable through the contact and date indices.
    pub fn rebuild(&self) -> Result<usize> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM search_postings", [])?;

        let mut indexed = 0usize;
        {
            let mut chat_stmt =
                tx.prepare("SELECT archive_id, contact_name, archived_at FROM archived_chats")?;
            let chats = chat_stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?;

            for chat in chats {
                let (archive_id, contact_name, archived_at) = chat?;

                let mut keys = vec![
                    (KIND_CONTACT, contact_name.to_lowercase()),
                    (KIND_MONTH, month_key(millis_to_utc(archived_at))),
                ];

                let mut msg_stmt = tx.prepare(
                    "SELECT searchable_text, timestamp FROM archived_messages
                     WHERE archive_id = ?1",
                )?;
                let messages = msg_stmt.query_map(params![archive_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?;

                let mut terms = BTreeSet::new();
                for msg in messages {
                    let (searchable_text, timestamp) = msg?;
                    terms.extend(tokenize(&searchable_text));
                    keys.push((KIND_MONTH, month_key(millis_to_utc(timestamp))));
                }
                keys.extend(terms.into_iter().map(|t| (KIND_TERM, t)));

                for (kind, key) in keys {
                    add_to_postings(&tx, kind, &key, &archive_id)?;
                }
                indexed += 1;
            }
        }

        tx.commit()?;

        tracing::info!(archives = indexed, "rebuilt inverted search index");
        Ok(indexed)
    }
}

impl SearchIndex for InvertedIndex {
    fn initialize(&self) -> Result<()> {
        let needs_rebuild = {
            let conn = self.db.lock()?;
            let postings: i64 =
                conn.query_row("SELECT COUNT(*) FROM search_postings", [], |r| r.get(0))?;
            let archives: i64 =
                conn.query_row("SELECT COUNT(*) FROM archived_chats", [], |r| r.get(0))?;
            postings == 0 && archives > 0
        };

        if needs_rebuild {
            self.rebuild()?;
        }
        Ok(())
    }

    fn index_chat(&self, chat: &ArchivedChat) -> Result<()> {
        // Fed from memory at archive time, so whole-compressed archives are
        // indexed too.
        let mut terms = BTreeSet::new();
        let mut months = BTreeSet::new();
        months.insert(month_key(chat.archived_at));
        for msg in &chat.messages {
            terms.extend(tokenize(&msg.searchable_text));
            months.insert(month_key(msg.timestamp));
        }

        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;

        add_to_postings(&tx, KIND_CONTACT, &chat.contact_name.to_lowercase(), &chat.archive_id)?;
        for month in months {
            add_to_postings(&tx, KIND_MONTH, &month, &chat.archive_id)?;
        }
        for term in terms {
            add_to_postings(&tx, KIND_TERM, &term, &chat.archive_id)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn search(&self, query: &str, filter: &SearchFilter, _limit: usize) -> Result<Vec<String>> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.db.lock()?;

        // Intersection of per-token lists, keeping the first list's order.
        let mut candidates = load_postings(&conn, KIND_TERM, &tokens[0])?;
        for token in &tokens[1..] {
            if candidates.is_empty() {
                return Ok(Vec::new());
            }
            let other = load_postings(&conn, KIND_TERM, token)?;
            candidates.retain(|id| other.contains(id));
        }

        if let Some(contact) = &filter.contact_name {
            let by_contact = load_postings(&conn, KIND_CONTACT, &contact.to_lowercase())?;
            candidates.retain(|id| by_contact.contains(id));
        }

        if let Some(months) = month_range(filter) {
            let mut in_range = BTreeSet::new();
            for month in months {
                in_range.extend(load_postings(&conn, KIND_MONTH, &month)?);
            }
            candidates.retain(|id| in_range.contains(id));
        }

        // Lists grow in insertion order; newest archives last.
        candidates.reverse();
        Ok(candidates)
    }

    fn remove_chat(&self, archive_id: &str) -> Result<()> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;

        let needle = format!("%\"{archive_id}\"%");
        let touched: Vec<(String, String, String)> = {
            let mut stmt = tx.prepare(
                "SELECT kind, key, archive_ids FROM search_postings
                 WHERE archive_ids LIKE ?1",
            )?;
            let rows = stmt.query_map(params![needle], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            out
        };

        for (kind, key, archive_ids) in touched {
            let mut ids: Vec<String> = serde_json::from_str(&archive_ids).unwrap_or_default();
            ids.retain(|id| id != archive_id);
            store_postings(&tx, &kind, &key, &ids)?;
        }

        tx.commit()?;
        Ok(())
    }
}

/// Months (`YYYY-MM`) covered by the filter's date range, oldest first.
/// Returns `None` when the range is unbounded below; precise date filtering
/// happens at the message level anyway.
fn month_range(filter: &SearchFilter) -> Option<Vec<String>> {
    let start = filter.after?;
    let end = filter.before.unwrap_or_else(Utc::now);
    if end < start {
        return Some(Vec::new());
    }

    let mut months = Vec::new();
    let (mut year, mut month) = (start.year(), start.month());
    let (end_year, end_month) = (end.year(), end.month());
    while (year, month) <= (end_year, end_month) {
        months.push(format!("{year:04}-{month:02}"));
        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
        }
    }
    Some(months)
}

fn load_postings(conn: &Connection, kind: &str, key: &str) -> Result<Vec<String>> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT archive_ids FROM search_postings WHERE kind = ?1 AND key = ?2",
            params![kind, key],
            |row| row.get(0),
        )
        .optional()?;

    Ok(stored
        .as_deref()
        .and_then(|j| serde_json::from_str(j).ok())
        .unwrap_or_default())
}

fn add_to_postings(conn: &Connection, kind: &str, key: &str, archive_id: &str) -> Result<()> {
    let mut ids = load_postings(conn, kind, key)?;
    if !ids.iter().any(|id| id == archive_id) {
        ids.push(archive_id.to_string());
    }
    store_postings(conn, kind, key, &ids)
}

fn store_postings(conn: &Connection, kind: &str, key: &str, ids: &[String]) -> Result<()> {
    if ids.is_empty() {
        conn.execute(
            "DELETE FROM search_postings WHERE kind = ?1 AND key = ?2",
            params![kind, key],
        )?;
        return Ok(());
    }

    conn.execute(
        "INSERT INTO search_postings (kind, key, archive_ids) VALUES (?1, ?2, ?3)
         ON CONFLICT(kind, key) DO UPDATE SET archive_ids = excluded.archive_ids",
        params![kind, key, serde_json::to_string(ids)?],
    )?;
    Ok(())
}
