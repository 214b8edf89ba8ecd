//! The archive orchestrator.
//!
//! [`ChatArchiver`] is the public operation surface of the engine:
//! archive, restore, search, delete, listing, and statistics.  It owns the
//! database handle and composes the row mapper, codec, field cipher, and
//! search index through their interfaces; the live chat list and message
//! store are consumed as collaborators and never reached into.
//!
//! One instance is constructed by the composition root and handed to
//! consumers; there is no global accessor.
//!
//! Operations on the same archive id must be serialized by the caller.
//! Operations on different ids are independent; all shared state here
//! (connection, caches, posting lists, stats) is internally guarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::archives;
use crate::cache::EngineCaches;
use crate::cipher::FieldCipher;
use crate::codec;
use crate::config::{ArchiveConfig, SearchStrategyKind};
use crate::database::Database;
use crate::error::{ArchiveError, Result};
use crate::live::{LiveChatStore, LiveMessageStore};
use crate::models::{
    ArchiveFilter, ArchiveStatistics, ArchivedChat, ArchivedChatSummary, ArchivedMessage,
    ChatArchiveMetadata, CompressionInfo, IndexingStatus, LiveChat, Operation, OperationReport,
    SearchFilter, SearchHit, SearchResults, CUSTOM_KEY_COMPRESSED_MESSAGES,
};
use crate::rows::RowMapper;
use crate::search::{
    self, FullTextIndex, InvertedIndex, SearchIndex,
};
use crate::stats::StatsRecorder;

/// Fixed per-row overhead used when estimating an archive's size.
const ROW_OVERHEAD_BYTES: usize = 128;

/// The chat archival engine.
pub struct ChatArchiver {
    db: Arc<Database>,
    mapper: RowMapper,
    index: Box<dyn SearchIndex>,
    chats: Arc<dyn LiveChatStore>,
    messages: Arc<dyn LiveMessageStore>,
    caches: EngineCaches,
    stats: StatsRecorder,
    config: ArchiveConfig,
    initialized: AtomicBool,
}

impl ChatArchiver {
    /// Build an archiver with the search strategy selected by the config.
    pub fn new(
        db: Arc<Database>,
        cipher: FieldCipher,
        chats: Arc<dyn LiveChatStore>,
        messages: Arc<dyn LiveMessageStore>,
        config: ArchiveConfig,
    ) -> Self {
        let index: Box<dyn SearchIndex> = match config.search_strategy {
            SearchStrategyKind::FullText => Box::new(FullTextIndex::new(db.clone())),
            SearchStrategyKind::Inverted => Box::new(InvertedIndex::new(db.clone())),
        };
        Self::with_search_index(db, cipher, chats, messages, config, index)
    }

    /// Build an archiver with an explicitly injected search index.
    pub fn with_search_index(
        db: Arc<Database>,
        cipher: FieldCipher,
        chats: Arc<dyn LiveChatStore>,
        messages: Arc<dyn LiveMessageStore>,
        config: ArchiveConfig,
        index: Box<dyn SearchIndex>,
    ) -> Self {
        let caches = EngineCaches::new(config.archive_cache_capacity, config.search_cache_capacity);
        let mapper = RowMapper::new(cipher, config.compression_level);
        Self {
            db,
            mapper,
            index,
            chats,
            messages,
            caches,
            stats: StatsRecorder::new(),
            config,
            initialized: AtomicBool::new(false),
        }
    }

    /// Prepare the engine for use.  Idempotent: a second call is a no-op.
    pub fn initialize(&self) -> Result<()> {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("archive engine already initialized");
            return Ok(());
        }

        if let Err(e) = self.index.initialize() {
            self.initialized.store(false, Ordering::SeqCst);
            return Err(e);
        }

        tracing::info!(
            strategy = self.config.search_strategy.as_str(),
            "archive engine initialized"
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Archive
    // ------------------------------------------------------------------

    /// Move a conversation out of the live store into the archive.
    ///
    /// All-or-nothing: the chat row and every message row commit in one
    /// transaction or not at all.  Clearing the live store happens after
    /// commit; failures there surface as warnings, not as operation
    /// failure.
    pub fn archive_chat(
        &self,
        chat_id: &str,
        reason: Option<String>,
        custom_data: Option<serde_json::Map<String, serde_json::Value>>,
        compress_large_archives: bool,
    ) -> OperationReport {
        let started = Instant::now();
        let mut report = self
            .do_archive(chat_id, reason, custom_data, compress_large_archives)
            .unwrap_or_else(|e| {
                tracing::warn!(chat_id, error = %e, "archive operation failed");
                OperationReport::failed(Operation::Archive, &e, 0)
            });
        report.elapsed_ms = started.elapsed().as_millis() as u64;
        self.stats.record(Operation::Archive, started.elapsed());
        report
    }

    fn do_archive(
        &self,
        chat_id: &str,
        reason: Option<String>,
        custom_data: Option<serde_json::Map<String, serde_json::Value>>,
        compress_large_archives: bool,
    ) -> Result<OperationReport> {
        let chat = self
            .chats
            .chat(chat_id)?
            .ok_or_else(|| ArchiveError::ChatNotFound(chat_id.to_string()))?;

        let live_messages = self.messages.messages(chat_id)?;
        if live_messages.is_empty() {
            return Err(ArchiveError::EmptyChat(chat_id.to_string()));
        }

        let mut warnings = Vec::new();
        let archived_at = Utc::now();
        let archive_id = format!("arch_{}_{}", chat_id, archived_at.timestamp_millis());

        let mut messages: Vec<ArchivedMessage> = live_messages
            .iter()
            .map(|m| ArchivedMessage::from_live(m, &archive_id, archived_at))
            .collect();
        messages.sort_by(|a, b| {
            a.original_timestamp
                .cmp(&b.original_timestamp)
                .then_with(|| a.id.cmp(&b.id))
        });

        let estimated_size = estimate_size(&messages);
        let last_message_time = messages.last().map(|m| m.original_timestamp);

        let mut archived = ArchivedChat {
            archive_id: archive_id.clone(),
            original_chat_id: chat_id.to_string(),
            contact_name: chat.contact_name.clone(),
            contact_public_key: chat.contact_public_key.clone(),
            archived_at,
            last_message_time,
            message_count: messages.len(),
            estimated_size,
            is_compressed: false,
            compression_info: None,
            metadata: ChatArchiveMetadata {
                reason,
                original_unread_count: chat.unread_count,
                was_online: chat.is_online,
                had_unsent_messages: chat.has_unsent_messages,
                ..Default::default()
            },
            custom_data,
            messages,
        };

        let oversized = estimated_size as usize > self.config.compression_threshold;
        if oversized && compress_large_archives {
            self.compress_whole_archive(&mut archived, &mut warnings)?;
        }
        if oversized && !archived.is_compressed {
            warnings.push("large archive; indexing may take longer".to_string());
        }

        let chat_row = self.mapper.chat_to_row(&archived)?;
        let message_rows = if archived.is_compressed {
            Vec::new()
        } else {
            archived
                .messages
                .iter()
                .map(|m| self.mapper.message_to_row(m))
                .collect::<Result<Vec<_>>>()?
        };

        {
            let mut conn = self.db.lock()?;
            let tx = conn.transaction()?;
            archives::insert_chat(&tx, &chat_row)?;
            for row in &message_rows {
                archives::insert_message(&tx, row)?;
            }
            tx.commit()?;
        }

        // The live store is an external collaborator; its rows cannot join
        // the archive transaction.  Failures past this point degrade to
        // warnings: the archive itself is durable.
        if let Err(e) = self.chats.remove_chat(chat_id) {
            warnings.push(format!("could not remove live chat {chat_id}: {e}"));
        }
        if let Err(e) = self.messages.clear_messages(chat_id) {
            warnings.push(format!("could not clear live messages for {chat_id}: {e}"));
        }
        if let Err(e) = self.index.index_chat(&archived) {
            warnings.push(format!("search indexing failed: {e}"));
        }

        self.caches.invalidate_after_write(Some(&archive_id));

        tracing::info!(
            chat_id,
            archive_id = %archive_id,
            messages = archived.message_count,
            compressed = archived.is_compressed,
            "chat archived"
        );

        let message = format!(
            "archived {} messages from {}",
            archived.message_count, archived.contact_name
        );
        Ok(
            OperationReport::succeeded(Operation::Archive, Some(archive_id), message, 0)
                .with_warnings(warnings),
        )
    }

    /// Whole-archive compression: the serialized message list moves into
    /// `custom_data` under the reserved key and no per-message rows are
    /// written.  Skipped silently when compression is not beneficial.
    fn compress_whole_archive(
        &self,
        archived: &mut ArchivedChat,
        warnings: &mut Vec<String>,
    ) -> Result<()> {
        for msg in &mut archived.messages {
            msg.archive_metadata.compression_applied = true;
            msg.archive_metadata.indexing_status = IndexingStatus::Skipped;
        }

        let serialized = serde_json::to_vec(&archived.messages)?;
        let Some(compressed) = codec::compress(&serialized, self.config.compression_level) else {
            for msg in &mut archived.messages {
                msg.archive_metadata.compression_applied = false;
                msg.archive_metadata.indexing_status = IndexingStatus::Indexed;
            }
            return Ok(());
        };

        let blob = codec::encode_marked_bytes(&compressed.data);
        archived
            .custom_data
            .get_or_insert_with(serde_json::Map::new)
            .insert(
                CUSTOM_KEY_COMPRESSED_MESSAGES.to_string(),
                serde_json::Value::String(blob),
            );

        archived.is_compressed = true;
        archived.compression_info = Some(CompressionInfo {
            algorithm: codec::ALGORITHM.to_string(),
            original_size: compressed.original_size as u64,
            compressed_size: compressed.compressed_size as u64,
            ratio: compressed.ratio,
            compressed_at: Utc::now(),
        });
        archived.metadata.has_search_index = false;

        warnings.push("archive was compressed to save space".to_string());
        warnings.push(
            "message-level search is reduced for compressed archives".to_string(),
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Restore
    // ------------------------------------------------------------------

    /// Replay an archive's messages into the live store, then consume the
    /// archive.
    ///
    /// Deliberately not transactional across messages: individual save
    /// failures become warnings, and the operation fails only when zero
    /// messages restore.  On success the archive row (and its cascaded
    /// message rows and index entries) is deleted.
    pub fn restore_chat(
        &self,
        archive_id: &str,
        target_chat_id: Option<&str>,
        overwrite_existing: bool,
    ) -> OperationReport {
        let started = Instant::now();
        let mut report = self
            .do_restore(archive_id, target_chat_id, overwrite_existing)
            .unwrap_or_else(|e| {
                tracing::warn!(archive_id, error = %e, "restore operation failed");
                OperationReport::failed(Operation::Restore, &e, 0)
            });
        report.elapsed_ms = started.elapsed().as_millis() as u64;
        self.stats.record(Operation::Restore, started.elapsed());
        report
    }

    fn do_restore(
        &self,
        archive_id: &str,
        target_chat_id: Option<&str>,
        overwrite_existing: bool,
    ) -> Result<OperationReport> {
        let (archive, mut warnings) = self
            .load_archive(archive_id)?
            .ok_or_else(|| ArchiveError::ArchiveNotFound(archive_id.to_string()))?;

        let mut target = target_chat_id
            .unwrap_or(&archive.original_chat_id)
            .to_string();

        if !overwrite_existing {
            if let Some(existing) = self.chats.chat(&target)? {
                let fresh = Uuid::new_v4().to_string();
                warnings.push(format!(
                    "chat {} already exists; restoring into new chat {}",
                    existing.id, fresh
                ));
                target = fresh;
            }
        }

        let restored_chat = LiveChat {
            id: target.clone(),
            contact_name: archive.contact_name.clone(),
            contact_public_key: archive.contact_public_key.clone(),
            last_message_time: archive.last_message_time,
            unread_count: 0,
            is_online: false,
            has_unsent_messages: false,
        };
        if let Err(e) = self.chats.save_chat(&restored_chat) {
            warnings.push(format!("could not recreate live chat entry: {e}"));
        }

        let attempted = archive.messages.len();
        let mut restored = 0usize;
        for msg in &archive.messages {
            match self.messages.save_message(&msg.to_live(&target)) {
                Ok(()) => restored += 1,
                Err(e) => warnings.push(format!("failed to restore message {}: {e}", msg.id)),
            }
        }

        if restored == 0 {
            return Err(ArchiveError::RestoreFailed {
                archive_id: archive_id.to_string(),
                attempted,
            });
        }

        // Restoration consumes the archive.
        match self.delete_rows(archive_id) {
            Ok(_) => {
                if let Err(e) = self.index.remove_chat(archive_id) {
                    warnings.push(format!("search index cleanup failed: {e}"));
                }
            }
            Err(e) => {
                warnings.push(format!("archive could not be deleted after restore: {e}"));
            }
        }

        self.caches.invalidate_after_write(Some(archive_id));

        if restored < attempted {
            warnings.push(format!("restored {restored}/{attempted} messages"));
        }

        tracing::info!(
            archive_id,
            target_chat_id = %target,
            restored,
            attempted,
            "archive restored"
        );

        let message = format!(
            "restored {} messages into chat {}",
            restored, target
        );
        let mut report =
            OperationReport::succeeded(Operation::Restore, Some(archive_id.to_string()), message, 0)
                .with_warnings(warnings);
        report.restored_messages = Some(restored);
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Search archived messages.  Empty or whitespace queries return an
    /// empty result immediately.
    pub fn search_archives(
        &self,
        query: &str,
        filter: Option<SearchFilter>,
        limit: usize,
    ) -> Result<SearchResults> {
        let started = Instant::now();

        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Ok(SearchResults::empty(query));
        }
        let filter = filter.unwrap_or_default();
        let limit = if limit == 0 {
            self.config.default_search_limit
        } else {
            limit
        };

        let cache_key = format!("{}|{:?}|{}", trimmed.to_lowercase(), filter, limit);
        if let Some(cached) = self.caches.get_search(&cache_key) {
            return Ok(cached);
        }

        let candidate_ids = self.index.search(trimmed, &filter, limit)?;

        let now = Utc::now();
        let query_words = search::tokenize(trimmed);
        let mut hits = Vec::new();

        for archive_id in candidate_ids {
            // A stale index entry may point at a deleted archive; skip it.
            let Some((archive, _)) = self.load_archive(&archive_id)? else {
                continue;
            };
            let summary = ArchivedChatSummary::from(archive.as_ref());

            for msg in &archive.messages {
                if !search::message_matches_filter(msg, &filter) {
                    continue;
                }
                let score = search::score_message(trimmed, &query_words, msg, now);
                if score <= 0 {
                    continue;
                }
                hits.push(SearchHit {
                    archive_id: archive_id.clone(),
                    chat: summary.clone(),
                    message: msg.clone(),
                    score,
                });
            }
        }

        hits.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| b.message.timestamp.cmp(&a.message.timestamp))
        });

        let has_more = hits.len() > limit;
        hits.truncate(limit);

        let results = SearchResults {
            query: trimmed.to_string(),
            hits,
            has_more,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        self.caches.put_search(cache_key, results.clone());
        self.stats.record(Operation::Search, started.elapsed());
        Ok(results)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Permanently delete an archive.  Irreversible; message rows and index
    /// entries cascade.
    pub fn permanently_delete_archive(&self, archive_id: &str) -> OperationReport {
        let started = Instant::now();
        let mut report = self.do_delete(archive_id).unwrap_or_else(|e| {
            tracing::warn!(archive_id, error = %e, "delete operation failed");
            OperationReport::failed(Operation::Delete, &e, 0)
        });
        report.elapsed_ms = started.elapsed().as_millis() as u64;
        self.stats.record(Operation::Delete, started.elapsed());
        report
    }

    fn do_delete(&self, archive_id: &str) -> Result<OperationReport> {
        let row = {
            let conn = self.db.lock()?;
            archives::get_chat(&conn, archive_id)?
        }
        .ok_or_else(|| ArchiveError::ArchiveNotFound(archive_id.to_string()))?;

        self.delete_rows(archive_id)?;

        let mut warnings = Vec::new();
        if let Err(e) = self.index.remove_chat(archive_id) {
            warnings.push(format!("search index cleanup failed: {e}"));
        }
        self.caches.invalidate_after_write(Some(archive_id));

        tracing::info!(archive_id, messages = row.message_count, "archive permanently deleted");

        let message = format!(
            "permanently deleted archive of {} ({} messages)",
            row.contact_name, row.message_count
        );
        Ok(
            OperationReport::succeeded(Operation::Delete, Some(archive_id.to_string()), message, 0)
                .with_warnings(warnings),
        )
    }

    /// Remove an archive and its message rows in one transaction.
    fn delete_rows(&self, archive_id: &str) -> Result<bool> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;
        archives::delete_messages(&tx, archive_id)?;
        let deleted = archives::delete_chat(&tx, archive_id)?;
        tx.commit()?;
        Ok(deleted)
    }

    // ------------------------------------------------------------------
    // Read-only aggregations
    // ------------------------------------------------------------------

    /// Load a full archive (metadata and decrypted messages).
    pub fn get_archived_chat(&self, archive_id: &str) -> Result<Option<Arc<ArchivedChat>>> {
        Ok(self.load_archive(archive_id)?.map(|(chat, _)| chat))
    }

    /// List archive summaries, most recently archived first.
    pub fn get_archived_chats(
        &self,
        filter: Option<&ArchiveFilter>,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<ArchivedChatSummary>> {
        let started = Instant::now();

        let default_filter = ArchiveFilter::default();
        let filter = filter.unwrap_or(&default_filter);
        let cacheable = *filter == default_filter && limit.is_none() && offset == 0;

        if cacheable {
            if let Some(cached) = self.caches.summaries() {
                return Ok(cached);
            }
        }

        let rows = {
            let conn = self.db.lock()?;
            archives::list_chats(&conn, filter, limit, offset)?
        };

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(wanted_tag) = &filter.tag {
                // Tags live inside the encrypted metadata blob.
                let decoded = self.mapper.chat_from_row(row.clone(), Vec::new());
                if !decoded.value.metadata.tags.iter().any(|t| t == wanted_tag) {
                    continue;
                }
            }

            let reason = row
                .archive_reason
                .as_deref()
                .and_then(|r| match self.mapper.cipher().decrypt_field(r) {
                    Ok(plain) => Some(plain),
                    Err(e) => {
                        tracing::warn!(archive_id = %row.archive_id, error = %e, "could not decrypt archive reason");
                        None
                    }
                });

            summaries.push(ArchivedChatSummary {
                archive_id: row.archive_id,
                original_chat_id: row.original_chat_id,
                contact_name: row.contact_name,
                archived_at: crate::rows::millis_to_utc(row.archived_at),
                last_message_time: row.last_message_time.map(crate::rows::millis_to_utc),
                message_count: row.message_count.max(0) as usize,
                estimated_size: row.estimated_size.max(0) as u64,
                is_compressed: row.is_compressed,
                compression_ratio: row.compression_ratio,
                reason,
            });
        }

        if cacheable {
            self.caches.set_summaries(summaries.clone());
        }

        self.stats.record(Operation::List, started.elapsed());
        Ok(summaries)
    }

    /// Aggregate statistics over the whole archive store, including rolling
    /// operation timings.
    pub fn get_archive_statistics(&self) -> Result<ArchiveStatistics> {
        let started = Instant::now();

        let (aggregates, per_month, per_contact) = {
            let conn = self.db.lock()?;
            (
                archives::aggregates(&conn)?,
                archives::counts_per_month(&conn)?,
                archives::counts_per_contact(&conn)?,
            )
        };

        let stats = ArchiveStatistics {
            total_archives: aggregates.total_archives,
            total_messages: aggregates.total_messages,
            total_size_bytes: aggregates.total_size_bytes,
            compressed_archives: aggregates.compressed_archives,
            average_compression_ratio: aggregates.average_compression_ratio,
            archives_per_month: per_month.into_iter().collect(),
            archives_per_contact: per_contact.into_iter().collect(),
            operation_timings: self.stats.snapshot(),
        };

        self.stats.record(Operation::Statistics, started.elapsed());
        Ok(stats)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn load_archive(
        &self,
        archive_id: &str,
    ) -> Result<Option<(Arc<ArchivedChat>, Vec<String>)>> {
        if let Some(cached) = self.caches.get_archive(archive_id) {
            return Ok(Some((cached, Vec::new())));
        }

        let (chat_row, message_rows) = {
            let conn = self.db.lock()?;
            match archives::get_chat(&conn, archive_id)? {
                None => return Ok(None),
                Some(row) => (row, archives::get_messages(&conn, archive_id)?),
            }
        };

        let mut warnings = Vec::new();
        let mut messages = Vec::with_capacity(message_rows.len());
        for row in message_rows {
            let decoded = self.mapper.message_from_row(row);
            warnings.extend(decoded.warnings);
            messages.push(decoded.value);
        }

        let decoded = self.mapper.chat_from_row(chat_row, messages);
        warnings.extend(decoded.warnings);

        let archive = Arc::new(decoded.value);
        self.caches.put_archive(archive.clone());
        Ok(Some((archive, warnings)))
    }
}

fn estimate_size(messages: &[ArchivedMessage]) -> u64 {
    messages
        .iter()
        .map(|m| (m.content.len() + m.searchable_text.len() + ROW_OVERHEAD_BYTES) as u64)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::MemoryLiveStore;
    use crate::models::LiveMessage;
    use chrono::Duration;

    fn engine_with(strategy: SearchStrategyKind) -> (ChatArchiver, Arc<MemoryLiveStore>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = MemoryLiveStore::new();
        let config = ArchiveConfig {
            search_strategy: strategy,
            ..Default::default()
        };
        let archiver = ChatArchiver::new(
            db,
            FieldCipher::from_passphrase("test-passphrase"),
            store.clone(),
            store.clone(),
            config,
        );
        archiver.initialize().unwrap();
        (archiver, store)
    }

    fn seed(store: &MemoryLiveStore, chat_id: &str, contact: &str, contents: &[&str]) {
        let now = Utc::now();
        let messages = contents
            .iter()
            .enumerate()
            .map(|(i, content)| {
                LiveMessage::text(
                    &format!("{chat_id}-m{i}"),
                    chat_id,
                    content,
                    now - Duration::minutes((contents.len() - i) as i64),
                )
            })
            .collect();
        store.seed_chat(
            LiveChat {
                id: chat_id.to_string(),
                contact_name: contact.to_string(),
                contact_public_key: None,
                last_message_time: Some(now),
                unread_count: 2,
                is_online: false,
                has_unsent_messages: false,
            },
            messages,
        );
    }

    #[test]
    fn initialize_is_idempotent() {
        let (archiver, _) = engine_with(SearchStrategyKind::FullText);
        archiver.initialize().unwrap();
        archiver.initialize().unwrap();
    }

    #[test]
    fn archive_unknown_chat_fails() {
        let (archiver, _) = engine_with(SearchStrategyKind::FullText);
        let report = archiver.archive_chat("nope", None, None, true);
        assert!(!report.success);
        assert!(report.error.as_deref().unwrap().contains("not found"));
    }

    #[test]
    fn archive_empty_chat_fails_and_persists_nothing() {
        let (archiver, store) = engine_with(SearchStrategyKind::FullText);
        seed(&store, "c1", "Alice", &[]);

        let report = archiver.archive_chat("c1", None, None, true);
        assert!(!report.success);
        assert!(report.message.contains("no messages"));
        assert!(archiver
            .get_archived_chats(None, None, 0)
            .unwrap()
            .is_empty());
        // The live chat was not touched.
        assert!(store.chat("c1").unwrap().is_some());
    }

    #[test]
    fn archive_preserves_order_and_empties_live_store() {
        let (archiver, store) = engine_with(SearchStrategyKind::FullText);
        seed(&store, "c1", "Alice", &["hi", "there"]);

        let report = archiver.archive_chat("c1", Some("cleanup".into()), None, true);
        assert!(report.success, "{:?}", report);
        let archive_id = report.archive_id.unwrap();

        let archive = archiver.get_archived_chat(&archive_id).unwrap().unwrap();
        assert_eq!(archive.message_count, 2);
        assert_eq!(archive.messages[0].content, "hi");
        assert_eq!(archive.messages[1].content, "there");
        assert_eq!(archive.metadata.reason.as_deref(), Some("cleanup"));

        assert!(store.messages("c1").unwrap().is_empty());
        assert!(store.chat("c1").unwrap().is_none());
    }

    #[test]
    fn small_archive_is_not_compressed() {
        let (archiver, store) = engine_with(SearchStrategyKind::FullText);
        seed(&store, "c1", "Alice", &["short"]);

        let report = archiver.archive_chat("c1", None, None, true);
        let archive = archiver
            .get_archived_chat(&report.archive_id.unwrap())
            .unwrap()
            .unwrap();
        assert!(!archive.is_compressed);
    }

    #[test]
    fn oversized_archive_is_compressed_and_recoverable() {
        let (archiver, store) = engine_with(SearchStrategyKind::FullText);
        let long = "la ".repeat(2000); // ~6 KiB per message
        seed(&store, "c1", "Alice", &[&long, &long, &long]);

        let report = archiver.archive_chat("c1", None, None, true);
        assert!(report.success, "{:?}", report);
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("compressed")));

        let archive = archiver
            .get_archived_chat(&report.archive_id.unwrap())
            .unwrap()
            .unwrap();
        assert!(archive.is_compressed);
        assert!(archive.compression_info.as_ref().unwrap().ratio < 1.0);
        assert!(!archive.metadata.has_search_index);
        // Messages come back out of the blob intact.
        assert_eq!(archive.messages.len(), 3);
        assert_eq!(archive.messages[0].content, long);
    }

    #[test]
    fn oversized_archive_without_compression_warns() {
        let (archiver, store) = engine_with(SearchStrategyKind::FullText);
        let long = "la ".repeat(2000);
        seed(&store, "c1", "Alice", &[&long, &long, &long]);

        let report = archiver.archive_chat("c1", None, None, false);
        assert!(report.success);
        assert!(report.warnings.iter().any(|w| w.contains("indexing")));

        let archive = archiver
            .get_archived_chat(&report.archive_id.unwrap())
            .unwrap()
            .unwrap();
        assert!(!archive.is_compressed);
        assert_eq!(archive.messages.len(), 3);
    }

    #[test]
    fn restore_consumes_archive() {
        let (archiver, store) = engine_with(SearchStrategyKind::FullText);
        seed(&store, "c1", "Alice", &["hi", "there"]);

        let archive_id = archiver
            .archive_chat("c1", None, None, true)
            .archive_id
            .unwrap();

        let report = archiver.restore_chat(&archive_id, None, false);
        assert!(report.success, "{:?}", report);
        assert_eq!(report.restored_messages, Some(2));

        // Messages are back in the live store, under the original id.
        assert_eq!(store.messages("c1").unwrap().len(), 2);
        assert!(store.chat("c1").unwrap().is_some());

        // The archive is gone.
        assert!(archiver.get_archived_chat(&archive_id).unwrap().is_none());
    }

    #[test]
    fn restore_into_existing_chat_allocates_fresh_id() {
        let (archiver, store) = engine_with(SearchStrategyKind::FullText);
        seed(&store, "c1", "Alice", &["hi"]);
        let archive_id = archiver
            .archive_chat("c1", None, None, true)
            .archive_id
            .unwrap();

        // A new conversation reuses the old chat id in the meantime.
        seed(&store, "c1", "Alice", &["newer talk"]);

        let report = archiver.restore_chat(&archive_id, None, false);
        assert!(report.success);
        assert!(report.warnings.iter().any(|w| w.contains("already exists")));

        // The pre-existing live conversation is untouched.
        let live = store.messages("c1").unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].content, "newer talk");
    }

    #[test]
    fn partial_restore_succeeds_with_warning() {
        let (archiver, store) = engine_with(SearchStrategyKind::FullText);
        let contents: Vec<String> = (0..50).map(|i| format!("message number {i}")).collect();
        let refs: Vec<&str> = contents.iter().map(String::as_str).collect();
        seed(&store, "c1", "Alice", &refs);

        let archive_id = archiver
            .archive_chat("c1", None, None, true)
            .archive_id
            .unwrap();

        store.fail_saves_for("c1-m7");
        let report = archiver.restore_chat(&archive_id, None, false);
        assert!(report.success);
        assert_eq!(report.restored_messages, Some(49));
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("restored 49/50")));
    }

    #[test]
    fn total_restore_failure_keeps_archive() {
        let (archiver, store) = engine_with(SearchStrategyKind::FullText);
        seed(&store, "c1", "Alice", &["only one"]);

        let archive_id = archiver
            .archive_chat("c1", None, None, true)
            .archive_id
            .unwrap();

        store.fail_saves_for("c1-m0");
        let report = archiver.restore_chat(&archive_id, None, false);
        assert!(!report.success);
        assert!(report.error.as_deref().unwrap().contains("0 of 1"));

        // The archive survives a failed restore.
        assert!(archiver.get_archived_chat(&archive_id).unwrap().is_some());
    }

    #[test]
    fn delete_cascades_and_is_reported() {
        let (archiver, store) = engine_with(SearchStrategyKind::FullText);
        seed(&store, "c1", "Alice", &["hi", "there"]);
        let archive_id = archiver
            .archive_chat("c1", None, None, true)
            .archive_id
            .unwrap();

        let report = archiver.permanently_delete_archive(&archive_id);
        assert!(report.success);
        assert!(archiver.get_archived_chat(&archive_id).unwrap().is_none());

        // Deleting again reports not-found.
        let again = archiver.permanently_delete_archive(&archive_id);
        assert!(!again.success);
    }

    #[test]
    fn search_finds_unique_token_in_both_strategies() {
        for strategy in [SearchStrategyKind::FullText, SearchStrategyKind::Inverted] {
            let (archiver, store) = engine_with(strategy);
            seed(&store, "c1", "Alice", &["the password is tournesol", "ok"]);
            seed(&store, "c2", "Bob", &["nothing relevant here"]);
            assert!(archiver.archive_chat("c1", None, None, true).success);
            assert!(archiver.archive_chat("c2", None, None, true).success);

            let results = archiver.search_archives("tournesol", None, 10).unwrap();
            assert_eq!(results.hits.len(), 1, "strategy {:?}", strategy);
            assert!(results.hits[0].message.content.contains("tournesol"));
            assert!(!results.has_more);

            let none = archiver.search_archives("xyzzyplugh", None, 10).unwrap();
            assert!(none.hits.is_empty());
            assert!(!none.has_more);
        }
    }

    #[test]
    fn empty_query_returns_empty_result() {
        let (archiver, _) = engine_with(SearchStrategyKind::FullText);
        let results = archiver.search_archives("   ", None, 10).unwrap();
        assert!(results.hits.is_empty());
        assert!(!results.has_more);
    }

    #[test]
    fn search_respects_message_filters() {
        let (archiver, store) = engine_with(SearchStrategyKind::FullText);
        let now = Utc::now();
        let mut mine = LiveMessage::text("m1", "c1", "projet secret", now);
        mine.is_from_me = true;
        let theirs = LiveMessage::text("m2", "c1", "projet public", now);
        store.seed_chat(
            LiveChat {
                id: "c1".into(),
                contact_name: "Alice".into(),
                contact_public_key: None,
                last_message_time: Some(now),
                unread_count: 0,
                is_online: false,
                has_unsent_messages: false,
            },
            vec![mine, theirs],
        );
        assert!(archiver.archive_chat("c1", None, None, true).success);

        let filter = SearchFilter {
            from_me: Some(true),
            ..Default::default()
        };
        let results = archiver.search_archives("projet", Some(filter), 10).unwrap();
        assert_eq!(results.hits.len(), 1);
        assert!(results.hits[0].message.is_from_me);
    }

    #[test]
    fn summaries_and_statistics_reflect_archives() {
        let (archiver, store) = engine_with(SearchStrategyKind::FullText);
        seed(&store, "c1", "Alice", &["hi", "there"]);
        seed(&store, "c2", "Bob", &["salut"]);
        assert!(archiver
            .archive_chat("c1", Some("cleanup".into()), None, true)
            .success);
        assert!(archiver.archive_chat("c2", None, None, true).success);

        let summaries = archiver.get_archived_chats(None, None, 0).unwrap();
        assert_eq!(summaries.len(), 2);
        assert!(summaries
            .iter()
            .any(|s| s.reason.as_deref() == Some("cleanup")));

        let filter = ArchiveFilter {
            contact_name: Some("alice".into()),
            ..Default::default()
        };
        let filtered = archiver.get_archived_chats(Some(&filter), None, 0).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].contact_name, "Alice");

        let stats = archiver.get_archive_statistics().unwrap();
        assert_eq!(stats.total_archives, 2);
        assert_eq!(stats.total_messages, 3);
        assert_eq!(stats.archives_per_contact.get("Alice"), Some(&1));
        assert_eq!(stats.archives_per_month.values().sum::<usize>(), 2);
        assert!(stats
            .operation_timings
            .iter()
            .any(|t| t.operation == Operation::Archive && t.count == 2));
    }

    #[test]
    fn compressed_archive_restores_fully() {
        let (archiver, store) = engine_with(SearchStrategyKind::Inverted);
        let long = "contenu repete ".repeat(800);
        seed(&store, "c1", "Alice", &[&long, &long]);

        let report = archiver.archive_chat("c1", None, None, true);
        assert!(report.success);
        let archive_id = report.archive_id.unwrap();

        // The inverted index still finds whole-compressed archives: it was
        // fed from memory at archive time.
        let results = archiver.search_archives("repete", None, 10).unwrap();
        assert_eq!(results.hits.len(), 2);

        let restore = archiver.restore_chat(&archive_id, None, false);
        assert!(restore.success, "{:?}", restore);
        assert_eq!(restore.restored_messages, Some(2));
        assert_eq!(store.messages("c1").unwrap().len(), 2);
    }
}
