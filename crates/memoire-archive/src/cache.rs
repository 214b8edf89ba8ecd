//! Bounded in-process caches.
//!
//! Loaded archives and search results are cached with LRU eviction; the
//! summary listing is cached whole.  Any write (archive, restore, delete)
//! invalidates conservatively: the summary and search caches are cleared
//! rather than patched, and the touched archive is evicted.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use lru::LruCache;

use crate::models::{ArchivedChat, ArchivedChatSummary, SearchResults};

pub struct EngineCaches {
    archives: Mutex<LruCache<String, Arc<ArchivedChat>>>,
    search: Mutex<LruCache<String, SearchResults>>,
    summaries: Mutex<Option<Vec<ArchivedChatSummary>>>,
}

fn capacity(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n.max(1)).unwrap_or(NonZeroUsize::MIN)
}

fn recover<T>(guard: std::sync::LockResult<MutexGuard<'_, T>>) -> MutexGuard<'_, T> {
    guard.unwrap_or_else(|e| e.into_inner())
}

impl EngineCaches {
    pub fn new(archive_capacity: usize, search_capacity: usize) -> Self {
        Self {
            archives: Mutex::new(LruCache::new(capacity(archive_capacity))),
            search: Mutex::new(LruCache::new(capacity(search_capacity))),
            summaries: Mutex::new(None),
        }
    }

    pub fn get_archive(&self, archive_id: &str) -> Option<Arc<ArchivedChat>> {
        recover(self.archives.lock()).get(archive_id).cloned()
    }

    pub fn put_archive(&self, chat: Arc<ArchivedChat>) {
        recover(self.archives.lock()).put(chat.archive_id.clone(), chat);
    }

    pub fn get_search(&self, key: &str) -> Option<SearchResults> {
        recover(self.search.lock()).get(key).cloned()
    }

    pub fn put_search(&self, key: String, results: SearchResults) {
        recover(self.search.lock()).put(key, results);
    }

    pub fn summaries(&self) -> Option<Vec<ArchivedChatSummary>> {
        recover(self.summaries.lock()).clone()
    }

    pub fn set_summaries(&self, summaries: Vec<ArchivedChatSummary>) {
        *recover(self.summaries.lock()) = Some(summaries);
    }

    /// Conservative invalidation after any write.
    pub fn invalidate_after_write(&self, archive_id: Option<&str>) {
        if let Some(id) = archive_id {
            recover(self.archives.lock()).pop(id);
        }
        recover(self.search.lock()).clear();
        *recover(self.summaries.lock()) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatArchiveMetadata;
    use chrono::Utc;

    fn chat(id: &str) -> Arc<ArchivedChat> {
        Arc::new(ArchivedChat {
            archive_id: id.to_string(),
            original_chat_id: "c1".into(),
            contact_name: "Alice".into(),
            contact_public_key: None,
            archived_at: Utc::now(),
            last_message_time: None,
            message_count: 0,
            estimated_size: 0,
            is_compressed: false,
            compression_info: None,
            metadata: ChatArchiveMetadata::default(),
            custom_data: None,
            messages: Vec::new(),
        })
    }

    #[test]
    fn lru_evicts_beyond_capacity() {
        let caches = EngineCaches::new(2, 2);
        caches.put_archive(chat("a"));
        caches.put_archive(chat("b"));
        caches.put_archive(chat("c"));

        assert!(caches.get_archive("a").is_none());
        assert!(caches.get_archive("b").is_some());
        assert!(caches.get_archive("c").is_some());
    }

    #[test]
    fn write_invalidation_clears_search_and_summaries() {
        let caches = EngineCaches::new(2, 2);
        caches.put_archive(chat("a"));
        caches.put_search("q".into(), SearchResults::empty("q"));
        caches.set_summaries(Vec::new());

        caches.invalidate_after_write(Some("a"));

        assert!(caches.get_archive("a").is_none());
        assert!(caches.get_search("q").is_none());
        assert!(caches.summaries().is_none());
    }

    #[test]
    fn untouched_archives_survive_invalidation() {
        let caches = EngineCaches::new(2, 2);
        caches.put_archive(chat("a"));
        caches.put_archive(chat("b"));

        caches.invalidate_after_write(Some("a"));
        assert!(caches.get_archive("b").is_some());
    }
}
