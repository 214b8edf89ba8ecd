//! Search over archived messages.
//!
//! Two interchangeable strategies sit behind [`SearchIndex`]: a
//! trigger-maintained FTS5 shadow table queried with one statement
//! ([`fulltext`]), and a hand-rolled inverted index of posting lists
//! ([`inverted`]).  Both return candidate archive ids; the orchestrator
//! loads candidates, ranks individual messages with [`score_message`], and
//! applies message-level filters.

pub mod fulltext;
pub mod inverted;

use chrono::{DateTime, Datelike, Duration, Utc};

use crate::error::Result;
use crate::models::{ArchivedChat, ArchivedMessage, SearchFilter};

pub use fulltext::FullTextIndex;
pub use inverted::InvertedIndex;

/// Minimum token length; shorter tokens are discarded as noise.
const MIN_TOKEN_LEN: usize = 3;

/// A search index over archives.
pub trait SearchIndex: Send + Sync {
    /// Bring strategy-local state up to date (e.g. rebuild posting lists).
    /// Must be idempotent.
    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Record a freshly persisted archive.
    fn index_chat(&self, chat: &ArchivedChat) -> Result<()>;

    /// Return candidate archive ids for a query, best-effort ordered by
    /// recency.  Message-level ranking and filtering happen downstream.
    fn search(&self, query: &str, filter: &SearchFilter, limit: usize) -> Result<Vec<String>>;

    /// Drop all index entries for an archive.
    fn remove_chat(&self, archive_id: &str) -> Result<()>;
}

/// Normalize message content into its indexable projection: lower-cased,
/// non-word characters stripped, whitespace collapsed.
pub fn normalize_searchable(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut last_was_space = true;
    for ch in content.to_lowercase().chars() {
        if ch.is_alphanumeric() {
            out.push(ch);
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Tokenize text for indexing and querying: normalize, split on
/// whitespace, discard tokens of length <= 2.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize_searchable(text)
        .split_whitespace()
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_string)
        .collect()
}

/// `YYYY-MM` bucket for the date index.
pub fn month_key(ts: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", ts.year(), ts.month())
}

/// Relevance score for a matched message.
///
/// Text match strength dominates: +10 for an exact substring match of the
/// whole query, +5 per query word that prefixes a content word, +2 per
/// query word merely contained in one.  Recency and importance add small
/// bonuses.  A message with no textual match scores 0 and is not a hit.
pub fn score_message(
    query: &str,
    query_words: &[String],
    msg: &ArchivedMessage,
    now: DateTime<Utc>,
) -> i64 {
    let content = msg.content.to_lowercase();
    let content_words: Vec<&str> = msg.searchable_text.split_whitespace().collect();

    let mut score = 0i64;

    if content.contains(&query.to_lowercase()) {
        score += 10;
    }

    for word in query_words {
        if content_words.iter().any(|cw| cw.starts_with(word.as_str())) {
            score += 5;
        } else if content_words.iter().any(|cw| cw.contains(word.as_str())) {
            score += 2;
        }
    }

    if score == 0 {
        return 0;
    }

    let age = now.signed_duration_since(msg.timestamp);
    if age < Duration::days(7) {
        score += 2;
    }
    if age < Duration::days(30) {
        score += 1;
    }
    if msg.is_starred {
        score += 3;
    }
    if msg.priority.is_elevated() {
        score += 1;
    }

    score
}

/// Message-level post-filter shared by both strategies.
pub fn message_matches_filter(msg: &ArchivedMessage, filter: &SearchFilter) -> bool {
    if let Some(from_me) = filter.from_me {
        if msg.is_from_me != from_me {
            return false;
        }
    }
    if filter.starred_only && !msg.is_starred {
        return false;
    }
    if filter.with_attachments && msg.attachments.is_empty() && !msg.has_media {
        return false;
    }
    if filter.edited_only && msg.edited_at.is_none() {
        return false;
    }
    if let Some(after) = filter.after {
        if msg.timestamp < after {
            return false;
        }
    }
    if let Some(before) = filter.before {
        if msg.timestamp > before {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LiveMessage, MessagePriority};

    fn message(content: &str, age_days: i64) -> ArchivedMessage {
        let ts = Utc::now() - Duration::days(age_days);
        let live = LiveMessage::text("m1", "c1", content, ts);
        ArchivedMessage::from_live(&live, "arc-1", Utc::now())
    }

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(
            normalize_searchable("Hello, World!!  How's it going?"),
            "hello world how s it going"
        );
    }

    #[test]
    fn tokenize_drops_short_tokens() {
        let tokens = tokenize("On se voit au café demain");
        assert_eq!(tokens, vec!["voit", "café", "demain"]);
    }

    #[test]
    fn month_key_format() {
        let ts = DateTime::parse_from_rfc3339("2026-08-07T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(month_key(ts), "2026-08");
    }

    #[test]
    fn exact_phrase_beats_partial() {
        let now = Utc::now();
        let exact = message("rendezvous tomorrow morning", 100);
        let partial = message("tomorrows forecast is fine", 100);

        let words = tokenize("rendezvous tomorrow");
        let exact_score = score_message("rendezvous tomorrow", &words, &exact, now);
        let partial_score = score_message("rendezvous tomorrow", &words, &partial, now);
        assert!(exact_score > partial_score);
        assert!(partial_score > 0);
    }

    #[test]
    fn no_text_match_scores_zero_despite_bonuses() {
        let now = Utc::now();
        let mut msg = message("completely unrelated", 1);
        msg.is_starred = true;
        msg.priority = MessagePriority::Urgent;

        let words = tokenize("rendezvous");
        assert_eq!(score_message("rendezvous", &words, &msg, now), 0);
    }

    #[test]
    fn recency_and_importance_bonuses() {
        let now = Utc::now();
        let words = tokenize("rendezvous");

        let old = message("rendezvous chez moi", 100);
        let recent = message("rendezvous chez moi", 1);
        let mut starred = message("rendezvous chez moi", 100);
        starred.is_starred = true;

        let old_score = score_message("rendezvous", &words, &old, now);
        assert!(score_message("rendezvous", &words, &recent, now) == old_score + 3);
        assert!(score_message("rendezvous", &words, &starred, now) == old_score + 3);
    }

    #[test]
    fn filter_matches() {
        let mut msg = message("bonjour", 1);
        msg.is_from_me = true;

        let mut filter = SearchFilter::default();
        assert!(message_matches_filter(&msg, &filter));

        filter.from_me = Some(false);
        assert!(!message_matches_filter(&msg, &filter));

        filter.from_me = None;
        filter.starred_only = true;
        assert!(!message_matches_filter(&msg, &filter));
    }
}
