//! Domain model structs for the archival engine.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be embedded
//! in JSON blob columns and handed directly to callers.  Archives are
//! immutable once written: only the compression-state fields are set, and
//! only at creation time.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema version written into archive metadata.
pub const ARCHIVE_VERSION: u32 = 2;

/// Reserved `custom_data` key carrying the compressed message blob when
/// whole-archive compression is applied.
pub const CUSTOM_KEY_COMPRESSED_MESSAGES: &str = "compressed_messages";

// ---------------------------------------------------------------------------
// Message enums
// ---------------------------------------------------------------------------

/// Delivery state of a message, preserved verbatim from the live store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
            MessageStatus::Failed => "failed",
        }
    }

    /// Parse a stored status string.  Unknown values (from newer schema
    /// generations) degrade to `Sent` rather than failing the row.
    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => MessageStatus::Pending,
            "sent" => MessageStatus::Sent,
            "delivered" => MessageStatus::Delivered,
            "read" => MessageStatus::Read,
            "failed" => MessageStatus::Failed,
            _ => MessageStatus::Sent,
        }
    }
}

/// Message priority.  Anything above `Normal` earns a relevance bonus in
/// search ranking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessagePriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl MessagePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessagePriority::Low => "low",
            MessagePriority::Normal => "normal",
            MessagePriority::High => "high",
            MessagePriority::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "low" => MessagePriority::Low,
            "normal" => MessagePriority::Normal,
            "high" => MessagePriority::High,
            "urgent" => MessagePriority::Urgent,
            _ => MessagePriority::Normal,
        }
    }

    /// True for priorities above normal.
    pub fn is_elevated(&self) -> bool {
        *self > MessagePriority::Normal
    }
}

/// How much of a message was preserved at archive time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PreservationLevel {
    /// All enhanced attributes kept.
    #[default]
    Full,
    /// Only content and core attributes kept.
    ContentOnly,
}

/// Whether a message made it into the search index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IndexingStatus {
    #[default]
    Indexed,
    /// Stored inside a compressed blob; not individually indexed.
    Skipped,
}

// ---------------------------------------------------------------------------
// Message attachments and receipts
// ---------------------------------------------------------------------------

/// An emoji reaction attached to a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reaction {
    pub emoji: String,
    /// Display name or public key of the reacting peer.
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reacted_at: Option<DateTime<Utc>>,
}

/// Attachment metadata.  The payload itself lives in the blob store and is
/// out of scope for archival.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub size_bytes: u64,
}

/// A delivery or read receipt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Receipt {
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by: Option<String>,
}

/// Transport-level encryption metadata recorded when the message was live.
/// Stored in the clear; it describes the wire crypto, it is not a secret.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptionInfo {
    pub algorithm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Live records (collaborator-facing)
// ---------------------------------------------------------------------------

/// A conversation as seen by the live chat list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LiveChat {
    pub id: String,
    pub contact_name: String,
    pub contact_public_key: Option<String>,
    pub last_message_time: Option<DateTime<Utc>>,
    pub unread_count: u32,
    pub is_online: bool,
    pub has_unsent_messages: bool,
}

/// A message in the live store, with all enhanced attributes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LiveMessage {
    pub id: String,
    pub chat_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_from_me: bool,
    pub status: MessageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub is_starred: bool,
    #[serde(default)]
    pub is_forwarded: bool,
    #[serde(default)]
    pub priority: MessagePriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<Reaction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_receipt: Option<Receipt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_receipt: Option<Receipt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_info: Option<EncryptionInfo>,
    #[serde(default)]
    pub has_media: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl LiveMessage {
    /// Minimal constructor for tests and simple callers.
    pub fn text(id: &str, chat_id: &str, content: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            chat_id: chat_id.to_string(),
            content: content.to_string(),
            timestamp,
            is_from_me: false,
            status: MessageStatus::Delivered,
            reply_to_message_id: None,
            thread_id: None,
            is_starred: false,
            is_forwarded: false,
            priority: MessagePriority::Normal,
            edited_at: None,
            original_content: None,
            reactions: Vec::new(),
            attachments: Vec::new(),
            delivery_receipt: None,
            read_receipt: None,
            encryption_info: None,
            has_media: false,
            media_type: None,
            metadata: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Archived chat
// ---------------------------------------------------------------------------

/// Compression details recorded when an archive is compressed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompressionInfo {
    pub algorithm: String,
    pub original_size: u64,
    pub compressed_size: u64,
    pub ratio: f64,
    pub compressed_at: DateTime<Utc>,
}

/// Archive-level metadata, serialized (encrypted) into `metadata_json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatArchiveMetadata {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub original_unread_count: u32,
    #[serde(default)]
    pub was_online: bool,
    #[serde(default)]
    pub had_unsent_messages: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// False when the messages live inside a compressed blob and therefore
    /// never reached the message-level search index.
    #[serde(default = "default_true")]
    pub has_search_index: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ChatArchiveMetadata {
    fn default() -> Self {
        Self {
            version: ARCHIVE_VERSION,
            reason: None,
            original_unread_count: 0,
            was_online: false,
            had_unsent_messages: false,
            tags: Vec::new(),
            has_search_index: true,
        }
    }
}

/// A durable, immutable snapshot of a conversation and its full message
/// history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArchivedChat {
    /// Opaque identity, generated from the source chat id and the archive
    /// creation timestamp.
    pub archive_id: String,
    pub original_chat_id: String,
    pub contact_name: String,
    pub contact_public_key: Option<String>,
    pub archived_at: DateTime<Utc>,
    pub last_message_time: Option<DateTime<Utc>>,
    pub message_count: usize,
    pub estimated_size: u64,
    pub is_compressed: bool,
    pub compression_info: Option<CompressionInfo>,
    pub metadata: ChatArchiveMetadata,
    /// Opaque key/value bag.  Carries the compressed message blob under
    /// [`CUSTOM_KEY_COMPRESSED_MESSAGES`] when whole-archive compression is
    /// applied.
    pub custom_data: Option<serde_json::Map<String, serde_json::Value>>,
    pub messages: Vec<ArchivedMessage>,
}

// ---------------------------------------------------------------------------
// Archived message
// ---------------------------------------------------------------------------

/// Message-level archive bookkeeping, serialized (encrypted) into
/// `archive_metadata_json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageArchiveMetadata {
    pub archive_version: u32,
    #[serde(default)]
    pub preservation_level: PreservationLevel,
    #[serde(default)]
    pub indexing_status: IndexingStatus,
    #[serde(default)]
    pub compression_applied: bool,
    pub original_size: u64,
}

/// A single archived message.  `content` is encrypted at rest and decrypted
/// on read; `searchable_text` is a plaintext, indexable projection of the
/// content kept deliberately separate (a confidentiality/searchability
/// trade-off inherited from the product design).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArchivedMessage {
    /// Original message id, preserved.
    pub id: String,
    /// Back-reference to the owning archive.
    pub archive_id: String,
    pub chat_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_from_me: bool,
    pub status: MessageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub is_starred: bool,
    #[serde(default)]
    pub is_forwarded: bool,
    #[serde(default)]
    pub priority: MessagePriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<Reaction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_receipt: Option<Receipt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_receipt: Option<Receipt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_info: Option<EncryptionInfo>,
    #[serde(default)]
    pub has_media: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    pub archived_at: DateTime<Utc>,
    pub original_timestamp: DateTime<Utc>,
    pub archive_metadata: MessageArchiveMetadata,
    pub searchable_text: String,
    /// Opaque bag for forward-compatible fields written by newer engine
    /// versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserved_state: Option<serde_json::Value>,
}

impl ArchivedMessage {
    /// Build an archived message from a live one.
    pub fn from_live(live: &LiveMessage, archive_id: &str, archived_at: DateTime<Utc>) -> Self {
        let searchable_text = crate::search::normalize_searchable(&live.content);
        let original_size = live.content.len() as u64;
        Self {
            id: live.id.clone(),
            archive_id: archive_id.to_string(),
            chat_id: live.chat_id.clone(),
            content: live.content.clone(),
            timestamp: live.timestamp,
            is_from_me: live.is_from_me,
            status: live.status,
            reply_to_message_id: live.reply_to_message_id.clone(),
            thread_id: live.thread_id.clone(),
            is_starred: live.is_starred,
            is_forwarded: live.is_forwarded,
            priority: live.priority,
            edited_at: live.edited_at,
            original_content: live.original_content.clone(),
            reactions: live.reactions.clone(),
            attachments: live.attachments.clone(),
            delivery_receipt: live.delivery_receipt.clone(),
            read_receipt: live.read_receipt.clone(),
            encryption_info: live.encryption_info.clone(),
            has_media: live.has_media,
            media_type: live.media_type.clone(),
            metadata: live.metadata.clone(),
            archived_at,
            original_timestamp: live.timestamp,
            archive_metadata: MessageArchiveMetadata {
                archive_version: ARCHIVE_VERSION,
                preservation_level: PreservationLevel::Full,
                indexing_status: IndexingStatus::Indexed,
                compression_applied: false,
                original_size,
            },
            searchable_text,
            preserved_state: None,
        }
    }

    /// Convert back into a live message for restoration, remapping the
    /// owning chat id.
    pub fn to_live(&self, target_chat_id: &str) -> LiveMessage {
        LiveMessage {
            id: self.id.clone(),
            chat_id: target_chat_id.to_string(),
            content: self.content.clone(),
            timestamp: self.original_timestamp,
            is_from_me: self.is_from_me,
            status: self.status,
            reply_to_message_id: self.reply_to_message_id.clone(),
            thread_id: self.thread_id.clone(),
            is_starred: self.is_starred,
            is_forwarded: self.is_forwarded,
            priority: self.priority,
            edited_at: self.edited_at,
            original_content: self.original_content.clone(),
            reactions: self.reactions.clone(),
            attachments: self.attachments.clone(),
            delivery_receipt: self.delivery_receipt.clone(),
            read_receipt: self.read_receipt.clone(),
            encryption_info: self.encryption_info.clone(),
            has_media: self.has_media,
            media_type: self.media_type.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Summaries and filters
// ---------------------------------------------------------------------------

/// Lightweight archive listing entry.  Built without decrypting message
/// rows; only the archive reason is decrypted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArchivedChatSummary {
    pub archive_id: String,
    pub original_chat_id: String,
    pub contact_name: String,
    pub archived_at: DateTime<Utc>,
    pub last_message_time: Option<DateTime<Utc>>,
    pub message_count: usize,
    pub estimated_size: u64,
    pub is_compressed: bool,
    pub compression_ratio: Option<f64>,
    pub reason: Option<String>,
}

impl From<&ArchivedChat> for ArchivedChatSummary {
    fn from(chat: &ArchivedChat) -> Self {
        Self {
            archive_id: chat.archive_id.clone(),
            original_chat_id: chat.original_chat_id.clone(),
            contact_name: chat.contact_name.clone(),
            archived_at: chat.archived_at,
            last_message_time: chat.last_message_time,
            message_count: chat.message_count,
            estimated_size: chat.estimated_size,
            is_compressed: chat.is_compressed,
            compression_ratio: chat.compression_info.as_ref().map(|c| c.ratio),
            reason: chat.metadata.reason.clone(),
        }
    }
}

/// Filter applied when listing archives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArchiveFilter {
    pub contact_name: Option<String>,
    pub archived_after: Option<DateTime<Utc>>,
    pub archived_before: Option<DateTime<Utc>>,
    pub only_compressed: bool,
    pub tag: Option<String>,
}

/// Filter applied to search candidates and matched messages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    pub contact_name: Option<String>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub from_me: Option<bool>,
    pub starred_only: bool,
    pub with_attachments: bool,
    pub edited_only: bool,
}

// ---------------------------------------------------------------------------
// Operation results
// ---------------------------------------------------------------------------

/// The operation kinds the engine exposes, used for reports and timing
/// statistics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Archive,
    Restore,
    Search,
    Delete,
    List,
    Statistics,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Archive => "archive",
            Operation::Restore => "restore",
            Operation::Search => "search",
            Operation::Delete => "delete",
            Operation::List => "list",
            Operation::Statistics => "statistics",
        }
    }
}

/// Outcome of a mutating operation.  Warnings are advisory: an operation
/// can succeed with warnings ("archived, but compressed"), and expected
/// domain failures arrive here rather than as errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationReport {
    pub operation: Operation,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_id: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_messages: Option<usize>,
    pub elapsed_ms: u64,
    /// Structured detail of the underlying error, when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationReport {
    pub fn succeeded(
        operation: Operation,
        archive_id: Option<String>,
        message: impl Into<String>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            operation,
            success: true,
            archive_id,
            message: message.into(),
            warnings: Vec::new(),
            restored_messages: None,
            elapsed_ms,
            error: None,
        }
    }

    pub fn failed(operation: Operation, error: &crate::error::ArchiveError, elapsed_ms: u64) -> Self {
        Self {
            operation,
            success: false,
            archive_id: None,
            message: error.to_string(),
            warnings: Vec::new(),
            restored_messages: None,
            elapsed_ms,
            error: Some(error.to_string()),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

// ---------------------------------------------------------------------------
// Search results
// ---------------------------------------------------------------------------

/// A matched message together with its owning chat summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub archive_id: String,
    pub chat: ArchivedChatSummary,
    pub message: ArchivedMessage,
    /// Heuristic relevance score (text match strength + recency +
    /// importance signals).
    pub score: i64,
}

/// Result of a search across archives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResults {
    pub query: String,
    pub hits: Vec<SearchHit>,
    /// True when more matches exist beyond the requested limit.
    pub has_more: bool,
    pub elapsed_ms: u64,
}

impl SearchResults {
    pub fn empty(query: &str) -> Self {
        Self {
            query: query.to_string(),
            hits: Vec::new(),
            has_more: false,
            elapsed_ms: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Rolling timing snapshot for one operation kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationTimings {
    pub operation: Operation,
    pub count: u64,
    pub min_ms: u64,
    pub max_ms: u64,
    pub mean_ms: f64,
}

/// Read-only aggregation over the whole archive store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ArchiveStatistics {
    pub total_archives: usize,
    pub total_messages: u64,
    pub total_size_bytes: u64,
    pub compressed_archives: usize,
    pub average_compression_ratio: Option<f64>,
    /// `"YYYY-MM"` -> archive count.
    pub archives_per_month: BTreeMap<String, usize>,
    pub archives_per_contact: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operation_timings: Vec<OperationTimings>,
}
