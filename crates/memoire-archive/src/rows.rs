//! Typed storage rows and the entity ⇄ row mapper.
//!
//! Rows are explicit structs with typed fields, so a missing or mistyped
//! column is a constructor-time error rather than a runtime cast failure.
//! The [`RowMapper`] composes the field cipher and the compression codec:
//! writes compress (when beneficial) then encrypt each sensitive field;
//! reads probe for the encryption and compression markers before decoding,
//! so rows written by earlier generations (unencrypted, uncompressed)
//! degrade gracefully instead of failing.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use crate::cipher::FieldCipher;
use crate::codec;
use crate::error::Result;
use crate::models::{
    ArchivedChat, ArchivedMessage, ChatArchiveMetadata, CompressionInfo, MessageArchiveMetadata,
    MessagePriority, MessageStatus, CUSTOM_KEY_COMPRESSED_MESSAGES,
};

/// A decoded entity together with any per-field degradation warnings
/// collected along the way.
#[derive(Debug)]
pub struct Decoded<T> {
    pub value: T,
    pub warnings: Vec<String>,
}

/// One row of `archived_chats`.
#[derive(Debug, Clone)]
pub struct ArchivedChatRow {
    pub archive_id: String,
    pub original_chat_id: String,
    pub contact_name: String,
    pub contact_public_key: Option<String>,
    pub archived_at: i64,
    pub last_message_time: Option<i64>,
    pub message_count: i64,
    pub archive_reason: Option<String>,
    pub estimated_size: i64,
    pub is_compressed: bool,
    pub compression_ratio: Option<f64>,
    pub metadata_json: String,
    pub compression_info_json: Option<String>,
    pub custom_data_json: Option<String>,
}

/// One row of `archived_messages`.
#[derive(Debug, Clone)]
pub struct ArchivedMessageRow {
    pub id: String,
    pub archive_id: String,
    pub original_message_id: String,
    pub chat_id: String,
    pub content: String,
    pub timestamp: i64,
    pub is_from_me: bool,
    pub status: String,
    pub reply_to_message_id: Option<String>,
    pub thread_id: Option<String>,
    pub is_starred: bool,
    pub is_forwarded: bool,
    pub priority: String,
    pub edited_at: Option<i64>,
    pub original_content: Option<String>,
    pub has_media: bool,
    pub media_type: Option<String>,
    pub archived_at: i64,
    pub original_timestamp: i64,
    pub metadata_json: Option<String>,
    pub delivery_receipt_json: Option<String>,
    pub read_receipt_json: Option<String>,
    pub reactions_json: Option<String>,
    pub attachments_json: Option<String>,
    pub encryption_info_json: Option<String>,
    pub archive_metadata_json: String,
    pub preserved_state_json: Option<String>,
    pub searchable_text: String,
}

pub(crate) fn millis_to_utc(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Converts domain entities to and from storage rows, applying field
/// crypto and codec-aware JSON encoding per field.
#[derive(Debug, Clone)]
pub struct RowMapper {
    cipher: FieldCipher,
    compression_level: i32,
}

impl RowMapper {
    pub fn new(cipher: FieldCipher, compression_level: i32) -> Self {
        Self {
            cipher,
            compression_level,
        }
    }

    pub fn cipher(&self) -> &FieldCipher {
        &self.cipher
    }

    // ------------------------------------------------------------------
    // Sealing (write path)
    // ------------------------------------------------------------------

    /// Encrypt a short text field.
    fn seal_text(&self, plaintext: &str) -> Result<String> {
        Ok(self.cipher.encrypt_field(plaintext)?)
    }

    /// Compress (when beneficial) then encrypt a serialized JSON blob.
    fn seal_blob(&self, json: &str) -> Result<String> {
        let encoded = codec::encode_blob(json, self.compression_level);
        Ok(self.cipher.encrypt_field(&encoded)?)
    }

    // ------------------------------------------------------------------
    // Opening (read path)
    // ------------------------------------------------------------------

    /// Decrypt and decompress a stored field, probing for markers.
    ///
    /// Decryption failure yields `None` plus a warning; a corrupt
    /// compressed blob falls back to the decrypted-but-undecoded value.
    fn open(&self, stored: &str, column: &str, warnings: &mut Vec<String>) -> Option<String> {
        let decrypted = match self.cipher.decrypt_field(stored) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(column, error = %e, "field decryption failed");
                warnings.push(format!("could not decrypt {column}: {e}"));
                return None;
            }
        };

        match codec::decode_blob(&decrypted) {
            Some(d) => Some(d),
            None => {
                tracing::warn!(column, "corrupt compressed blob, using raw value");
                warnings.push(format!("corrupt compressed blob in {column}"));
                Some(decrypted)
            }
        }
    }

    fn open_json<T: DeserializeOwned>(
        &self,
        stored: Option<&str>,
        column: &str,
        warnings: &mut Vec<String>,
    ) -> Option<T> {
        let opened = self.open(stored?, column, warnings)?;
        match serde_json::from_str(&opened) {
            Ok(v) => Some(v),
            Err(e) => {
                warnings.push(format!("unreadable JSON in {column}: {e}"));
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Chats
    // ------------------------------------------------------------------

    pub fn chat_to_row(&self, chat: &ArchivedChat) -> Result<ArchivedChatRow> {
        let archive_reason = chat
            .metadata
            .reason
            .as_deref()
            .map(|r| self.seal_text(r))
            .transpose()?;

        let metadata_json = self.seal_blob(&serde_json::to_string(&chat.metadata)?)?;

        let compression_info_json = chat
            .compression_info
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let custom_data_json = chat
            .custom_data
            .as_ref()
            .map(|d| -> Result<String> { self.seal_blob(&serde_json::to_string(d)?) })
            .transpose()?;

        Ok(ArchivedChatRow {
            archive_id: chat.archive_id.clone(),
            original_chat_id: chat.original_chat_id.clone(),
            contact_name: chat.contact_name.clone(),
            contact_public_key: chat.contact_public_key.clone(),
            archived_at: chat.archived_at.timestamp_millis(),
            last_message_time: chat.last_message_time.map(|t| t.timestamp_millis()),
            message_count: chat.message_count as i64,
            archive_reason,
            estimated_size: chat.estimated_size as i64,
            is_compressed: chat.is_compressed,
            compression_ratio: chat.compression_info.as_ref().map(|c| c.ratio),
            metadata_json,
            compression_info_json,
            custom_data_json,
        })
    }

    /// Rebuild a chat from its row and (already decoded) message rows.
    ///
    /// When the archive is whole-compressed and no message rows exist, the
    /// message list is recovered from the blob in `custom_data`.
    pub fn chat_from_row(
        &self,
        row: ArchivedChatRow,
        messages: Vec<ArchivedMessage>,
    ) -> Decoded<ArchivedChat> {
        let mut warnings = Vec::new();

        let metadata: ChatArchiveMetadata = self
            .open_json(Some(row.metadata_json.as_str()), "metadata_json", &mut warnings)
            .unwrap_or_default();

        let compression_info: Option<CompressionInfo> = row
            .compression_info_json
            .as_deref()
            .and_then(|j| match serde_json::from_str(j) {
                Ok(v) => Some(v),
                Err(e) => {
                    warnings.push(format!("unreadable JSON in compression_info_json: {e}"));
                    None
                }
            });

        let custom_data: Option<serde_json::Map<String, serde_json::Value>> =
            self.open_json(row.custom_data_json.as_deref(), "custom_data_json", &mut warnings);

        let mut messages = messages;
        if messages.is_empty() && row.is_compressed {
            match self.unpack_compressed_messages(custom_data.as_ref(), &compression_info) {
                Some(recovered) => messages = recovered,
                None => warnings.push(format!(
                    "could not recover compressed messages for archive {}",
                    row.archive_id
                )),
            }
        }

        Decoded {
            value: ArchivedChat {
                archive_id: row.archive_id,
                original_chat_id: row.original_chat_id,
                contact_name: row.contact_name,
                contact_public_key: row.contact_public_key,
                archived_at: millis_to_utc(row.archived_at),
                last_message_time: row.last_message_time.map(millis_to_utc),
                message_count: row.message_count.max(0) as usize,
                estimated_size: row.estimated_size.max(0) as u64,
                is_compressed: row.is_compressed,
                compression_info,
                metadata,
                custom_data,
                messages,
            },
            warnings,
        }
    }

    fn unpack_compressed_messages(
        &self,
        custom_data: Option<&serde_json::Map<String, serde_json::Value>>,
        compression_info: &Option<CompressionInfo>,
    ) -> Option<Vec<ArchivedMessage>> {
        let blob = custom_data?
            .get(CUSTOM_KEY_COMPRESSED_MESSAGES)?
            .as_str()?;
        let hint = compression_info.as_ref().map(|c| c.original_size as usize);
        let bytes = codec::decode_marked_bytes(blob, hint)?;
        serde_json::from_slice(&bytes).ok()
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    pub fn message_to_row(&self, msg: &ArchivedMessage) -> Result<ArchivedMessageRow> {
        let original_content = msg
            .original_content
            .as_deref()
            .map(|c| self.seal_text(c))
            .transpose()?;

        let metadata_json = msg
            .metadata
            .as_ref()
            .map(|m| -> Result<String> { self.seal_blob(&serde_json::to_string(m)?) })
            .transpose()?;

        let delivery_receipt_json = msg
            .delivery_receipt
            .as_ref()
            .map(|r| -> Result<String> { self.seal_blob(&serde_json::to_string(r)?) })
            .transpose()?;

        let read_receipt_json = msg
            .read_receipt
            .as_ref()
            .map(|r| -> Result<String> { self.seal_blob(&serde_json::to_string(r)?) })
            .transpose()?;

        let reactions_json = if msg.reactions.is_empty() {
            None
        } else {
            Some(self.seal_blob(&serde_json::to_string(&msg.reactions)?)?)
        };

        let attachments_json = if msg.attachments.is_empty() {
            None
        } else {
            Some(self.seal_blob(&serde_json::to_string(&msg.attachments)?)?)
        };

        // Wire-crypto metadata stays in the clear.
        let encryption_info_json = msg
            .encryption_info
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let archive_metadata_json = self.seal_blob(&serde_json::to_string(&msg.archive_metadata)?)?;

        let preserved_state_json = msg
            .preserved_state
            .as_ref()
            .map(|s| -> Result<String> { self.seal_blob(&serde_json::to_string(s)?) })
            .transpose()?;

        Ok(ArchivedMessageRow {
            id: format!("{}:{}", msg.archive_id, msg.id),
            archive_id: msg.archive_id.clone(),
            original_message_id: msg.id.clone(),
            chat_id: msg.chat_id.clone(),
            content: self.seal_text(&msg.content)?,
            timestamp: msg.timestamp.timestamp_millis(),
            is_from_me: msg.is_from_me,
            status: msg.status.as_str().to_string(),
            reply_to_message_id: msg.reply_to_message_id.clone(),
            thread_id: msg.thread_id.clone(),
            is_starred: msg.is_starred,
            is_forwarded: msg.is_forwarded,
            priority: msg.priority.as_str().to_string(),
            edited_at: msg.edited_at.map(|t| t.timestamp_millis()),
            original_content,
            has_media: msg.has_media,
            media_type: msg.media_type.clone(),
            archived_at: msg.archived_at.timestamp_millis(),
            original_timestamp: msg.original_timestamp.timestamp_millis(),
            metadata_json,
            delivery_receipt_json,
            read_receipt_json,
            reactions_json,
            attachments_json,
            encryption_info_json,
            archive_metadata_json,
            preserved_state_json,
            searchable_text: msg.searchable_text.clone(),
        })
    }

    pub fn message_from_row(&self, row: ArchivedMessageRow) -> Decoded<ArchivedMessage> {
        let mut warnings = Vec::new();

        let content = self
            .open(&row.content, "content", &mut warnings)
            .unwrap_or_else(|| "[contenu indéchiffrable]".to_string());

        let original_content = row
            .original_content
            .as_deref()
            .and_then(|c| self.open(c, "original_content", &mut warnings));

        let metadata =
            self.open_json(row.metadata_json.as_deref(), "metadata_json", &mut warnings);
        let delivery_receipt = self.open_json(
            row.delivery_receipt_json.as_deref(),
            "delivery_receipt_json",
            &mut warnings,
        );
        let read_receipt = self.open_json(
            row.read_receipt_json.as_deref(),
            "read_receipt_json",
            &mut warnings,
        );
        let reactions = self
            .open_json(row.reactions_json.as_deref(), "reactions_json", &mut warnings)
            .unwrap_or_default();
        let attachments = self
            .open_json(
                row.attachments_json.as_deref(),
                "attachments_json",
                &mut warnings,
            )
            .unwrap_or_default();

        let encryption_info = row
            .encryption_info_json
            .as_deref()
            .and_then(|j| serde_json::from_str(j).ok());

        let archive_metadata: MessageArchiveMetadata = self
            .open_json(
                Some(row.archive_metadata_json.as_str()),
                "archive_metadata_json",
                &mut warnings,
            )
            .unwrap_or(MessageArchiveMetadata {
                archive_version: 0,
                preservation_level: Default::default(),
                indexing_status: Default::default(),
                compression_applied: false,
                original_size: 0,
            });

        let preserved_state = self.open_json(
            row.preserved_state_json.as_deref(),
            "preserved_state_json",
            &mut warnings,
        );

        Decoded {
            value: ArchivedMessage {
                id: row.original_message_id,
                archive_id: row.archive_id,
                chat_id: row.chat_id,
                content,
                timestamp: millis_to_utc(row.timestamp),
                is_from_me: row.is_from_me,
                status: MessageStatus::parse(&row.status),
                reply_to_message_id: row.reply_to_message_id,
                thread_id: row.thread_id,
                is_starred: row.is_starred,
                is_forwarded: row.is_forwarded,
                priority: MessagePriority::parse(&row.priority),
                edited_at: row.edited_at.map(millis_to_utc),
                original_content,
                reactions,
                attachments,
                delivery_receipt,
                read_receipt,
                encryption_info,
                has_media: row.has_media,
                media_type: row.media_type,
                metadata,
                archived_at: millis_to_utc(row.archived_at),
                original_timestamp: millis_to_utc(row.original_timestamp),
                archive_metadata,
                searchable_text: row.searchable_text,
                preserved_state,
            },
            warnings,
        }
    }
}
