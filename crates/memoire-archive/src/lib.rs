//! # memoire-archive
//!
//! The chat archival engine: moves a conversation (metadata and full
//! message history) out of the live store into a durable, space-efficient,
//! still-searchable, encrypted-at-rest archive, and can later restore or
//! permanently purge it.
//!
//! The engine composes independent components through interfaces:
//!
//! - [`codec`] -- threshold-aware, exactly reversible compression;
//! - [`cipher::FieldCipher`] -- field-level encryption of sensitive text;
//! - [`rows::RowMapper`] -- typed entity ⇄ row conversion;
//! - [`search::SearchIndex`] -- two interchangeable strategies (FTS5
//!   shadow table vs. hand-rolled posting lists);
//! - [`ChatArchiver`] -- the operation surface sequencing the above inside
//!   transactions.
//!
//! A single [`ChatArchiver`] is constructed by the composition root and
//! handed to consumers; the live chat list and message store are consumed
//! through the [`live`] traits.

pub mod archiver;
pub mod cache;
pub mod cipher;
pub mod codec;
pub mod config;
pub mod database;
pub mod live;
pub mod migrations;
pub mod models;
pub mod rows;
pub mod search;
pub mod stats;

mod archives;
mod error;

pub use archiver::ChatArchiver;
pub use cipher::FieldCipher;
pub use config::{ArchiveConfig, SearchStrategyKind};
pub use database::Database;
pub use error::{ArchiveError, Result};
pub use live::{LiveChatStore, LiveMessageStore, MemoryLiveStore, SqliteLiveStore};
pub use models::*;
pub use search::SearchIndex;
