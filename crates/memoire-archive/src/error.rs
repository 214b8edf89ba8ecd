use thiserror::Error;

/// Errors produced by the archival engine.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Field-level encryption or decryption failure.
    #[error("Crypto error: {0}")]
    Crypto(#[from] memoire_shared::CryptoError),

    /// JSON encoding/decoding error on a blob column.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// The live chat to archive does not exist.
    #[error("Chat not found: {0}")]
    ChatNotFound(String),

    /// The requested archive does not exist.
    #[error("Archive not found: {0}")]
    ArchiveNotFound(String),

    /// The chat has no messages, so there is nothing to archive.
    #[error("Chat {0} has no messages to archive")]
    EmptyChat(String),

    /// Restore produced zero messages; the archive is kept.
    #[error("Restore of archive {archive_id} failed: 0 of {attempted} messages saved")]
    RestoreFailed { archive_id: String, attempted: usize },

    /// Transaction, lock, or other storage-layer failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A live-store collaborator reported a failure.
    #[error("Live store error: {0}")]
    LiveStore(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ArchiveError>;
