/// Application name
pub const APP_NAME: &str = "Mémoire";

/// XChaCha20-Poly1305 nonce size in bytes
pub const NONCE_SIZE: usize = 24;

/// Symmetric key size in bytes (for XChaCha20-Poly1305)
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// Poly1305 authentication tag size in bytes
pub const TAG_SIZE: usize = 16;

/// Key derivation contexts (BLAKE3)
pub const KDF_CONTEXT_FIELD_KEY: &str = "memoire-field-key-v1";
pub const KDF_CONTEXT_DB_KEY: &str = "memoire-db-key-v1";
