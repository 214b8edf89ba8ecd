//! # memoire-shared
//!
//! Crypto primitives and shared constants used across the Mémoire
//! workspace.  The archival engine encrypts sensitive text fields with
//! XChaCha20-Poly1305 before they reach durable storage; keys are derived
//! from a passphrase with BLAKE3 using domain-separated contexts.

pub mod constants;
pub mod crypto;

mod error;

pub use error::CryptoError;
