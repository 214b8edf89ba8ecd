//! Field-level encryption for text columns.
//!
//! Individual text attributes are encrypted, not whole rows, so metadata
//! needed for listing and sorting stays in the clear.  Encrypted values
//! carry the `enc1:` marker; a value without it is treated as a legacy
//! plaintext row and passed through, so rows written by earlier schema
//! generations still read cleanly.

use base64::Engine as _;

use memoire_shared::crypto::{self, SymmetricKey};
use memoire_shared::CryptoError;

/// Marker prefix on encrypted field values.
pub const FIELD_PREFIX: &str = "enc1:";

/// Encrypts and decrypts individual text fields with XChaCha20-Poly1305.
#[derive(Clone)]
pub struct FieldCipher {
    key: SymmetricKey,
}

impl FieldCipher {
    pub fn new(key: SymmetricKey) -> Self {
        Self { key }
    }

    /// Derive the field key from a user passphrase (BLAKE3, domain
    /// separated).
    pub fn from_passphrase(passphrase: &str) -> Self {
        Self {
            key: crypto::derive_field_key(passphrase.as_bytes()),
        }
    }

    /// Encrypt a field value into its storage form.
    pub fn encrypt_field(&self, plaintext: &str) -> Result<String, CryptoError> {
        let sealed = crypto::encrypt(&self.key, plaintext.as_bytes())?;
        Ok(format!(
            "{}{}",
            FIELD_PREFIX,
            base64::engine::general_purpose::STANDARD.encode(sealed)
        ))
    }

    /// Decrypt a stored field value.
    ///
    /// A value without the `enc1:` marker is returned verbatim (legacy
    /// plaintext row).  A marked value that fails to decode or decrypt
    /// returns an error the caller should handle per field, not per row.
    pub fn decrypt_field(&self, stored: &str) -> Result<String, CryptoError> {
        let Some(encoded) = stored.strip_prefix(FIELD_PREFIX) else {
            return Ok(stored.to_string());
        };

        let sealed = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| CryptoError::DecryptionFailed)?;
        let plain = crypto::decrypt(&self.key, &sealed)?;
        String::from_utf8(plain).map_err(|_| CryptoError::DecryptionFailed)
    }

    /// True if the stored value carries the encryption marker.
    pub fn is_encrypted(stored: &str) -> bool {
        stored.starts_with(FIELD_PREFIX)
    }
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.debug_struct("FieldCipher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> FieldCipher {
        FieldCipher::from_passphrase("correct horse battery staple")
    }

    #[test]
    fn field_round_trip() {
        let c = cipher();
        for plaintext in ["", "salut", "emoji 🗄️ and accents é à ü", "{\"k\":1}"] {
            let stored = c.encrypt_field(plaintext).unwrap();
            assert!(FieldCipher::is_encrypted(&stored));
            assert_eq!(c.decrypt_field(&stored).unwrap(), plaintext);
        }
    }

    #[test]
    fn legacy_plaintext_passes_through() {
        let c = cipher();
        assert_eq!(c.decrypt_field("plain old row").unwrap(), "plain old row");
    }

    #[test]
    fn tampered_field_fails_recoverably() {
        let c = cipher();
        let stored = c.encrypt_field("secret").unwrap();
        let mut bytes = stored.into_bytes();
        let last = bytes.len() - 1;
        // Flip a base64 character.
        bytes[last] = if bytes[last] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();
        assert!(c.decrypt_field(&tampered).is_err());
    }

    #[test]
    fn wrong_passphrase_fails() {
        let stored = cipher().encrypt_field("secret").unwrap();
        let other = FieldCipher::from_passphrase("something else entirely");
        assert!(other.decrypt_field(&stored).is_err());
    }

    #[test]
    fn nonces_differ_between_calls() {
        let c = cipher();
        let a = c.encrypt_field("same input").unwrap();
        let b = c.encrypt_field("same input").unwrap();
        assert_ne!(a, b);
    }
}
