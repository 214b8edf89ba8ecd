//! Threshold-aware compression codec.
//!
//! Compression is only kept when it actually shrinks the payload;
//! otherwise [`compress`] returns `None` and the caller stores the raw
//! bytes.  Persisted blobs self-describe via the [`COMPRESSED_PREFIX`]
//! marker so readers never need out-of-band knowledge, and corrupt input
//! decodes to `None` so callers can fall back instead of failing.

use base64::Engine as _;

/// Marker distinguishing a compressed blob string from a raw JSON string.
pub const COMPRESSED_PREFIX: &str = "COMPRESSED:";

/// The one algorithm in use.  Recorded in compression info so future
/// readers can tell how a blob was produced.
pub const ALGORITHM: &str = "zstd";

/// Outcome of a successful, beneficial compression.
#[derive(Debug, Clone)]
pub struct Compressed {
    pub data: Vec<u8>,
    pub original_size: usize,
    pub compressed_size: usize,
    /// `compressed_size / original_size`; always < 1.0 when `Some`.
    pub ratio: f64,
}

/// Compress `bytes`, returning `None` when compression is not beneficial
/// (compressed size >= original) or fails.
pub fn compress(bytes: &[u8], level: i32) -> Option<Compressed> {
    if bytes.is_empty() {
        return None;
    }

    let data = zstd::encode_all(bytes, level).ok()?;
    if data.len() >= bytes.len() {
        return None;
    }

    let ratio = data.len() as f64 / bytes.len() as f64;
    Some(Compressed {
        original_size: bytes.len(),
        compressed_size: data.len(),
        data,
        ratio,
    })
}

/// Decompress `bytes`.  Returns `None` on corrupt or undecodable input;
/// callers must treat that as "use the best available fallback", not as a
/// fatal error.
pub fn decompress(bytes: &[u8], original_size_hint: Option<usize>) -> Option<Vec<u8>> {
    match original_size_hint {
        Some(capacity) => zstd::bulk::decompress(bytes, capacity).ok(),
        None => zstd::decode_all(bytes).ok(),
    }
}

/// Encode a text blob for storage: compressed + base64 behind the marker
/// prefix when beneficial, the original text otherwise.
pub fn encode_blob(text: &str, level: i32) -> String {
    match compress(text.as_bytes(), level) {
        Some(c) => format!(
            "{}{}",
            COMPRESSED_PREFIX,
            base64::engine::general_purpose::STANDARD.encode(&c.data)
        ),
        None => text.to_string(),
    }
}

/// Reverse [`encode_blob`].  A string without the marker is returned
/// verbatim (raw or legacy blob).  Returns `None` only for a marked blob
/// that fails to decode.
pub fn decode_blob(stored: &str) -> Option<String> {
    let Some(encoded) = stored.strip_prefix(COMPRESSED_PREFIX) else {
        return Some(stored.to_string());
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .ok()?;
    let raw = decompress(&bytes, None)?;
    String::from_utf8(raw).ok()
}

/// Encode arbitrary bytes into a marked base64 blob string.  Used for the
/// whole-archive message blob, where the marker is mandatory.
pub fn encode_marked_bytes(data: &[u8]) -> String {
    format!(
        "{}{}",
        COMPRESSED_PREFIX,
        base64::engine::general_purpose::STANDARD.encode(data)
    )
}

/// Decode a marked blob back into decompressed bytes.
pub fn decode_marked_bytes(stored: &str, original_size_hint: Option<usize>) -> Option<Vec<u8>> {
    let encoded = stored.strip_prefix(COMPRESSED_PREFIX)?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .ok()?;
    decompress(&bytes, original_size_hint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_round_trip() {
        let payload = "the quick brown fox ".repeat(100);
        let c = compress(payload.as_bytes(), 3).expect("repetitive text should compress");
        assert!(c.compressed_size < c.original_size);
        assert!(c.ratio < 1.0);

        let back = decompress(&c.data, Some(c.original_size)).unwrap();
        assert_eq!(back, payload.as_bytes());

        // Also without the size hint.
        let back = decompress(&c.data, None).unwrap();
        assert_eq!(back, payload.as_bytes());
    }

    #[test]
    fn incompressible_input_returns_none() {
        // Too short for the zstd frame overhead to pay off.
        assert!(compress(b"hi", 3).is_none());
        assert!(compress(b"", 3).is_none());
    }

    #[test]
    fn corrupt_input_decodes_to_none() {
        assert!(decompress(b"definitely not a zstd frame", None).is_none());
    }

    #[test]
    fn blob_round_trip_with_marker() {
        let text = format!("{{\"messages\": \"{}\"}}", "la ".repeat(500));
        let stored = encode_blob(&text, 3);
        assert!(stored.starts_with(COMPRESSED_PREFIX));
        assert_eq!(decode_blob(&stored).unwrap(), text);
    }

    #[test]
    fn small_blob_stored_raw() {
        let stored = encode_blob("{\"a\":1}", 3);
        assert_eq!(stored, "{\"a\":1}");
        assert_eq!(decode_blob(&stored).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn corrupt_marked_blob_is_none() {
        let stored = format!("{}not-base64!!!", COMPRESSED_PREFIX);
        assert!(decode_blob(&stored).is_none());

        // Valid base64, invalid zstd frame.
        let stored = format!(
            "{}{}",
            COMPRESSED_PREFIX,
            base64::engine::general_purpose::STANDARD.encode(b"garbage")
        );
        assert!(decode_blob(&stored).is_none());
    }

    #[test]
    fn marked_bytes_round_trip() {
        let payload = "abcdef ".repeat(200);
        let c = compress(payload.as_bytes(), 3).unwrap();
        let stored = encode_marked_bytes(&c.data);
        let back = decode_marked_bytes(&stored, Some(c.original_size)).unwrap();
        assert_eq!(back, payload.as_bytes());
    }
}
