//! Reversible encoding for the secure tier.
//!
//! The secure copy is standard base64 of the UTF-8 JSON text. It is an
//! obfuscated duplicate, not encryption.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::StorageError;

pub fn encode_secure(raw: &str) -> String {
    STANDARD.encode(raw.as_bytes())
}

pub fn decode_secure(encoded: &str) -> Result<String, StorageError> {
    let bytes = STANDARD.decode(encoded.trim())?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_encoding() {
        assert_eq!(encode_secure("{\"name\":\"Mok\"}"), "eyJuYW1lIjoiTW9rIn0=");
    }

    #[test]
    fn test_non_ascii_payload() {
        let raw = "{\"name\":\"Sîyabonga Trädïng\"}";
        assert_eq!(decode_secure(&encode_secure(raw)).unwrap(), raw);
    }

    #[test]
    fn test_garbage_is_an_encoding_error() {
        assert!(matches!(
            decode_secure("not*base64"),
            Err(StorageError::Encoding(_))
        ));
    }
}
