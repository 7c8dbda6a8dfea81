use super::error::DecodeError;
use base64::{prelude::BASE64_STANDARD, Engine};

pub const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// Extracts the payload of `data:image/<fmt>;base64,<payload>`. Everything
/// up to the first comma is advisory and ignored; a message without a comma
/// is taken as bare base64.
pub fn decode_envelope(message: &str) -> Result<Vec<u8>, DecodeError> {
    let payload = match message.split_once(',') {
        Some((_, payload)) => payload,
        None => message,
    }
    .trim();

    if payload.is_empty() {
        return Err(DecodeError::EmptyPayload);
    }

    Ok(BASE64_STANDARD.decode(payload)?)
}

pub fn encode_data_uri(jpeg: &[u8]) -> String {
    let payload = BASE64_STANDARD.encode(jpeg);
    let mut uri = String::with_capacity(JPEG_DATA_URI_PREFIX.len() + payload.len());
    uri.push_str(JPEG_DATA_URI_PREFIX);
    uri.push_str(&payload);
    uri
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_envelope_with_prefix() {
        let bytes = decode_envelope("data:image/webp;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn test_decode_envelope_without_comma() {
        let bytes = decode_envelope("aGVsbG8=\n").unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn test_decode_envelope_splits_on_first_comma_only() {
        assert!(matches!(
            decode_envelope("data:image/jpeg;base64,aGVs,bG8="),
            Err(DecodeError::Base64(_))
        ));
    }

    #[test]
    fn test_decode_envelope_rejects_empty_payload() {
        assert!(matches!(
            decode_envelope("data:image/jpeg;base64,"),
            Err(DecodeError::EmptyPayload)
        ));
        assert!(matches!(decode_envelope(""), Err(DecodeError::EmptyPayload)));
    }

    #[test]
    fn test_encode_data_uri() {
        assert_eq!(encode_data_uri(b"hello"), "data:image/jpeg;base64,aGVsbG8=");
    }
}
