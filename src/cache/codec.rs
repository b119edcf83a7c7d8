//! Stored payload format.
//!
//! A cached value is the response body text, or the literal `null` marking
//! a remembered failure. A codec may compress it on the way in; `Zstd`
//! base64-encodes the compressed bytes so the stored value stays ASCII.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Deserialize;
use serde_json::Value as Json;

use crate::infra::error::InfraError;

const ZSTD_LEVEL: i32 = 3;

/// Marker stored in place of a payload when a failed response is cached.
pub const FAIL_MARKER: &str = "null";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadCodec {
    #[default]
    Plain,
    Zstd,
}

impl PayloadCodec {
    pub fn compress(self, payload: &str) -> Result<String, InfraError> {
        match self {
            PayloadCodec::Plain => Ok(payload.to_string()),
            PayloadCodec::Zstd => {
                let compressed = zstd::encode_all(payload.as_bytes(), ZSTD_LEVEL)
                    .map_err(|err| InfraError::codec(format!("zstd compression failed: {err}")))?;
                Ok(STANDARD.encode(compressed))
            }
        }
    }

    pub fn decompress(self, stored: &str) -> Result<String, InfraError> {
        match self {
            PayloadCodec::Plain => Ok(stored.to_string()),
            PayloadCodec::Zstd => {
                let compressed = STANDARD
                    .decode(stored)
                    .map_err(|err| InfraError::codec(format!("stored payload is not base64: {err}")))?;
                let raw = zstd::decode_all(compressed.as_slice())
                    .map_err(|err| InfraError::codec(format!("zstd decompression failed: {err}")))?;
                String::from_utf8(raw)
                    .map_err(|err| InfraError::codec(format!("payload is not UTF-8: {err}")))
            }
        }
    }
}

/// Parse a stored payload; the fail marker and an empty payload decode to `None`.
pub fn decode_payload(payload: &str) -> Result<Option<Json>, InfraError> {
    if payload.trim().is_empty() {
        return Ok(None);
    }
    let value: Json = serde_json::from_str(payload)
        .map_err(|err| InfraError::codec(format!("stored payload is not JSON: {err}")))?;
    Ok((!value.is_null()).then_some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(codec: PayloadCodec, payload: &str) {
        let stored = codec.compress(payload).expect("compress");
        let restored = codec.decompress(&stored).expect("decompress");
        assert_eq!(restored, payload);
    }

    #[test]
    fn zstd_roundtrips_empty_ascii_and_multibyte() {
        roundtrip(PayloadCodec::Zstd, "");
        roundtrip(PayloadCodec::Zstd, r#"{"sys":{"type":"Entry","id":"nyancat"}}"#);
        roundtrip(PayloadCodec::Zstd, "{\"name\":\"Grüße, 猫, 🐈\"}");
    }

    #[test]
    fn zstd_output_is_ascii() {
        let stored = PayloadCodec::Zstd
            .compress("{\"name\":\"猫\"}")
            .expect("compress");
        assert!(stored.is_ascii());
    }

    #[test]
    fn plain_is_identity() {
        roundtrip(PayloadCodec::Plain, "{\"a\":1}");
        assert_eq!(PayloadCodec::Plain.compress("x").expect("plain"), "x");
    }

    #[test]
    fn corrupt_payload_is_a_codec_error() {
        let err = PayloadCodec::Zstd
            .decompress("not base64 !!")
            .expect_err("corrupt");
        assert!(matches!(err, InfraError::Codec(_)));
    }

    #[test]
    fn fail_marker_and_empty_decode_to_none() {
        assert!(decode_payload(FAIL_MARKER).expect("marker").is_none());
        assert!(decode_payload("").expect("empty").is_none());
        assert!(decode_payload("{\"a\":1}").expect("json").is_some());
        assert!(decode_payload("{oops").is_err());
    }
}
