//! Mirrored image payloads.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Result;

/// Binary asset with the response headers it was served with.
///
/// Stored as one JSON envelope so the body and its headers are written
/// under a single key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageBlob {
    /// Origin URI the asset was fetched from
    pub source: String,

    /// Response headers in the order received
    pub headers: Vec<(String, String)>,

    #[serde(serialize_with = "encode_body", deserialize_with = "decode_body")]
    pub body: Vec<u8>,

    pub mirrored_at: DateTime<Utc>,
}

impl ImageBlob {
    pub fn new(source: impl Into<String>, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self {
            source: source.into(),
            headers,
            body,
            mirrored_at: Utc::now(),
        }
    }

    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

fn encode_body<S: Serializer>(body: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(body))
}

fn decode_body<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    STANDARD
        .decode(encoded.as_bytes())
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_preserves_body_and_headers() {
        let blob = ImageBlob::new(
            "https://imgs.xkcd.com/comics/a.png",
            vec![
                ("Content-Type".to_string(), "image/png".to_string()),
                ("Cache-Control".to_string(), "max-age=300".to_string()),
            ],
            vec![0x89, b'P', b'N', b'G', 0, 255],
        );

        let decoded = ImageBlob::decode(&blob.encode().unwrap()).unwrap();
        assert_eq!(decoded, blob);
        assert_eq!(decoded.content_type(), Some("image/png"));
        assert_eq!(decoded.header("cache-control"), Some("max-age=300"));
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        let raw = br#"{"source": "s", "headers": [], "body": "***",
            "mirrored_at": "2024-01-01T00:00:00Z"}"#;
        assert!(ImageBlob::decode(raw).is_err());
    }
}
