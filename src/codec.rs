//! Value codecs: how dictionary values become stored blobs and back.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Error type for value encoding and decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Codec error: {0}")]
    Message(String),
}

/// Turns values of type `V` into blobs and back.
///
/// Implementations must round-trip: `decode(encode(v)) == v` for every
/// value the caller can produce.
pub trait Codec<V>: Send + Sync {
    /// Encode a value for storage.
    fn encode(&self, value: &V) -> Result<Vec<u8>, CodecError>;

    /// Decode a stored blob.
    fn decode(&self, bytes: &[u8]) -> Result<V, CodecError>;
}

/// JSON codec for any serde type. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<V> Codec<V> for JsonCodec
where
    V: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &V) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<V, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Identity codec for values that already are bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl Codec<Vec<u8>> for RawCodec {
    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>, CodecError> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        name: String,
        tags: Vec<String>,
        score: Option<f64>,
    }

    fn round_trip<V>(value: V)
    where
        V: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = JsonCodec.encode(&value).unwrap();
        let decoded: V = JsonCodec.decode(&bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_json_round_trip() {
        round_trip("rsvp".repeat(100));
        round_trip(42i64);
        round_trip(vec![1u8, 2, 3]);
        round_trip(BTreeMap::from([("a".to_string(), 1), ("b".to_string(), 2)]));
        round_trip(Record {
            name: "abc".into(),
            tags: vec!["x".into(), "y".into()],
            score: None,
        });
    }

    #[test]
    fn test_json_decode_failure() {
        let result: Result<i64, _> = JsonCodec.decode(b"\"not a number\"");
        assert!(matches!(result, Err(CodecError::Json(_))));
    }

    #[test]
    fn test_raw_codec() {
        let bytes = vec![0u8, 255, 7];
        assert_eq!(RawCodec.encode(&bytes).unwrap(), bytes);
        assert_eq!(RawCodec.decode(&bytes).unwrap(), bytes);
    }
}
