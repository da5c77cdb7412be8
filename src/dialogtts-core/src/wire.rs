//! Request/response payloads for the synthesis service and their
//! MessagePack encoding.

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::DialogError;

/// Whether the service may reuse a previously prepared reference embedding.
///
/// Sent as the strings `never` / `on-demand`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryCache {
    Never,
    OnDemand,
}

impl MemoryCache {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryCache::Never => "never",
            MemoryCache::OnDemand => "on-demand",
        }
    }

    /// Hint for the turn at 0-based `index` within a role.
    pub fn for_turn(index: usize) -> Self {
        if index == 0 {
            MemoryCache::Never
        } else {
            MemoryCache::OnDemand
        }
    }
}

impl Serialize for MemoryCache {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MemoryCache {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        match value.as_str() {
            "never" => Ok(MemoryCache::Never),
            "on-demand" => Ok(MemoryCache::OnDemand),
            other => Err(de::Error::unknown_variant(other, &["never", "on-demand"])),
        }
    }
}

/// Inline reference audio. Always empty here; voices are selected by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferenceAudio {
    #[serde(with = "bytes")]
    pub audio: Vec<u8>,
    pub text: String,
}

/// Single utterance request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TtsRequest {
    pub text: String,
    pub references: Vec<ReferenceAudio>,
    pub reference_id: String,
    pub normalize: bool,
    pub format: String,
    pub use_memory_cache: MemoryCache,
}

/// All utterances of one role in a single request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TtsBatchRequest {
    pub texts: Vec<String>,
    pub references: Vec<ReferenceAudio>,
    pub reference_id: String,
    pub normalize: bool,
    pub format: String,
}

/// One encoded audio clip inside a batch response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBuffer(pub Vec<u8>);

impl Serialize for AudioBuffer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for AudioBuffer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        bytes::deserialize(deserializer).map(AudioBuffer)
    }
}

/// Body of a successful batch response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TtsBatchResponse {
    #[serde(default)]
    pub audios: Vec<AudioBuffer>,
}

/// Serialization contract with the synthesis service.
pub trait WireCodec: Send + Sync {
    /// Value for the `content-type` header.
    fn content_type(&self) -> &'static str;

    fn encode_single(&self, request: &TtsRequest) -> Result<Vec<u8>, DialogError>;

    fn encode_batch(&self, request: &TtsBatchRequest) -> Result<Vec<u8>, DialogError>;

    /// Audio clips of a batch response, in response order.
    fn decode_batch(&self, body: &[u8]) -> Result<Vec<Vec<u8>>, DialogError>;
}

/// Structs are written as maps keyed by field name.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgpackCodec;

impl WireCodec for MsgpackCodec {
    fn content_type(&self) -> &'static str {
        "application/msgpack"
    }

    fn encode_single(&self, request: &TtsRequest) -> Result<Vec<u8>, DialogError> {
        Ok(rmp_serde::to_vec_named(request)?)
    }

    fn encode_batch(&self, request: &TtsBatchRequest) -> Result<Vec<u8>, DialogError> {
        Ok(rmp_serde::to_vec_named(request)?)
    }

    fn decode_batch(&self, body: &[u8]) -> Result<Vec<Vec<u8>>, DialogError> {
        let response: TtsBatchResponse = rmp_serde::from_slice(body)?;
        Ok(response.audios.into_iter().map(|a| a.0).collect())
    }
}

/// Raw bytes as a MessagePack `bin`, accepting an array of integers on input.
mod bytes {
    use super::*;

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        deserializer.deserialize_byte_buf(BytesVisitor)
    }

    struct BytesVisitor;

    impl<'de> Visitor<'de> for BytesVisitor {
        type Value = Vec<u8>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a byte buffer")
        }

        fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
            Ok(v.to_vec())
        }

        fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
            Ok(v)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(byte) = seq.next_element::<u8>()? {
                out.push(byte);
            }
            Ok(out)
        }
    }
}
