//! # Sync Payloads
//!
//! JSON bodies carried by block-sync packets and the builders that wrap
//! them into [`Packet`]s.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared_types::{Block, Hash};

use crate::error::WireError;
use crate::packet::{MessageType, Packet};

/// Body of a [`MessageType::SyncBlockRequest`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncBlockRequest {
    /// Hash of the block the requester already has; the responder sends the
    /// block whose parent is this hash. All-zero means "from genesis".
    #[serde(with = "hex_hash")]
    pub after_hash: Hash,
}

impl SyncBlockRequest {
    /// Parse the request carried by `packet`.
    pub fn from_packet(packet: &Packet) -> Result<Self, WireError> {
        packet.expect_type(MessageType::SyncBlockRequest)?;
        decode_json(&packet.body)
    }
}

/// Serialize `value` as a JSON body.
pub fn encode_json<T: Serialize>(value: &T) -> Result<Bytes, WireError> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

/// Deserialize a JSON body.
pub fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, WireError> {
    Ok(serde_json::from_slice(body)?)
}

/// Decode a sync response body. An empty body and JSON `null` both mean
/// "the responder has no block after the requested hash".
pub fn decode_optional_block(body: &[u8]) -> Result<Option<Block>, WireError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    decode_json(body)
}

impl Packet {
    /// Ask peers for the block following `after_hash`.
    pub fn sync_block_request(after_hash: Hash, response_id: i64) -> Result<Self, WireError> {
        let body = encode_json(&SyncBlockRequest { after_hash })?;
        Ok(Packet::new(MessageType::SyncBlockRequest, response_id, body))
    }

    /// Answer a sync request; `None` encodes as JSON `null`.
    pub fn sync_block_response(response_id: i64, block: Option<&Block>) -> Result<Self, WireError> {
        let body = encode_json(&block)?;
        Ok(Packet::new(MessageType::SyncBlockResponse, response_id, body))
    }
}

mod hex_hash {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use shared_types::Hash;

    pub fn serialize<S: Serializer>(hash: &Hash, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(hash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash, D::Error> {
        let text = String::deserialize(deserializer)?;
        let bytes = hex::decode(&text).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|v: Vec<u8>| D::Error::custom(format!("hash must be 32 bytes, got {}", v.len())))
    }
}
