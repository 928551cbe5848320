//! # Packets
//!
//! One framed application message: type tag, response id, opaque body.

use bytes::Bytes;

use crate::error::WireError;

/// Fixed header size: 1 byte type + 8 bytes response id + 4 bytes body length.
pub const HEADER_LENGTH: usize = 1 + 8 + 4;

/// Application message kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Free-form text.
    Text = b'S',
    /// Block announcement.
    Block = b'B',
    /// Transaction announcement.
    Transaction = b'T',
    /// "Send me the block after this hash."
    SyncBlockRequest = 0x10,
    /// The requested block, or `null` when the responder has nothing newer.
    SyncBlockResponse = 0x11,
    /// Keep-alive.
    Heartbeat = 0x20,
}

impl TryFrom<u8> for MessageType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            b'S' => Ok(MessageType::Text),
            b'B' => Ok(MessageType::Block),
            b'T' => Ok(MessageType::Transaction),
            0x10 => Ok(MessageType::SyncBlockRequest),
            0x11 => Ok(MessageType::SyncBlockResponse),
            0x20 => Ok(MessageType::Heartbeat),
            other => Err(WireError::UnknownMessageType(other)),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(t: MessageType) -> u8 {
        t as u8
    }
}

/// A decoded (or to-be-encoded) packet.
///
/// The type tag is kept raw so that frames carrying tags unknown to this
/// node still decode; interpretation happens in [`Packet::message_type`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    /// Raw message type tag.
    pub msg_type: u8,
    /// Correlates a response with the request that caused it.
    pub response_id: i64,
    /// Serialized payload; empty when absent.
    pub body: Bytes,
}

impl Packet {
    /// Build a packet of a known type.
    pub fn new(msg_type: MessageType, response_id: i64, body: impl Into<Bytes>) -> Self {
        Self {
            msg_type: msg_type.into(),
            response_id,
            body: body.into(),
        }
    }

    /// A packet with an empty body.
    pub fn empty(msg_type: MessageType, response_id: i64) -> Self {
        Self::new(msg_type, response_id, Bytes::new())
    }

    /// Keep-alive packet with response id 0.
    pub fn heartbeat() -> Self {
        Self::empty(MessageType::Heartbeat, 0)
    }

    /// Interpret the raw tag. Fails for tags unknown to this node.
    pub fn message_type(&self) -> Result<MessageType, WireError> {
        MessageType::try_from(self.msg_type)
    }

    /// Fail unless the packet carries `expected`.
    pub fn expect_type(&self, expected: MessageType) -> Result<(), WireError> {
        if self.msg_type != u8::from(expected) {
            return Err(WireError::UnexpectedMessageType {
                expected: expected.into(),
                actual: self.msg_type,
            });
        }
        Ok(())
    }

    /// Size of this packet on the wire.
    pub fn encoded_len(&self) -> usize {
        HEADER_LENGTH + self.body.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_length_is_thirteen() {
        assert_eq!(HEADER_LENGTH, 13);
    }

    #[test]
    fn test_message_type_tags() {
        assert_eq!(u8::from(MessageType::Text), b'S');
        assert_eq!(u8::from(MessageType::Block), b'B');
        assert_eq!(u8::from(MessageType::Transaction), b'T');
        assert_eq!(MessageType::try_from(0x11).unwrap(), MessageType::SyncBlockResponse);
        assert!(matches!(
            MessageType::try_from(0xEE),
            Err(WireError::UnknownMessageType(0xEE))
        ));
    }

    #[test]
    fn test_unknown_tag_kept_on_packet() {
        let packet = Packet {
            msg_type: 0xEE,
            response_id: 1,
            body: Bytes::new(),
        };
        assert!(packet.message_type().is_err());
        assert_eq!(packet.encoded_len(), HEADER_LENGTH);
    }

    #[test]
    fn test_expect_type() {
        let packet = Packet::heartbeat();
        assert!(packet.expect_type(MessageType::Heartbeat).is_ok());
        assert!(matches!(
            packet.expect_type(MessageType::SyncBlockRequest),
            Err(WireError::UnexpectedMessageType { expected: 0x10, actual: 0x20 })
        ));
    }
}
