//! # Wire Errors
//!
//! A protocol violation is fatal for the connection it arrived on; the
//! transport closes or resets that connection and nothing else.

use thiserror::Error;

/// Errors raised while framing or unframing packets.
#[derive(Debug, Error)]
pub enum WireError {
    /// The header declared a negative body length.
    #[error("bodyLength [{length}] is not right, remote: {peer}")]
    NegativeBodyLength {
        /// Declared length as read from the header
        length: i32,
        /// Remote peer label
        peer: String,
    },

    /// Body length exceeds the configured limit, or the `i32` length field.
    #[error("body length {length} exceeds maximum {max}, remote: {peer}")]
    BodyTooLarge {
        /// Body length in bytes
        length: usize,
        /// Configured maximum
        max: usize,
        /// Remote peer label
        peer: String,
    },

    /// Message type tag not known to this node.
    #[error("unknown message type: 0x{0:02x}")]
    UnknownMessageType(u8),

    /// Packet carried a different message type than the caller expected.
    #[error("unexpected message type: expected 0x{expected:02x}, got 0x{actual:02x}")]
    UnexpectedMessageType {
        /// Expected tag
        expected: u8,
        /// Tag found on the packet
        actual: u8,
    },

    /// Body could not be (de)serialized.
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// Underlying stream failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_length_message_names_peer() {
        let err = WireError::NegativeBodyLength {
            length: -1,
            peer: "10.0.0.7:9000".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("[-1]"));
        assert!(msg.contains("10.0.0.7:9000"));
    }
}
