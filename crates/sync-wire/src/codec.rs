//! # Packet Codec
//!
//! Stateless framing of [`Packet`]s over a byte buffer.
//!
//! Decoding never consumes a partial frame: the header is peeked, and the
//! read position only moves once the whole frame is buffered. A `None`
//! result therefore leaves the caller's buffer exactly as it was, so decode
//! can be retried after more bytes arrive.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::config::{ByteOrder, WireConfig};
use crate::error::WireError;
use crate::packet::{Packet, HEADER_LENGTH};

/// Header fields read without advancing the source buffer.
struct RawHeader {
    msg_type: u8,
    response_id: i64,
    body_len: i32,
}

fn peek_header(src: &[u8], order: ByteOrder) -> RawHeader {
    let mut header = &src[..HEADER_LENGTH];
    let msg_type = header.get_u8();
    let (response_id, body_len) = match order {
        ByteOrder::Big => (header.get_i64(), header.get_i32()),
        ByteOrder::Little => (header.get_i64_le(), header.get_i32_le()),
    };
    RawHeader {
        msg_type,
        response_id,
        body_len,
    }
}

/// Decode one packet from the front of `src`.
///
/// # Returns
/// * `Ok(Some(packet))` - a full frame was consumed from `src`
/// * `Ok(None)` - not enough bytes yet; `src` is untouched
/// * `Err` - protocol violation; the connection should be dropped
pub fn decode(
    src: &mut BytesMut,
    config: &WireConfig,
    peer: &str,
) -> Result<Option<Packet>, WireError> {
    if src.len() < HEADER_LENGTH {
        return Ok(None);
    }

    let header = peek_header(src, config.byte_order);

    if header.body_len < 0 {
        return Err(WireError::NegativeBodyLength {
            length: header.body_len,
            peer: peer.to_string(),
        });
    }

    let body_len = header.body_len as usize;
    if body_len > config.max_body_len {
        return Err(WireError::BodyTooLarge {
            length: body_len,
            max: config.max_body_len,
            peer: peer.to_string(),
        });
    }

    let needed = HEADER_LENGTH + body_len;
    if src.len() < needed {
        src.reserve(needed - src.len());
        return Ok(None);
    }

    src.advance(HEADER_LENGTH);
    let body = if body_len == 0 {
        Bytes::new()
    } else {
        src.split_to(body_len).freeze()
    };

    Ok(Some(Packet {
        msg_type: header.msg_type,
        response_id: header.response_id,
        body,
    }))
}

/// Append the wire form of `packet` to `dst`.
///
/// `max_body_len` limits what a peer may send us, not what we send; the only
/// failure is a body too long for the `i32` length field.
pub fn encode_into(
    packet: &Packet,
    config: &WireConfig,
    dst: &mut BytesMut,
) -> Result<(), WireError> {
    let body_len = packet.body.len();
    if body_len > i32::MAX as usize {
        return Err(WireError::BodyTooLarge {
            length: body_len,
            max: i32::MAX as usize,
            peer: "local".to_string(),
        });
    }

    dst.reserve(packet.encoded_len());
    dst.put_u8(packet.msg_type);
    match config.byte_order {
        ByteOrder::Big => {
            dst.put_i64(packet.response_id);
            dst.put_i32(body_len as i32);
        }
        ByteOrder::Little => {
            dst.put_i64_le(packet.response_id);
            dst.put_i32_le(body_len as i32);
        }
    }
    dst.put_slice(&packet.body);
    Ok(())
}

/// Encode `packet` into a buffer of exactly `HEADER_LENGTH + body_len` bytes.
pub fn encode(packet: &Packet, config: &WireConfig) -> Result<Bytes, WireError> {
    let mut buf = BytesMut::with_capacity(packet.encoded_len());
    encode_into(packet, config, &mut buf)?;
    Ok(buf.freeze())
}

/// `tokio-util` codec bound to one connection.
///
/// Carries the connection's [`WireConfig`] and the remote peer label used
/// in protocol error reports.
#[derive(Clone, Debug)]
pub struct PacketCodec {
    config: WireConfig,
    peer: String,
}

impl PacketCodec {
    /// Codec for the connection to `peer`.
    pub fn new(config: WireConfig, peer: impl Into<String>) -> Self {
        Self {
            config,
            peer: peer.into(),
        }
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, WireError> {
        decode(src, &self.config, &self.peer).inspect_err(|e| {
            warn!("[wire] Dropping frame from {}: {}", self.peer, e);
        })
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = WireError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), WireError> {
        encode_into(&item, &self.config, dst)
    }
}
