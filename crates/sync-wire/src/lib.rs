//! # Sync Wire Protocol
//!
//! Binary framing between peers of the block-sync protocol.
//!
//! ## Frame Layout
//!
//! ```text
//! offset 0:  1 byte   message type
//! offset 1:  8 bytes  response id (i64, connection byte order)
//! offset 9:  4 bytes  body length (i32, connection byte order)
//! offset 13: N bytes  body (opaque, may be empty)
//! ```
//!
//! Byte order is connection configuration ([`WireConfig`]), never a
//! property of the codec itself.
//!
//! ## Module Structure
//!
//! ```text
//! sync-wire/
//! ├── packet.rs    # Packet, MessageType, HEADER_LENGTH
//! ├── codec.rs     # encode/decode + tokio-util PacketCodec
//! ├── payload.rs   # JSON bodies carried by sync packets
//! ├── config.rs    # WireConfig, ByteOrder
//! └── error.rs     # WireError
//! ```

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod codec;
pub mod config;
pub mod error;
pub mod packet;
pub mod payload;

pub use codec::{decode, encode, encode_into, PacketCodec};
pub use config::{ByteOrder, WireConfig, DEFAULT_MAX_BODY_LEN};
pub use error::WireError;
pub use packet::{MessageType, Packet, HEADER_LENGTH};
pub use payload::{decode_json, decode_optional_block, encode_json, SyncBlockRequest};
