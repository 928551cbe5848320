//! # Wire Configuration
//!
//! Connection-scoped framing settings. Every encode/decode call takes the
//! configuration explicitly.

use serde::{Deserialize, Serialize};

/// Default upper bound on a single packet body (16 MiB).
pub const DEFAULT_MAX_BODY_LEN: usize = 16 * 1024 * 1024;

/// Byte order of the multi-byte header fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    /// Network order.
    #[default]
    Big,
    /// Little-endian.
    Little,
}

/// Framing configuration for one connection or connection group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireConfig {
    /// Byte order of the response id and body length fields.
    pub byte_order: ByteOrder,
    /// Largest body accepted on decode or produced on encode.
    pub max_body_len: usize,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::Big,
            max_body_len: DEFAULT_MAX_BODY_LEN,
        }
    }
}

impl WireConfig {
    /// Default limits with the given byte order.
    pub fn with_byte_order(byte_order: ByteOrder) -> Self {
        Self {
            byte_order,
            ..Self::default()
        }
    }
}
