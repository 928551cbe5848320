//! # Shared Types Crate
//!
//! Chain entities exchanged between the wire codec, the block-sync
//! subsystem and the node runtime.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: `Block` and friends are defined once, here.
//! - **Hash Identity**: two blocks are the same block iff their header hashes
//!   match; the hash is recomputable from the header fields.

#![warn(missing_docs)]

pub mod entities;

pub use entities::*;
