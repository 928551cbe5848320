//! # Domain Module
//!
//! Core domain types for Block Sync. No I/O: everything here is pure and
//! synchronous, and the application layer supplies the locking.

pub mod cursor;
pub mod errors;
pub mod quorum;
pub mod value_objects;

pub use cursor::*;
pub use errors::*;
pub use quorum::*;
pub use value_objects::*;
