//! # Application Module
//!
//! Application services orchestrating the domain and outbound ports.

pub mod responder;
pub mod service;

pub use responder::SyncRequestResponder;
pub use service::BlockSyncService;
