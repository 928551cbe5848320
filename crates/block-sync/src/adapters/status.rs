//! Sync-complete flag backed by an atomic.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::ports::SyncStatus;

/// Process-wide sync flag. Starts unsynced.
#[derive(Debug, Default)]
pub struct AtomicSyncStatus {
    synced: AtomicBool,
}

impl AtomicSyncStatus {
    /// New unsynced flag.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SyncStatus for AtomicSyncStatus {
    fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    fn set_synced(&self, synced: bool) {
        self.synced.store(synced, Ordering::Release);
    }
}
