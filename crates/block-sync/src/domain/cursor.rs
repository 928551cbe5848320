//! # Sync Cursor
//!
//! The block currently being synchronized, plus the duplicate/stale guard
//! that decides whether an incoming response may replace it.
//!
//! ## Guard Rules
//!
//! A non-null response is dropped when any of these hold:
//!
//! | Rule                 | Condition                                          |
//! |----------------------|----------------------------------------------------|
//! | Duplicate            | same hash as the cursor                            |
//! | Stale against cursor | cursor set and `body.ts <= cursor.ts`              |
//! | Duplicate            | cursor empty, same hash as the last admitted block |
//! | Stale against cursor | cursor empty, `body.ts <=` last admitted timestamp |
//! | Stale against tip    | cursor empty, tip exists and `body.ts <= tip.ts`   |
//!
//! Null responses always pass and clear the cursor, but the last admitted
//! block is remembered until it is released. A copy of a block that is still
//! being checked or committed is therefore dropped even after a null.
//! The caller runs `admit` inside one critical section so that only the
//! newest unseen block proceeds.

use shared_types::{Block, Hash};
use std::fmt;

use super::value_objects::SyncState;

/// Why the guard dropped a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardRejection {
    /// The cursor already holds this block.
    Duplicate,
    /// Not newer than the cursor.
    StaleAgainstCursor,
    /// Not newer than the committed tip.
    StaleAgainstTip,
}

impl fmt::Display for GuardRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardRejection::Duplicate => write!(f, "duplicate of cursor"),
            GuardRejection::StaleAgainstCursor => write!(f, "not newer than cursor"),
            GuardRejection::StaleAgainstTip => write!(f, "not newer than chain tip"),
        }
    }
}

/// Newest block ever admitted. Only moves forward.
#[derive(Clone, Copy, Debug)]
struct HighWater {
    hash: Hash,
    timestamp: u64,
    rejected: bool,
}

/// Controller cursor.
#[derive(Clone, Debug)]
pub struct SyncCursor {
    current: Option<Block>,
    state: SyncState,
    high_water: Option<HighWater>,
}

impl Default for SyncCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncCursor {
    /// Empty cursor in [`SyncState::Idle`].
    pub fn new() -> Self {
        Self {
            current: None,
            state: SyncState::Idle,
            high_water: None,
        }
    }

    /// Run the guard without changing anything.
    pub fn check(&self, body: Option<&Block>, tip: Option<&Block>) -> Result<(), GuardRejection> {
        let Some(body) = body else {
            return Ok(());
        };

        match (&self.current, tip) {
            (Some(current), _) if current.same_block(body) => Err(GuardRejection::Duplicate),
            (Some(current), _) if body.timestamp() <= current.timestamp() => {
                Err(GuardRejection::StaleAgainstCursor)
            }
            (Some(_), _) => Ok(()),
            (None, tip) => {
                if let Some(mark) = &self.high_water {
                    if mark.hash == body.hash() {
                        return Err(GuardRejection::Duplicate);
                    }
                    if body.timestamp() <= mark.timestamp {
                        return Err(GuardRejection::StaleAgainstCursor);
                    }
                }
                match tip {
                    Some(tip) if body.timestamp() <= tip.timestamp() => {
                        Err(GuardRejection::StaleAgainstTip)
                    }
                    _ => Ok(()),
                }
            }
        }
    }

    /// Guard, then assign `body` (possibly null) as the new cursor.
    pub fn admit(&mut self, body: Option<&Block>, tip: Option<&Block>) -> Result<(), GuardRejection> {
        self.check(body, tip)?;
        match body {
            Some(block) => {
                self.high_water = Some(HighWater {
                    hash: block.hash(),
                    timestamp: block.timestamp(),
                    rejected: false,
                });
                self.current = Some(block.clone());
                self.state = SyncState::Syncing;
            }
            None => {
                self.current = None;
                self.state = SyncState::Confirming;
            }
        }
        Ok(())
    }

    /// Record that the block with `hash` failed after admission. Ignored if
    /// a newer block has been admitted since.
    pub fn mark_rejected(&mut self, hash: &Hash) {
        if let Some(mark) = self.high_water.as_mut().filter(|m| &m.hash == hash) {
            mark.rejected = true;
        }
    }

    /// Forget a block that failed after admission, so that it or an older
    /// replacement can be admitted again. Returns true if it did.
    pub fn release_rejected(&mut self) -> bool {
        let Some(mark) = self.high_water.filter(|m| m.rejected) else {
            return false;
        };
        self.high_water = None;
        if self.current.as_ref().is_some_and(|b| b.hash() == mark.hash) {
            self.current = None;
        }
        if self.current.is_none() {
            self.state = SyncState::Idle;
        }
        true
    }

    /// A quorum round finished; an empty cursor goes back to idle.
    pub fn settle(&mut self) {
        if self.current.is_none() {
            self.state = SyncState::Idle;
        }
    }

    /// The block being synchronized, if any.
    pub fn current(&self) -> Option<&Block> {
        self.current.as_ref()
    }

    /// Current controller state.
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// True if the last admitted block failed after admission.
    pub fn is_rejected(&self) -> bool {
        self.high_water.is_some_and(|m| m.rejected)
    }
}
