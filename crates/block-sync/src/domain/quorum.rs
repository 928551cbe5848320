//! # Quorum Tracker
//!
//! Generic BFT vote accumulator. Peers report a value (for block sync, their
//! view of the chain tip); once one equivalence class of reports reaches the
//! threshold `T = (2N+1)/3` the round is agreed.
//!
//! ## Round Lifecycle
//!
//! ```text
//!   start_round()
//!        │
//!        ▼
//!    ┌────────┐  bucket >= T        ┌────────┐
//!    │Pending │────────────────────▶│ Agreed │
//!    └────────┘                     └────────┘
//!        │ no bucket can reach T
//!        │ or timeout elapsed       ┌────────┐
//!        └─────────────────────────▶│ Failed │
//!                                   └────────┘
//! ```
//!
//! Agreed and Failed are terminal: later events in the same round are
//! ignored and the observer is notified exactly once per round.

use shared_types::{Block, NodeId};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Decides whether two reported values are the same for voting purposes.
pub trait Equivalence<V>: Send + Sync {
    /// True if `a` and `b` count toward the same bucket.
    fn equivalent(&self, a: &V, b: &V) -> bool;
}

impl<V, F> Equivalence<V> for F
where
    F: Fn(&V, &V) -> bool + Send + Sync,
{
    fn equivalent(&self, a: &V, b: &V) -> bool {
        self(a, b)
    }
}

/// Blocks are equivalent when their hashes match.
#[derive(Clone, Copy, Debug, Default)]
pub struct SameHash;

impl Equivalence<Block> for SameHash {
    fn equivalent(&self, a: &Block, b: &Block) -> bool {
        a.same_block(b)
    }
}

/// Receives the single terminal outcome of each round.
pub trait QuorumObserver: Send + Sync {
    /// A bucket reached the threshold.
    fn on_agreement(&self, round: u64);

    /// The round can no longer agree.
    fn on_agree_fail(&self, round: u64, reason: FailReason);
}

impl<O: QuorumObserver + ?Sized> QuorumObserver for Arc<O> {
    fn on_agreement(&self, round: u64) {
        (**self).on_agreement(round)
    }

    fn on_agree_fail(&self, round: u64, reason: FailReason) {
        (**self).on_agree_fail(round, reason)
    }
}

/// Why a round failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailReason {
    /// Even if every undecided peer joined the leading bucket it would stay
    /// below the threshold.
    Unreachable,
    /// The round stayed undecided past its deadline.
    TimedOut,
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailReason::Unreachable => write!(f, "quorum unreachable"),
            FailReason::TimedOut => write!(f, "quorum timed out"),
        }
    }
}

/// Terminal outcome of a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Quorum reached.
    Agreed,
    /// Quorum failed.
    Failed(FailReason),
}

/// Snapshot of the current round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundStatus {
    /// Still collecting votes.
    Pending {
        /// Votes counted so far
        votes: usize,
        /// Size of the largest bucket
        leading: usize,
        /// Threshold at the last observation
        threshold: usize,
    },
    /// Quorum reached.
    Agreed,
    /// Quorum failed.
    Failed(FailReason),
}

impl RoundStatus {
    /// True once the round has an outcome.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RoundStatus::Pending { .. })
    }
}

/// Votes needed out of `n` peers: `(2n+1)/3` with truncating division,
/// never less than one.
pub fn quorum_threshold(n: usize) -> usize {
    ((2 * n + 1) / 3).max(1)
}

struct Bucket<V> {
    representative: V,
    count: usize,
}

/// Generic quorum tracker.
///
/// Not internally synchronized; the owner serializes access.
pub struct QuorumTracker<V, E, O> {
    equivalence: E,
    observer: O,
    min_peers: usize,
    timeout: Option<Duration>,
    round: u64,
    buckets: Vec<Bucket<V>>,
    voters: HashSet<NodeId>,
    peers: usize,
    deadline: Option<Instant>,
    outcome: Option<RoundOutcome>,
}

impl<V, E, O> QuorumTracker<V, E, O>
where
    E: Equivalence<V>,
    O: QuorumObserver,
{
    /// Create a tracker with round 0 open.
    pub fn new(equivalence: E, observer: O) -> Self {
        Self {
            equivalence,
            observer,
            min_peers: 1,
            timeout: None,
            round: 0,
            buckets: Vec::new(),
            voters: HashSet::new(),
            peers: 0,
            deadline: None,
            outcome: None,
        }
    }

    /// Never compute the threshold over fewer than `min_peers` peers.
    pub fn with_min_peers(mut self, min_peers: usize) -> Self {
        self.min_peers = min_peers.max(1);
        self
    }

    /// Fail a round that is still pending `timeout` after its first vote.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Close the current round (whatever its state) and open the next one.
    pub fn start_round(&mut self) -> u64 {
        self.round += 1;
        self.buckets.clear();
        self.voters.clear();
        self.peers = 0;
        self.deadline = None;
        self.outcome = None;
        self.round
    }

    /// Count `voter`'s report.
    ///
    /// `None` reports and repeat votes are ignored, as is everything after
    /// the round turns terminal. `active_peers` is the live connection
    /// count at the time of the report.
    pub fn receive_event(
        &mut self,
        voter: &NodeId,
        value: Option<V>,
        active_peers: usize,
    ) -> RoundStatus {
        if self.outcome.is_some() {
            return self.status();
        }
        let Some(value) = value else {
            return self.status();
        };
        if !self.voters.insert(voter.clone()) {
            return self.status();
        }

        match self
            .buckets
            .iter_mut()
            .find(|b| self.equivalence.equivalent(&b.representative, &value))
        {
            Some(bucket) => bucket.count += 1,
            None => self.buckets.push(Bucket {
                representative: value,
                count: 1,
            }),
        }

        if self.deadline.is_none() {
            self.deadline = self.timeout.map(|t| Instant::now() + t);
        }

        let votes = self.voters.len();
        self.peers = active_peers.max(votes).max(self.min_peers);
        let threshold = quorum_threshold(self.peers);
        let leading = self.leading();

        if leading >= threshold {
            self.finish(RoundOutcome::Agreed);
        } else if leading + (self.peers - votes) < threshold {
            self.finish(RoundOutcome::Failed(FailReason::Unreachable));
        }

        self.status()
    }

    /// Fail the round if its deadline has passed by `now`.
    pub fn poll_timeout(&mut self, now: Instant) -> RoundStatus {
        if self.outcome.is_none() && self.deadline.is_some_and(|d| now >= d) {
            self.finish(RoundOutcome::Failed(FailReason::TimedOut));
        }
        self.status()
    }

    /// Current round snapshot.
    pub fn status(&self) -> RoundStatus {
        match self.outcome {
            Some(RoundOutcome::Agreed) => RoundStatus::Agreed,
            Some(RoundOutcome::Failed(reason)) => RoundStatus::Failed(reason),
            None => RoundStatus::Pending {
                votes: self.voters.len(),
                leading: self.leading(),
                threshold: self.threshold(),
            },
        }
    }

    /// Threshold for the N seen at the last observation.
    pub fn threshold(&self) -> usize {
        quorum_threshold(self.peers.max(self.min_peers))
    }

    /// Current round number.
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Outcome of the current round, if any.
    pub fn outcome(&self) -> Option<RoundOutcome> {
        self.outcome
    }

    fn leading(&self) -> usize {
        self.buckets.iter().map(|b| b.count).max().unwrap_or(0)
    }

    fn finish(&mut self, outcome: RoundOutcome) {
        self.outcome = Some(outcome);
        self.deadline = None;
        match outcome {
            RoundOutcome::Agreed => self.observer.on_agreement(self.round),
            RoundOutcome::Failed(reason) => self.observer.on_agree_fail(self.round, reason),
        }
    }
}
