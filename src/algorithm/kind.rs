//! Runtime-selected algorithm.
//!
//! [`AlgorithmKind`] is the configuration-level choice of algorithm, and
//! [`AlgorithmState`] the matching tagged union of per-client states. Together
//! they let a limiter pick its algorithm from configuration while the store
//! and sweeper stay algorithm-agnostic.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algorithm::{
    Algorithm, FixedWindow, FixedWindowState, LeakyBucket, LeakyBucketState, SlidingLog,
    SlidingLogState, SlidingWindow, SlidingWindowState, TokenBucket, TokenBucketState,
};
use crate::decision::Decision;
use crate::error::Result;
use crate::quota::Quota;
use crate::storage::SharedStore;

/// Algorithm selected by configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    /// [`TokenBucket`].
    TokenBucket,
    /// [`LeakyBucket`].
    LeakyBucket,
    /// [`FixedWindow`].
    FixedWindow,
    /// [`SlidingLog`].
    SlidingLog,
    /// [`SlidingWindow`], the default for large client populations.
    #[default]
    SlidingWindow,
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-client state of whichever algorithm an [`AlgorithmKind`] selects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum AlgorithmState {
    /// Token bucket state.
    TokenBucket(TokenBucketState),
    /// Leaky bucket state.
    LeakyBucket(LeakyBucketState),
    /// Fixed window state.
    FixedWindow(FixedWindowState),
    /// Sliding log state.
    SlidingLog(SlidingLogState),
    /// Sliding window counter state.
    SlidingWindow(SlidingWindowState),
}

impl Algorithm for AlgorithmKind {
    type State = AlgorithmState;

    fn name(&self) -> &'static str {
        match self {
            Self::TokenBucket => TokenBucket.name(),
            Self::LeakyBucket => LeakyBucket.name(),
            Self::FixedWindow => FixedWindow.name(),
            Self::SlidingLog => SlidingLog.name(),
            Self::SlidingWindow => SlidingWindow.name(),
        }
    }

    fn initial_state(&self, quota: &Quota, now: u64) -> AlgorithmState {
        match self {
            Self::TokenBucket => AlgorithmState::TokenBucket(TokenBucket.initial_state(quota, now)),
            Self::LeakyBucket => AlgorithmState::LeakyBucket(LeakyBucket.initial_state(quota, now)),
            Self::FixedWindow => AlgorithmState::FixedWindow(FixedWindow.initial_state(quota, now)),
            Self::SlidingLog => AlgorithmState::SlidingLog(SlidingLog.initial_state(quota, now)),
            Self::SlidingWindow => {
                AlgorithmState::SlidingWindow(SlidingWindow.initial_state(quota, now))
            }
        }
    }

    fn decide(&self, state: &mut AlgorithmState, quota: &Quota, now: u64, cost: u64) -> Decision {
        match (self, state) {
            (Self::TokenBucket, AlgorithmState::TokenBucket(s)) => TokenBucket.decide(s, quota, now, cost),
            (Self::LeakyBucket, AlgorithmState::LeakyBucket(s)) => LeakyBucket.decide(s, quota, now, cost),
            (Self::FixedWindow, AlgorithmState::FixedWindow(s)) => FixedWindow.decide(s, quota, now, cost),
            (Self::SlidingLog, AlgorithmState::SlidingLog(s)) => SlidingLog.decide(s, quota, now, cost),
            (Self::SlidingWindow, AlgorithmState::SlidingWindow(s)) => {
                SlidingWindow.decide(s, quota, now, cost)
            }
            (kind, state) => {
                // State written by another algorithm carries no meaning here.
                tracing::debug!(algorithm = kind.name(), "replacing state of a different algorithm");
                *state = kind.initial_state(quota, now);
                kind.decide(state, quota, now, cost)
            }
        }
    }

    fn horizon(&self, quota: &Quota) -> Duration {
        match self {
            Self::TokenBucket => TokenBucket.horizon(quota),
            Self::LeakyBucket => LeakyBucket.horizon(quota),
            Self::FixedWindow => FixedWindow.horizon(quota),
            Self::SlidingLog => SlidingLog.horizon(quota),
            Self::SlidingWindow => SlidingWindow.horizon(quota),
        }
    }

    async fn decide_shared<S: SharedStore>(
        &self,
        store: &S,
        key: &str,
        quota: &Quota,
        now: u64,
        cost: u64,
    ) -> Result<Decision> {
        match self {
            Self::TokenBucket => TokenBucket.decide_shared(store, key, quota, now, cost).await,
            Self::LeakyBucket => LeakyBucket.decide_shared(store, key, quota, now, cost).await,
            Self::FixedWindow => FixedWindow.decide_shared(store, key, quota, now, cost).await,
            Self::SlidingLog => SlidingLog.decide_shared(store, key, quota, now, cost).await,
            Self::SlidingWindow => SlidingWindow.decide_shared(store, key, quota, now, cost).await,
        }
    }
}
