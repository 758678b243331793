//! Rate limiting algorithm trait and implementations.
//!
//! Every algorithm is pure decision logic: it receives one client's state, the
//! quota, the current time and the cost of the call, mutates the state in
//! place and returns a [`Decision`]. Algorithms never keep per-client data of
//! their own; the store owns all state and serialises access to it.
//!
//! # Available Algorithms
//!
//! - **Token Bucket**: controlled bursts with continuously refilling tokens
//! - **Leaky Bucket**: bounded queue occupancy drained at a constant rate
//! - **Fixed Window**: simple counter per aligned time window
//! - **Sliding Log**: exact, stores one timestamp per admitted unit
//! - **Sliding Window**: weighted sub-window counts, O(1) memory

mod fixed_window;
mod kind;
mod leaky_bucket;
mod sliding_log;
mod sliding_window;
mod token_bucket;

pub use fixed_window::{FixedWindow, FixedWindowState};
pub use kind::{AlgorithmKind, AlgorithmState};
pub use leaky_bucket::{LeakyBucket, LeakyBucketState};
pub use sliding_log::{SlidingLog, SlidingLogState};
pub use sliding_window::{SlidingWindow, SlidingWindowState};
pub use token_bucket::{TokenBucket, TokenBucketState};

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::decision::Decision;
use crate::error::Result;
use crate::quota::Quota;
use crate::storage::SharedStore;

/// Rate limiting algorithm trait.
///
/// Each algorithm provides different trade-offs between accuracy, memory usage,
/// and burst handling. All implementations must be thread-safe.
///
/// # Algorithm Comparison
///
/// | Algorithm | Accuracy | Memory | Burst | Best For |
/// |-----------|----------|--------|-------|----------|
/// | Token Bucket | High | Low | Excellent | Bursty traffic |
/// | Leaky Bucket | High | Low | Bounded | Smooth output |
/// | Fixed Window | Low | Low | 2x at boundaries | Simple use cases |
/// | Sliding Log | Exact | O(capacity) | Good | Precision critical |
/// | Sliding Window | Medium | O(sub-windows) | Good | High-cardinality clients |
pub trait Algorithm: Send + Sync + 'static {
    /// Per-client state owned by the store.
    type State: Clone + Debug + Send + Serialize + DeserializeOwned + 'static;

    /// Get the algorithm name (for logging/metrics).
    fn name(&self) -> &'static str;

    /// State of a client never seen before: full capacity, empty window.
    fn initial_state(&self, quota: &Quota, now: u64) -> Self::State;

    /// Decide one request of `cost` units at time `now` (nanoseconds).
    ///
    /// Callers guarantee `1 <= cost <= quota.capacity()`. The state is
    /// updated in place whatever the verdict.
    fn decide(&self, state: &mut Self::State, quota: &Quota, now: u64, cost: u64) -> Decision;

    /// Longest idle time after which a client's state can no longer differ
    /// from [`Algorithm::initial_state`].
    ///
    /// Retention of idle entries must exceed this, so that evicting a client
    /// is indistinguishable from keeping it.
    fn horizon(&self, quota: &Quota) -> Duration;

    /// Decide against a shared store instead of local state.
    ///
    /// The default runs [`Algorithm::decide`] inside the store's atomic
    /// read-modify-write primitive.
    fn decide_shared<S: SharedStore>(
        &self,
        store: &S,
        key: &str,
        quota: &Quota,
        now: u64,
        cost: u64,
    ) -> impl Future<Output = Result<Decision>> + Send {
        async move {
            store
                .execute_atomic(key, self.horizon(quota), |current: Option<Self::State>| {
                    let mut state = current.unwrap_or_else(|| self.initial_state(quota, now));
                    let decision = self.decide(&mut state, quota, now, cost);
                    (state, decision)
                })
                .await
        }
    }
}

/// Time elapsed from `last` to `now`, clamped to zero when the clock stepped
/// backwards.
pub(crate) fn elapsed_since(algorithm: &'static str, last: u64, now: u64) -> u64 {
    if now < last {
        tracing::warn!(
            target: "ratelimit_engine::clock",
            algorithm,
            last,
            now,
            "clock went backwards, treating elapsed time as zero"
        );
        0
    } else {
        now - last
    }
}

/// Start of the aligned window of length `len` containing `now`.
pub(crate) fn align(now: u64, len: u64) -> u64 {
    (now / len) * len
}
