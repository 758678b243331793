//! Sliding Log rate limiting algorithm.
//!
//! The Sliding Log algorithm stores timestamps of all admitted requests within
//! the window, providing exact enforcement over every trailing window at the
//! cost of memory proportional to the capacity.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algorithm::{Algorithm, elapsed_since};
use crate::decision::{Decision, RateLimitInfo};
use crate::quota::Quota;

/// Sliding log state of one client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlidingLogState {
    /// Admission times inside the trailing window, oldest first. A call of
    /// cost `n` is recorded as `n` equal timestamps.
    pub timestamps: VecDeque<u64>,
}

/// Sliding Log rate limiting algorithm.
///
/// Stores timestamp of every request for highest precision.
/// Best for accuracy-critical applications.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlidingLog;

impl SlidingLog {
    /// Create a new Sliding Log algorithm instance.
    pub fn new() -> Self {
        Self
    }

    /// Drop every timestamp older than `now - window`.
    fn prune(&self, timestamps: &mut VecDeque<u64>, now: u64, window: u64) {
        let cutoff = now.saturating_sub(window);
        while timestamps.front().is_some_and(|&ts| ts < cutoff) {
            timestamps.pop_front();
        }
    }
}

impl Algorithm for SlidingLog {
    type State = SlidingLogState;

    fn name(&self) -> &'static str {
        "sliding_log"
    }

    fn initial_state(&self, _quota: &Quota, _now: u64) -> SlidingLogState {
        SlidingLogState::default()
    }

    fn decide(&self, state: &mut SlidingLogState, quota: &Quota, now: u64, cost: u64) -> Decision {
        let window = quota.window_nanos();
        let limit = quota.capacity();

        // Timestamps must stay ascending even if the clock steps back.
        let now = match state.timestamps.back() {
            Some(&newest) => newest + elapsed_since(self.name(), newest, now),
            None => now,
        };

        self.prune(&mut state.timestamps, now, window);
        let current_count = state.timestamps.len() as u64;

        if current_count + cost <= limit {
            state.timestamps.extend(std::iter::repeat_n(now, cost as usize));

            let reset = Duration::from_nanos(window + 1);
            let info = RateLimitInfo::new(limit, limit - current_count - cost, reset)
                .with_algorithm("sliding_log");

            Decision::allowed(info)
        } else {
            // The oldest entries must expire until `cost` slots are free.
            let must_expire = (current_count + cost - limit) as usize;
            let pivot = state.timestamps[must_expire - 1];
            let retry = Duration::from_nanos(pivot + window + 1 - now);

            let newest = state.timestamps.back().copied().unwrap_or(now);
            let reset = Duration::from_nanos(newest + window + 1 - now);

            let info = RateLimitInfo::new(limit, limit.saturating_sub(current_count), reset)
                .with_algorithm("sliding_log")
                .with_retry_after(retry);

            Decision::denied(info)
        }
    }

    fn horizon(&self, quota: &Quota) -> Duration {
        quota.window()
    }
}
