//! Sliding Window rate limiting algorithm.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algorithm::{Algorithm, align, elapsed_since};
use crate::decision::{Decision, RateLimitInfo};
use crate::quota::Quota;

/// Sliding window counter state of one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlidingWindowState {
    /// Start of the current sub-window.
    pub current_window_start: u64,
    /// Units admitted in the current sub-window.
    pub current_count: u64,
    /// Counts of the preceding sub-windows, oldest first. With a single
    /// sub-window this holds exactly the previous window's count.
    pub previous_counts: VecDeque<u64>,
}

impl SlidingWindowState {
    /// Count of the sub-window immediately before the current one.
    pub fn previous_count(&self) -> u64 {
        self.previous_counts.back().copied().unwrap_or(0)
    }
}

/// Sliding Window rate limiting algorithm.
///
/// Uses weighted combination of current and previous windows
/// to eliminate the boundary burst problem. The window can be split into
/// several sub-windows; the oldest one is weighted by how much of it still
/// overlaps the trailing window, the newer ones count fully. More sub-windows
/// approach the exactness of [`SlidingLog`](crate::algorithm::SlidingLog)
/// with memory independent of the capacity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlidingWindow;

impl SlidingWindow {
    /// Create a new Sliding Window algorithm instance.
    pub fn new() -> Self {
        Self
    }

    /// Roll the state forward to the sub-window starting at `window_start`.
    fn shift(&self, state: &mut SlidingWindowState, window_start: u64, sub_window: u64, sub_windows: usize) {
        let steps = (window_start - state.current_window_start) / sub_window;
        // After sub_windows + 1 shifts every slot is zero.
        for _ in 0..steps.min(sub_windows as u64 + 1) {
            state.previous_counts.push_back(state.current_count);
            state.previous_counts.pop_front();
            state.current_count = 0;
        }
        state.current_window_start = window_start;
    }

    /// Calculate weighted count using current and previous sub-windows.
    fn weighted_count(&self, state: &SlidingWindowState, window_progress: f64) -> f64 {
        let oldest = state.previous_counts.front().copied().unwrap_or(0);
        let newer: u64 = state.previous_counts.iter().skip(1).sum();
        oldest as f64 * (1.0 - window_progress) + newer as f64 + state.current_count as f64
    }
}

impl Algorithm for SlidingWindow {
    type State = SlidingWindowState;

    fn name(&self) -> &'static str {
        "sliding_window"
    }

    fn initial_state(&self, quota: &Quota, now: u64) -> SlidingWindowState {
        SlidingWindowState {
            current_window_start: align(now, quota.sub_window_nanos()),
            current_count: 0,
            previous_counts: VecDeque::from(vec![0; quota.sub_windows() as usize]),
        }
    }

    fn decide(&self, state: &mut SlidingWindowState, quota: &Quota, now: u64, cost: u64) -> Decision {
        let limit = quota.capacity();
        let sub_window = quota.sub_window_nanos();
        let sub_windows = quota.sub_windows() as usize;
        state.previous_counts.resize(sub_windows, 0);

        let window_start = align(now, sub_window);
        if window_start > state.current_window_start {
            self.shift(state, window_start, sub_window, sub_windows);
        }
        let elapsed = elapsed_since(self.name(), state.current_window_start, now);

        let window_progress = elapsed as f64 / sub_window as f64;
        let weighted = self.weighted_count(state, window_progress);

        // For cost 1 this is the plain `weighted < limit` test.
        let threshold = (limit + 1).saturating_sub(cost) as f64;
        let until_next = Duration::from_nanos(sub_window - elapsed.min(sub_window - 1));
        let reset = Duration::from_nanos(sub_window * sub_windows as u64) + until_next;

        if weighted < threshold {
            state.current_count += cost;

            let remaining = (limit as f64 - weighted - cost as f64).max(0.0).floor() as u64;
            let info = RateLimitInfo::new(limit, remaining, reset).with_algorithm("sliding_window");

            Decision::allowed(info)
        } else {
            let info = RateLimitInfo::new(limit, (limit as f64 - weighted).max(0.0).floor() as u64, reset)
                .with_algorithm("sliding_window")
                .with_retry_after(self.retry_after(state, threshold, sub_window, elapsed, until_next));

            Decision::denied(info)
        }
    }

    fn horizon(&self, quota: &Quota) -> Duration {
        Duration::from_nanos(quota.sub_window_nanos() * (u64::from(quota.sub_windows()) + 1))
    }
}

impl SlidingWindow {
    /// Earliest time the oldest sub-window decays enough for the call to fit,
    /// or the start of the next sub-window when decay alone cannot help.
    /// A lower bound when the next sub-window is still too full.
    fn retry_after(
        &self,
        state: &SlidingWindowState,
        threshold: f64,
        sub_window: u64,
        elapsed: u64,
        until_next: Duration,
    ) -> Duration {
        let oldest = state.previous_counts.front().copied().unwrap_or(0) as f64;
        let fixed = self.weighted_count(state, 1.0);
        let headroom = threshold - fixed;

        if oldest > 0.0 && headroom > 0.0 {
            let progress_needed = 1.0 - headroom / oldest;
            let at = (progress_needed * sub_window as f64).floor() as u64 + 1;
            Duration::from_nanos(at.saturating_sub(elapsed).max(1))
        } else {
            until_next
        }
    }
}
