//! Fixed Window rate limiting algorithm.
//!
//! Counts requests per aligned window and resets the count when a new window
//! begins. Up to twice the capacity can be admitted around a window boundary
//! (a full quota at the tail of one window and another at the head of the
//! next); that is the accepted price of its simplicity.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algorithm::{Algorithm, align, elapsed_since};
use crate::decision::{Decision, RateLimitInfo};
use crate::error::Result;
use crate::quota::Quota;
use crate::storage::SharedStore;

/// Fixed window state of one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedWindowState {
    /// Start of the current window, aligned to the window length.
    pub window_start: u64,
    /// Units admitted in the current window.
    pub count: u64,
}

/// Fixed Window rate limiting algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedWindow;

impl FixedWindow {
    /// Create a new Fixed Window algorithm instance.
    pub fn new() -> Self {
        Self
    }

    fn build_decision(&self, allowed: bool, count: u64, window_start: u64, quota: &Quota, now: u64) -> Decision {
        let limit = quota.capacity();
        let reset = Duration::from_nanos((window_start + quota.window_nanos()).saturating_sub(now));
        let info = RateLimitInfo::new(limit, limit.saturating_sub(count), reset)
            .with_algorithm("fixed_window");

        if allowed {
            Decision::allowed(info)
        } else {
            Decision::denied(info.with_retry_after(reset))
        }
    }
}

impl Algorithm for FixedWindow {
    type State = FixedWindowState;

    fn name(&self) -> &'static str {
        "fixed_window"
    }

    fn initial_state(&self, quota: &Quota, now: u64) -> FixedWindowState {
        FixedWindowState {
            window_start: align(now, quota.window_nanos()),
            count: 0,
        }
    }

    fn decide(&self, state: &mut FixedWindowState, quota: &Quota, now: u64, cost: u64) -> Decision {
        let window_start = align(now, quota.window_nanos());

        if window_start > state.window_start {
            state.window_start = window_start;
            state.count = 0;
        }
        // A reading from an earlier window stays in the current one.
        let now = state.window_start + elapsed_since(self.name(), state.window_start, now);

        let allowed = state.count + cost <= quota.capacity();
        if allowed {
            state.count += cost;
        }
        self.build_decision(allowed, state.count, state.window_start, quota, now)
    }

    fn horizon(&self, quota: &Quota) -> Duration {
        quota.window()
    }

    /// Uses the store's increment primitive. Rejected calls are still
    /// counted by the store, which only affects later calls in the same
    /// window once the quota is already exceeded.
    async fn decide_shared<S: SharedStore>(
        &self,
        store: &S,
        key: &str,
        quota: &Quota,
        now: u64,
        cost: u64,
    ) -> Result<Decision> {
        let window_start = align(now, quota.window_nanos());
        let count = store
            .increment_and_get(key, cost, window_start, quota.window())
            .await?;

        let allowed = count <= quota.capacity();
        Ok(self.build_decision(allowed, count, window_start, quota, now))
    }
}
