//! Leaky Bucket rate limiting algorithm.
//!
//! The bucket models a FIFO queue of fixed capacity drained at a constant
//! rate, like water leaking from a bucket. Only the queue occupancy is kept;
//! dispatching the admitted work at the leak rate is up to the caller.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algorithm::{Algorithm, elapsed_since};
use crate::clock::NANOS_PER_SEC;
use crate::decision::{Decision, RateLimitInfo};
use crate::quota::Quota;

/// Leaky bucket state of one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakyBucketState {
    /// Occupied queue slots, `0 <= queue_length <= capacity`.
    pub queue_length: u64,
    /// Time up to which leaking has been accounted for.
    pub last_leak: u64,
}

/// Leaky Bucket rate limiting algorithm.
///
/// Enforces a constant output rate regardless of input bursts.
/// Requests that would overflow the bucket are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeakyBucket;

impl LeakyBucket {
    /// Create a new Leaky Bucket algorithm instance.
    pub fn new() -> Self {
        Self
    }

    /// Whole slots drained during `elapsed_nanos`.
    fn calculate_leak(&self, elapsed_nanos: u64, leak_rate: f64) -> u64 {
        (elapsed_nanos as f64 * leak_rate / NANOS_PER_SEC as f64).floor() as u64
    }

    /// Nanoseconds needed to drain `slots` slots.
    fn drain_nanos(&self, slots: u64, leak_rate: f64) -> u64 {
        (slots as f64 * NANOS_PER_SEC as f64 / leak_rate).ceil() as u64
    }
}

impl Algorithm for LeakyBucket {
    type State = LeakyBucketState;

    fn name(&self) -> &'static str {
        "leaky_bucket"
    }

    fn initial_state(&self, _quota: &Quota, now: u64) -> LeakyBucketState {
        LeakyBucketState {
            queue_length: 0,
            last_leak: now,
        }
    }

    fn decide(&self, state: &mut LeakyBucketState, quota: &Quota, now: u64, cost: u64) -> Decision {
        let capacity = quota.capacity();
        let leak_rate = quota.effective_refill_rate();

        let elapsed = elapsed_since(self.name(), state.last_leak, now);
        let leaked = self.calculate_leak(elapsed, leak_rate);
        if leaked > 0 {
            state.queue_length = state.queue_length.saturating_sub(leaked);
            // Advance only by whole leaks so the fractional remainder carries over.
            let accounted = (leaked as f64 * NANOS_PER_SEC as f64 / leak_rate) as u64;
            state.last_leak = (state.last_leak + accounted).min(now);
        }

        let since_leak = now.saturating_sub(state.last_leak);

        if state.queue_length + cost <= capacity {
            state.queue_length += cost;

            let drain = self
                .drain_nanos(state.queue_length, leak_rate)
                .saturating_sub(since_leak);
            let info = RateLimitInfo::new(
                capacity,
                capacity - state.queue_length,
                Duration::from_nanos(drain),
            )
            .with_algorithm("leaky_bucket");

            Decision::allowed(info)
        } else {
            // Wait until enough slots have leaked for this cost to fit.
            let overflow = state.queue_length + cost - capacity;
            let wait = self
                .drain_nanos(overflow, leak_rate)
                .saturating_sub(since_leak)
                .max(1);
            let drain = self
                .drain_nanos(state.queue_length, leak_rate)
                .saturating_sub(since_leak);

            let info = RateLimitInfo::new(
                capacity,
                capacity - state.queue_length,
                Duration::from_nanos(drain),
            )
            .with_algorithm("leaky_bucket")
            .with_retry_after(Duration::from_nanos(wait));

            Decision::denied(info)
        }
    }

    fn horizon(&self, quota: &Quota) -> Duration {
        quota.full_replenish_time()
    }
}
