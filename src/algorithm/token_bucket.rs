//! Token Bucket rate limiting algorithm.

use serde::{Deserialize, Serialize};

use crate::algorithm::{Algorithm, elapsed_since};
use crate::clock::NANOS_PER_SEC;
use crate::decision::{Decision, DecisionMetadata, RateLimitInfo};
use crate::quota::Quota;

/// Token bucket state of one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBucketState {
    /// Tokens currently in the bucket, `0 <= tokens <= capacity`.
    pub tokens: f64,
    /// Time of the last refill computation.
    pub last_refill: u64,
}

/// Token Bucket rate limiting algorithm.
///
/// Allows controlled bursts while enforcing an average rate limit.
/// Tokens are refilled at a constant rate up to maximum capacity.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenBucket;

impl TokenBucket {
    /// Create a new Token Bucket algorithm instance.
    pub fn new() -> Self {
        Self
    }

    /// Calculate token refill based on elapsed time.
    fn calculate_refill(&self, elapsed_nanos: u64, refill_rate: f64) -> f64 {
        elapsed_nanos as f64 * refill_rate / NANOS_PER_SEC as f64
    }

    /// Build rate limit info from current state.
    fn build_info(&self, tokens: f64, quota: &Quota) -> RateLimitInfo {
        let max_tokens = quota.capacity() as f64;

        RateLimitInfo::new(
            quota.capacity(),
            tokens.floor() as u64,
            quota.time_for(max_tokens - tokens),
        )
        .with_algorithm("token_bucket")
        .with_metadata(DecisionMetadata::new().with_tokens_available(tokens))
    }
}

impl Algorithm for TokenBucket {
    type State = TokenBucketState;

    fn name(&self) -> &'static str {
        "token_bucket"
    }

    fn initial_state(&self, quota: &Quota, now: u64) -> TokenBucketState {
        TokenBucketState {
            tokens: quota.capacity() as f64,
            last_refill: now,
        }
    }

    fn decide(&self, state: &mut TokenBucketState, quota: &Quota, now: u64, cost: u64) -> Decision {
        let max_tokens = quota.capacity() as f64;
        let elapsed = elapsed_since(self.name(), state.last_refill, now);
        let refill = self.calculate_refill(elapsed, quota.effective_refill_rate());

        state.tokens = (state.tokens + refill).min(max_tokens);
        // Never move backwards, or the next refill would count the gap twice.
        state.last_refill = state.last_refill.max(now);

        let cost = cost as f64;
        if state.tokens >= cost {
            state.tokens -= cost;
            Decision::allowed(self.build_info(state.tokens, quota))
        } else {
            let info = self
                .build_info(state.tokens, quota)
                .with_retry_after(quota.time_for(cost - state.tokens));
            Decision::denied(info)
        }
    }

    fn horizon(&self, quota: &Quota) -> std::time::Duration {
        quota.full_replenish_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::test_support::secs;
    use std::time::Duration;

    fn run(quota: &Quota, state: &mut TokenBucketState, now: u64) -> Decision {
        TokenBucket.decide(state, quota, now, 1)
    }

    #[test]
    fn test_token_bucket_burst_bound() {
        let quota = Quota::per_minute(5);
        let mut state = TokenBucket.initial_state(&quota, 0);

        for i in 1..=5 {
            assert!(run(&quota, &mut state, 0).is_allowed(), "Request {} should be allowed", i);
        }
        let decision = run(&quota, &mut state, 0);
        assert!(decision.is_denied());
        assert_eq!(decision.remaining(), 0);
        assert_eq!(state.tokens, 0.0);
    }

    #[test]
    fn test_token_bucket_scenario() {
        // capacity 5, one token per second
        let quota = Quota::per_second(5).with_refill_rate(1.0);
        let mut state = TokenBucket.initial_state(&quota, 0);

        for _ in 0..5 {
            assert!(run(&quota, &mut state, 0).is_allowed());
        }
        let denied = run(&quota, &mut state, 0);
        assert!(denied.is_denied());
        assert_eq!(denied.retry_after(), Some(Duration::from_secs(1)));

        assert!(run(&quota, &mut state, secs(1.0)).is_allowed());
        assert!(run(&quota, &mut state, secs(1.0)).is_denied());
    }

    #[test]
    fn test_token_bucket_reject_keeps_refill() {
        let quota = Quota::per_second(2).with_refill_rate(1.0);
        let mut state = TokenBucket.initial_state(&quota, 0);
        run(&quota, &mut state, 0);
        run(&quota, &mut state, 0);

        // Half a token accrued; the rejection must not discard it.
        assert!(run(&quota, &mut state, secs(0.5)).is_denied());
        assert_eq!(state.tokens, 0.5);
        assert_eq!(state.last_refill, secs(0.5));
        assert!(run(&quota, &mut state, secs(1.0)).is_allowed());
    }

    #[test]
    fn test_token_bucket_never_exceeds_capacity() {
        let quota = Quota::per_second(3);
        let mut state = TokenBucket.initial_state(&quota, 0);
        let decision = run(&quota, &mut state, secs(3600.0));
        assert!(decision.is_allowed());
        assert_eq!(state.tokens, 2.0);
        assert_eq!(decision.info().metadata.as_ref().unwrap().tokens_available, Some(2.0));
    }

    #[test]
    fn test_token_bucket_clock_anomaly_clamps() {
        let quota = Quota::per_second(1).with_refill_rate(1.0);
        let mut state = TokenBucket.initial_state(&quota, secs(10.0));
        assert!(run(&quota, &mut state, secs(10.0)).is_allowed());

        // Clock jumps back: no negative refill, no credit for the gap later.
        assert!(run(&quota, &mut state, secs(5.0)).is_denied());
        assert_eq!(state.tokens, 0.0);
        assert_eq!(state.last_refill, secs(10.0));
        assert!(run(&quota, &mut state, secs(10.5)).is_denied());
        assert!(run(&quota, &mut state, secs(11.0)).is_allowed());
    }

    #[test]
    fn test_token_bucket_cost() {
        let quota = Quota::per_second(5).with_refill_rate(1.0);
        let mut state = TokenBucket.initial_state(&quota, 0);

        assert!(TokenBucket.decide(&mut state, &quota, 0, 3).is_allowed());
        let denied = TokenBucket.decide(&mut state, &quota, 0, 3);
        assert!(denied.is_denied());
        assert_eq!(denied.remaining(), 2);
        assert_eq!(denied.retry_after(), Some(Duration::from_secs(1)));
        assert!(TokenBucket.decide(&mut state, &quota, 0, 2).is_allowed());
    }
}
