//! Decision types for rate limiting results.
//!
//! Every admission check produces a `Decision`: the admit/reject verdict plus
//! a `RateLimitInfo` describing the remaining quota and, when rejected, how
//! long the caller should wait before retrying.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The result of a rate limit check.
#[derive(Debug, Clone)]
pub struct Decision {
    /// Whether the request is allowed.
    allowed: bool,
    /// Rate limit information.
    info: RateLimitInfo,
}

impl Decision {
    /// Create a new "allowed" decision.
    pub fn allowed(info: RateLimitInfo) -> Self {
        Self {
            allowed: true,
            info,
        }
    }

    /// Create a new "denied" decision.
    pub fn denied(info: RateLimitInfo) -> Self {
        Self {
            allowed: false,
            info,
        }
    }

    /// Check if the request is allowed.
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// Check if the request is denied.
    pub fn is_denied(&self) -> bool {
        !self.allowed
    }

    /// Remaining quota after this decision.
    pub fn remaining(&self) -> u64 {
        self.info.remaining
    }

    /// How long to wait before retrying, if denied.
    pub fn retry_after(&self) -> Option<Duration> {
        self.info.retry_after
    }

    /// Get the rate limit info.
    pub fn info(&self) -> &RateLimitInfo {
        &self.info
    }

    /// Mutable access to the rate limit info.
    pub(crate) fn info_mut(&mut self) -> &mut RateLimitInfo {
        &mut self.info
    }
}

/// Information about the current rate limit state.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    /// Capacity of the bucket or window.
    pub limit: u64,
    /// Units still available after this decision.
    pub remaining: u64,
    /// Time until the client's state returns to full capacity.
    pub reset_after: Duration,
    /// How long to wait before retrying (only set when rate limited).
    pub retry_after: Option<Duration>,
    /// Name of the algorithm that made this decision.
    pub algorithm: Option<&'static str>,
    /// Additional metadata.
    pub metadata: Option<DecisionMetadata>,
}

impl RateLimitInfo {
    /// Create a new rate limit info.
    pub fn new(limit: u64, remaining: u64, reset_after: Duration) -> Self {
        Self {
            limit,
            remaining,
            reset_after,
            retry_after: None,
            algorithm: None,
            metadata: None,
        }
    }

    /// Set the retry-after duration.
    pub fn with_retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    /// Set the algorithm name.
    pub fn with_algorithm(mut self, name: &'static str) -> Self {
        self.algorithm = Some(name);
        self
    }

    /// Set additional metadata.
    pub fn with_metadata(mut self, metadata: DecisionMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Metadata, created empty on first access.
    pub(crate) fn metadata_mut(&mut self) -> &mut DecisionMetadata {
        self.metadata.get_or_insert_with(DecisionMetadata::new)
    }

    /// Reset time rounded up to whole seconds.
    pub fn reset_seconds(&self) -> u64 {
        ceil_secs(self.reset_after)
    }

    /// Convert to HTTP headers for a surrounding service.
    ///
    /// Returns a vector of (header_name, header_value) pairs. Durations are
    /// rounded up so a client never retries too early.
    pub fn to_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("X-RateLimit-Limit", self.limit.to_string()),
            ("X-RateLimit-Remaining", self.remaining.to_string()),
            ("X-RateLimit-Reset", self.reset_seconds().to_string()),
        ];

        if let Some(retry_after) = self.retry_after {
            headers.push(("Retry-After", ceil_secs(retry_after).to_string()));
        }

        if let Some(algorithm) = self.algorithm {
            headers.push(("X-RateLimit-Policy", algorithm.to_string()));
        }

        headers
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

/// Additional metadata about a rate limit decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionMetadata {
    /// The key that was rate limited.
    pub key: Option<String>,
    /// Units this call asked for.
    pub cost: Option<u64>,
    /// Current tokens available (for token bucket).
    pub tokens_available: Option<f64>,
    /// Set when the verdict came from the failure policy because the shared
    /// store could not be consulted.
    pub degraded: bool,
}

impl DecisionMetadata {
    /// Create new empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the cost.
    pub fn with_cost(mut self, cost: u64) -> Self {
        self.cost = Some(cost);
        self
    }

    /// Set tokens available.
    pub fn with_tokens_available(mut self, tokens: f64) -> Self {
        self.tokens_available = Some(tokens);
        self
    }

    /// Mark the decision as produced by the failure policy.
    pub fn degraded(mut self) -> Self {
        self.degraded = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_allowed() {
        let info = RateLimitInfo::new(100, 99, Duration::from_secs(1));
        let decision = Decision::allowed(info);

        assert!(decision.is_allowed());
        assert!(!decision.is_denied());
        assert_eq!(decision.info().limit, 100);
        assert_eq!(decision.remaining(), 99);
        assert_eq!(decision.retry_after(), None);
    }

    #[test]
    fn test_decision_denied() {
        let info = RateLimitInfo::new(100, 0, Duration::from_secs(60))
            .with_retry_after(Duration::from_secs(30));
        let decision = Decision::denied(info);

        assert!(decision.is_denied());
        assert_eq!(decision.remaining(), 0);
        assert_eq!(decision.retry_after(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_rate_limit_info_headers() {
        let info = RateLimitInfo::new(100, 50, Duration::from_millis(59_200))
            .with_algorithm("token_bucket")
            .with_retry_after(Duration::from_millis(9_001));

        let headers = info.to_headers();

        assert!(headers.iter().any(|(k, v)| *k == "X-RateLimit-Limit" && v == "100"));
        assert!(headers.iter().any(|(k, v)| *k == "X-RateLimit-Remaining" && v == "50"));
        assert!(headers.iter().any(|(k, v)| *k == "X-RateLimit-Reset" && v == "60"));
        assert!(headers.iter().any(|(k, v)| *k == "Retry-After" && v == "10"));
        assert!(headers.iter().any(|(k, v)| *k == "X-RateLimit-Policy" && v == "token_bucket"));
    }

    #[test]
    fn test_decision_metadata() {
        let metadata = DecisionMetadata::new()
            .with_key("user:123")
            .with_cost(2)
            .with_tokens_available(5.5)
            .degraded();

        assert_eq!(metadata.key, Some("user:123".into()));
        assert_eq!(metadata.cost, Some(2));
        assert_eq!(metadata.tokens_available, Some(5.5));
        assert!(metadata.degraded);
    }
}
