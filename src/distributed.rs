//! Limiter backed by a shared store.
//!
//! Several processes that point a [`DistributedLimiter`] at the same
//! [`SharedStore`] enforce one quota per client between them. Each decision
//! is a single store call bounded by the configured timeout. When the call
//! fails or times out the [`FailurePolicy`] decides the verdict, and the
//! decision is marked degraded in its metadata.
//!
//! All instances must read the same time base, so the limiter only accepts
//! a [`SharedClock`]; [`LimiterBuilder::distributed`](crate::LimiterBuilder::distributed)
//! starts from [`SystemClock`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algorithm::{Algorithm, AlgorithmKind};
use crate::clock::{SharedClock, SystemClock};
use crate::decision::{Decision, DecisionMetadata, RateLimitInfo};
use crate::error::{ConfigError, Result, StorageError};
use crate::key::ClientKey;
use crate::quota::Quota;
use crate::storage::SharedStore;

/// Verdict when the shared store cannot be consulted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Admit the request.
    #[default]
    FailOpen,
    /// Reject the request.
    FailClosed,
}

/// Rate limiter whose state lives in a [`SharedStore`].
pub struct DistributedLimiter<S, A = AlgorithmKind, C = SystemClock> {
    store: S,
    algorithm: A,
    quota: Quota,
    clock: C,
    failure_policy: FailurePolicy,
    timeout: Duration,
}

impl<S, A: std::fmt::Debug, C> std::fmt::Debug for DistributedLimiter<S, A, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedLimiter")
            .field("algorithm", &self.algorithm)
            .field("quota", &self.quota)
            .field("failure_policy", &self.failure_policy)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<S, A, C> DistributedLimiter<S, A, C>
where
    S: SharedStore,
    A: Algorithm,
    C: SharedClock,
{
    pub(crate) fn new(
        store: S,
        algorithm: A,
        quota: Quota,
        clock: C,
        failure_policy: FailurePolicy,
        timeout: Duration,
    ) -> Result<Self> {
        quota.validate()?;
        if timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout.into());
        }
        Ok(Self {
            store,
            algorithm,
            quota,
            clock,
            failure_policy,
            timeout,
        })
    }

    /// Decide one request of cost 1.
    pub async fn allow<K: ClientKey + ?Sized>(&self, key: &K) -> Decision {
        self.decide(&key.to_key(), 1).await
    }

    /// Decide one request of `cost` units.
    ///
    /// Fails only for a cost of zero or above the capacity. Store failures
    /// are turned into a verdict by the failure policy.
    pub async fn allow_n<K: ClientKey + ?Sized>(&self, key: &K, cost: u64) -> Result<Decision> {
        if cost == 0 || cost > self.quota.capacity() {
            return Err(ConfigError::InvalidCost {
                cost,
                capacity: self.quota.capacity(),
            }
            .into());
        }
        Ok(self.decide(&key.to_key(), cost).await)
    }

    /// Forget the shared state of `key`.
    pub async fn reset<K: ClientKey + ?Sized>(&self, key: &K) -> Result<()> {
        match tokio::time::timeout(self.timeout, self.store.delete(&key.to_key())).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(self.timeout).into()),
        }
    }

    async fn decide(&self, key: &str, cost: u64) -> Decision {
        let now = self.clock.now();
        let call = self
            .algorithm
            .decide_shared(&self.store, key, &self.quota, now, cost);

        let outcome = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(self.timeout).into()),
        };

        match outcome {
            Ok(mut decision) => {
                let metadata = decision.info_mut().metadata_mut();
                metadata.key = Some(key.to_owned());
                metadata.cost = Some(cost);
                if decision.is_denied() {
                    tracing::debug!(
                        key,
                        algorithm = self.algorithm.name(),
                        retry_after = ?decision.retry_after(),
                        "request rejected"
                    );
                }
                decision
            }
            Err(error) => {
                tracing::warn!(
                    key,
                    %error,
                    policy = ?self.failure_policy,
                    "shared store unavailable, applying failure policy"
                );
                self.degraded(key, cost)
            }
        }
    }

    /// Verdict of the failure policy. Remaining and retry hints assume the
    /// client's state is unknown.
    fn degraded(&self, key: &str, cost: u64) -> Decision {
        let limit = self.quota.capacity();
        let replenish = self.quota.time_for(cost as f64);
        let metadata = DecisionMetadata::new()
            .with_key(key)
            .with_cost(cost)
            .degraded();

        match self.failure_policy {
            FailurePolicy::FailOpen => Decision::allowed(
                RateLimitInfo::new(limit, limit - cost, replenish)
                    .with_algorithm(self.algorithm.name())
                    .with_metadata(metadata),
            ),
            FailurePolicy::FailClosed => Decision::denied(
                RateLimitInfo::new(limit, 0, replenish)
                    .with_algorithm(self.algorithm.name())
                    .with_retry_after(replenish)
                    .with_metadata(metadata),
            ),
        }
    }

    /// The configured quota.
    pub fn quota(&self) -> &Quota {
        &self.quota
    }

    /// The algorithm deciding requests.
    pub fn algorithm(&self) -> &A {
        &self.algorithm
    }

    /// The failure policy.
    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Bound on each store call.
    pub fn store_timeout(&self) -> Duration {
        self.timeout
    }

    /// The shared store.
    pub fn store(&self) -> &S {
        &self.store
    }
}
