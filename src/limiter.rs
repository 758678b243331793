//! Local rate limiter facade.
//!
//! A [`Limiter`] owns one algorithm, one quota, a clock and the per-client
//! [`MemoryStorage`]. Every call resolves the client's entry, locks that
//! entry alone, runs the algorithm and releases it; callers on different
//! keys never wait on each other.
//!
//! # Example
//!
//! ```
//! use ratelimit_engine::{AlgorithmKind, LimiterBuilder, Quota};
//!
//! let limiter = LimiterBuilder::new(AlgorithmKind::TokenBucket, Quota::per_second(5))
//!     .build()
//!     .unwrap();
//!
//! let decision = limiter.allow("user:123");
//! if decision.is_allowed() {
//!     println!("{} remaining", decision.remaining());
//! } else {
//!     println!("retry in {:?}", decision.retry_after());
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::algorithm::{Algorithm, AlgorithmKind};
use crate::clock::{Clock, MonotonicClock, SharedClock, SystemClock};
use crate::config::{DEFAULT_STORE_TIMEOUT, LimiterConfig};
use crate::decision::Decision;
use crate::distributed::{DistributedLimiter, FailurePolicy};
use crate::error::{ConfigError, Result};
use crate::key::ClientKey;
use crate::quota::Quota;
use crate::storage::{MemoryStorage, SharedStore, SweepConfig, SweepInterval, Sweeper};

/// In-process rate limiter.
///
/// Cheap to share behind an `Arc`; all methods take `&self`. Dropping the
/// limiter stops its background sweeper, if any.
pub struct Limiter<A: Algorithm = AlgorithmKind, C = MonotonicClock> {
    algorithm: A,
    quota: Quota,
    clock: Arc<C>,
    storage: Arc<MemoryStorage<A::State>>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl<A: Algorithm + std::fmt::Debug, C> std::fmt::Debug for Limiter<A, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Limiter")
            .field("algorithm", &self.algorithm)
            .field("quota", &self.quota)
            .field("storage", &self.storage)
            .finish()
    }
}

impl<A: Algorithm, C: Clock> Limiter<A, C> {
    /// Decide one request of cost 1.
    pub fn allow<K: ClientKey + ?Sized>(&self, key: &K) -> Decision {
        self.decide(&key.to_key(), 1)
    }

    /// Decide one request of `cost` units.
    ///
    /// Fails only for a cost of zero or above the capacity; such a call can
    /// never be admitted and is not recorded.
    pub fn allow_n<K: ClientKey + ?Sized>(&self, key: &K, cost: u64) -> Result<Decision> {
        if cost == 0 || cost > self.quota.capacity() {
            return Err(ConfigError::InvalidCost {
                cost,
                capacity: self.quota.capacity(),
            }
            .into());
        }
        Ok(self.decide(&key.to_key(), cost))
    }

    fn decide(&self, key: &str, cost: u64) -> Decision {
        let now = self.clock.now();
        let mut decision = self.storage.with_entry(
            key,
            now,
            || self.algorithm.initial_state(&self.quota, now),
            |state| self.algorithm.decide(state, &self.quota, now, cost),
        );

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
        } else {
            tracing::trace!(key, remaining = decision.remaining(), "request admitted");
        }
        decision
    }

    /// What [`Limiter::allow`] would decide right now, without recording
    /// anything.
    pub fn check<K: ClientKey + ?Sized>(&self, key: &K) -> Decision {
        let now = self.clock.now();
        let mut state = self
            .storage
            .peek(&key.to_key())
            .unwrap_or_else(|| self.algorithm.initial_state(&self.quota, now));
        self.algorithm.decide(&mut state, &self.quota, now, 1)
    }

    /// Forget `key`; its next request starts from full capacity. Returns
    /// whether the key had state.
    pub fn reset<K: ClientKey + ?Sized>(&self, key: &K) -> bool {
        self.storage.remove(&key.to_key())
    }

    /// Remove idle entries now. Returns the number removed.
    pub fn sweep(&self) -> usize {
        self.storage.sweep_at(self.clock.now())
    }

    /// Stop the background sweeper and drop all client state.
    ///
    /// The limiter stays usable: later calls start from empty state, and idle
    /// entries are then only removed by [`Limiter::sweep`] or request-count
    /// sweeping.
    pub fn close(&self) {
        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.stop();
        }
        self.storage.clear();
        tracing::debug!(algorithm = self.algorithm.name(), "limiter closed");
    }

    /// Number of clients with state.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if no client has state.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// The configured quota.
    pub fn quota(&self) -> &Quota {
        &self.quota
    }

    /// The algorithm deciding requests.
    pub fn algorithm(&self) -> &A {
        &self.algorithm
    }

    /// The clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Idle time after which an entry is swept.
    pub fn retention(&self) -> Duration {
        self.storage.retention()
    }
}

/// Builder for [`Limiter`] and [`DistributedLimiter`].
#[derive(Debug, Clone)]
pub struct LimiterBuilder<A = AlgorithmKind, C = MonotonicClock> {
    algorithm: A,
    quota: Quota,
    clock: C,
    sweep: SweepConfig,
    failure_policy: FailurePolicy,
    store_timeout: Duration,
}

impl<A: Algorithm> LimiterBuilder<A, MonotonicClock> {
    /// Start building a limiter running `algorithm` under `quota`.
    pub fn new(algorithm: A, quota: Quota) -> Self {
        Self {
            algorithm,
            quota,
            clock: MonotonicClock::new(),
            sweep: SweepConfig::default(),
            failure_policy: FailurePolicy::default(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

impl<A: Algorithm> LimiterBuilder<A, SystemClock> {
    /// Start building a limiter meant for a shared store: same as
    /// [`LimiterBuilder::new`] but reading the wall clock, so every instance
    /// stamps state in the same time base.
    pub fn distributed(algorithm: A, quota: Quota) -> Self {
        LimiterBuilder::new(algorithm, quota).clock(SystemClock)
    }
}

impl LimiterBuilder {
    /// Builder preset from a deserialized configuration.
    pub fn from_config(config: &LimiterConfig) -> Result<Self> {
        Ok(Self::new(config.algorithm, config.quota()?)
            .sweep(config.sweep_config()?)
            .failure_policy(config.failure_policy)
            .store_timeout(config.store_timeout()))
    }
}

impl<A: Algorithm, C: Clock> LimiterBuilder<A, C> {
    /// Use another clock.
    pub fn clock<C2: Clock>(self, clock: C2) -> LimiterBuilder<A, C2> {
        LimiterBuilder {
            algorithm: self.algorithm,
            quota: self.quota,
            clock,
            sweep: self.sweep,
            failure_policy: self.failure_policy,
            store_timeout: self.store_timeout,
        }
    }

    /// Replace the whole sweeping configuration.
    pub fn sweep(mut self, sweep: SweepConfig) -> Self {
        self.sweep = sweep;
        self
    }

    /// Idle time after which an entry is swept. Must exceed the algorithm's
    /// horizon.
    pub fn retention(mut self, retention: Duration) -> Self {
        self.sweep.retention = Some(retention);
        self
    }

    /// When to sweep.
    pub fn sweep_interval(mut self, interval: SweepInterval) -> Self {
        self.sweep.interval = interval;
        self
    }

    /// Verdict of a distributed limiter when the store fails.
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Bound on each shared store call.
    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Build a local limiter.
    ///
    /// [`SweepInterval::Every`] spawns the sweeper on the current Tokio
    /// runtime and fails with [`ConfigError::NoRuntime`] outside one.
    pub fn build(self) -> Result<Limiter<A, C>> {
        self.quota.validate()?;
        let retention = self.sweep.resolve(self.algorithm.horizon(&self.quota))?;

        let clock = Arc::new(self.clock);
        let storage = Arc::new(MemoryStorage::new(self.sweep.interval, retention));
        let sweeper = match self.sweep.interval {
            SweepInterval::Every(period) => Some(Sweeper::spawn(&storage, Arc::clone(&clock), period)?),
            SweepInterval::Requests(_) | SweepInterval::Manual => None,
        };

        tracing::debug!(
            algorithm = self.algorithm.name(),
            capacity = self.quota.capacity(),
            window = ?self.quota.window(),
            ?retention,
            "limiter built"
        );

        Ok(Limiter {
            algorithm: self.algorithm,
            quota: self.quota,
            clock,
            storage,
            sweeper: Mutex::new(sweeper),
        })
    }

    /// Build a limiter that keeps its state in `store`.
    ///
    /// Only available with a [`SharedClock`]; start from
    /// [`LimiterBuilder::distributed`] or call [`LimiterBuilder::clock`].
    /// Sweeping settings do not apply; the store expires state itself.
    pub fn build_distributed<S: SharedStore>(self, store: S) -> Result<DistributedLimiter<S, A, C>>
    where
        C: SharedClock,
    {
        DistributedLimiter::new(
            store,
            self.algorithm,
            self.quota,
            self.clock,
            self.failure_policy,
            self.store_timeout,
        )
    }
}
