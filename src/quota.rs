//! Quota configuration for rate limiting.
//!
//! A `Quota` is the immutable limit specification of one limiter: how many
//! requests (or cost units) fit in the bucket or window, how long the window
//! is, how fast bucket algorithms refill or drain, and how finely the sliding
//! window counter subdivides its window.
//!
//! # Examples
//!
//! ```
//! use ratelimit_engine::Quota;
//! use std::time::Duration;
//!
//! // 100 requests per minute
//! let quota = Quota::per_minute(100);
//!
//! // Bucket of 5, refilled at one token per second
//! let quota = Quota::per_second(5).with_refill_rate(1.0);
//!
//! // 50 requests per 30 seconds, sliding counter with 6 sub-windows
//! let quota = Quota::new(50, Duration::from_secs(30)).with_sub_windows(6);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::{NANOS_PER_SEC, duration_nanos};
use crate::error::{ConfigError, Result};

/// Rate limiting quota configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quota {
    /// Bucket size or per-window quota.
    capacity: u64,

    /// Time window duration.
    window: Duration,

    /// Refill (token bucket) or leak (leaky bucket) rate in units per second.
    /// If not set, calculated from capacity / window.
    refill_rate: Option<f64>,

    /// Number of sub-windows used by the sliding window counter.
    sub_windows: u32,
}

impl Quota {
    /// Create a new quota with the given capacity and window.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0 or `window` is zero duration. Use
    /// [`Quota::try_new`] to get an error instead.
    pub fn new(capacity: u64, window: Duration) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        assert!(!window.is_zero(), "window must be non-zero");

        Self {
            capacity,
            window,
            refill_rate: None,
            sub_windows: 1,
        }
    }

    /// Create a quota allowing `n` requests per second.
    pub fn per_second(n: u64) -> Self {
        Self::new(n, Duration::from_secs(1))
    }

    /// Create a quota allowing `n` requests per minute.
    pub fn per_minute(n: u64) -> Self {
        Self::new(n, Duration::from_secs(60))
    }

    /// Create a quota allowing `n` requests per hour.
    pub fn per_hour(n: u64) -> Self {
        Self::new(n, Duration::from_secs(3600))
    }

    /// Create a quota allowing `n` requests per day.
    pub fn per_day(n: u64) -> Self {
        Self::new(n, Duration::from_secs(86400))
    }

    /// Try to create a new quota, returning an error if invalid.
    pub fn try_new(capacity: u64, window: Duration) -> Result<Self> {
        let quota = Self {
            capacity,
            window,
            refill_rate: None,
            sub_windows: 1,
        };
        quota.validate()?;
        Ok(quota)
    }

    /// Set a custom refill/leak rate (units per second).
    ///
    /// If not set, the rate is `capacity / window_seconds`.
    pub fn with_refill_rate(mut self, rate: f64) -> Self {
        self.refill_rate = Some(rate);
        self
    }

    /// Set the number of sub-windows for the sliding window counter.
    ///
    /// One sub-window gives the classic current/previous window estimator.
    pub fn with_sub_windows(mut self, count: u32) -> Self {
        self.sub_windows = count;
        self
    }

    /// Check every field, rejecting rather than clamping bad values.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(ConfigError::InvalidQuota("capacity must be greater than 0".into()).into());
        }
        if self.window.is_zero() {
            return Err(ConfigError::InvalidQuota("window must be non-zero".into()).into());
        }
        if duration_nanos(self.window).is_none() {
            return Err(ConfigError::InvalidQuota(format!(
                "window {:?} exceeds the nanosecond clock range",
                self.window
            ))
            .into());
        }
        let rate = self.effective_refill_rate();
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ConfigError::InvalidQuota(format!(
                "refill rate must be positive and finite, got {rate}"
            ))
            .into());
        }
        if self.sub_windows == 0 {
            return Err(ConfigError::InvalidQuota("sub-window count must be at least 1".into()).into());
        }
        if self.window_nanos() < u64::from(self.sub_windows) {
            return Err(ConfigError::InvalidQuota(format!(
                "window {:?} is too short for {} sub-windows",
                self.window, self.sub_windows
            ))
            .into());
        }
        Ok(())
    }

    /// Bucket size or per-window quota.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Get the window duration.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Window length in nanoseconds, saturating at `u64::MAX`.
    pub fn window_nanos(&self) -> u64 {
        duration_nanos(self.window).unwrap_or(u64::MAX)
    }

    /// Number of sub-windows for the sliding window counter.
    pub fn sub_windows(&self) -> u32 {
        self.sub_windows
    }

    /// Length of one sliding-counter sub-window in nanoseconds.
    pub fn sub_window_nanos(&self) -> u64 {
        (self.window_nanos() / u64::from(self.sub_windows.max(1))).max(1)
    }

    /// Get the effective refill rate (units per second).
    ///
    /// Returns the configured rate, or calculates `capacity / window_seconds`.
    pub fn effective_refill_rate(&self) -> f64 {
        self.refill_rate
            .unwrap_or_else(|| self.capacity as f64 / self.window.as_secs_f64())
    }

    /// Time to refill (or drain) `units` at the effective rate.
    pub fn time_for(&self, units: f64) -> Duration {
        if units <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_nanos((units * NANOS_PER_SEC as f64 / self.effective_refill_rate()).ceil() as u64)
    }

    /// Time for an empty bucket to refill completely (or a full one to drain).
    pub fn full_replenish_time(&self) -> Duration {
        self.time_for(self.capacity as f64)
    }
}

impl Default for Quota {
    fn default() -> Self {
        Self::per_minute(60)
    }
}

/// Builder for creating quotas with validation.
#[derive(Debug, Default)]
pub struct QuotaBuilder {
    capacity: Option<u64>,
    window: Option<Duration>,
    refill_rate: Option<f64>,
    sub_windows: Option<u32>,
}

impl QuotaBuilder {
    /// Create a new quota builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the capacity.
    pub fn capacity(mut self, n: u64) -> Self {
        self.capacity = Some(n);
        self
    }

    /// Set the window duration.
    pub fn window(mut self, duration: Duration) -> Self {
        self.window = Some(duration);
        self
    }

    /// Set the refill rate.
    pub fn refill_rate(mut self, rate: f64) -> Self {
        self.refill_rate = Some(rate);
        self
    }

    /// Set the sliding counter sub-window count.
    pub fn sub_windows(mut self, count: u32) -> Self {
        self.sub_windows = Some(count);
        self
    }

    /// Build the quota, returning an error if invalid.
    ///
    /// A window may be omitted when a refill rate is given; it then defaults
    /// to the time the rate needs to refill the whole capacity.
    pub fn build(self) -> Result<Quota> {
        let capacity = self
            .capacity
            .ok_or_else(|| ConfigError::MissingRequired("capacity".into()))?;
        let window = match (self.window, self.refill_rate) {
            (Some(window), _) => window,
            (None, Some(rate)) if rate.is_finite() && rate > 0.0 => {
                Duration::try_from_secs_f64(capacity as f64 / rate).map_err(|_| {
                    ConfigError::InvalidQuota(format!("refill rate {rate} is too small"))
                })?
            }
            (None, Some(rate)) => {
                return Err(ConfigError::InvalidQuota(format!(
                    "refill rate must be positive and finite, got {rate}"
                ))
                .into());
            }
            (None, None) => {
                return Err(ConfigError::MissingRequired("window or refill_rate".into()).into());
            }
        };

        let quota = Quota {
            capacity,
            window,
            refill_rate: self.refill_rate,
            sub_windows: self.sub_windows.unwrap_or(1),
        };
        quota.validate()?;
        Ok(quota)
    }
}
