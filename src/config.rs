//! Serializable limiter configuration.
//!
//! [`LimiterConfig`] is the flat record a host application deserializes from
//! whatever configuration source it uses; this crate never loads files or
//! environment variables itself.
//!
//! ```
//! use ratelimit_engine::{AlgorithmKind, LimiterConfig};
//!
//! let config: LimiterConfig = serde_json::from_str(r#"{
//!     "algorithm": "token_bucket",
//!     "capacity": 10,
//!     "refill_rate": 2.0
//! }"#).unwrap();
//! assert_eq!(config.algorithm, AlgorithmKind::TokenBucket);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algorithm::AlgorithmKind;
use crate::distributed::FailurePolicy;
use crate::error::{ConfigError, Result};
use crate::quota::{Quota, QuotaBuilder};
use crate::storage::{SweepConfig, SweepInterval};

/// Default bound on a single shared store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(50);

/// Configuration of one limiter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Algorithm to run.
    #[serde(default)]
    pub algorithm: AlgorithmKind,
    /// Bucket size or per-window quota.
    pub capacity: u64,
    /// Window length in milliseconds. May be omitted when `refill_rate` is set.
    #[serde(default)]
    pub window_ms: Option<u64>,
    /// Refill or leak rate in units per second.
    #[serde(default)]
    pub refill_rate: Option<f64>,
    /// Sub-windows of the sliding window counter.
    #[serde(default = "default_sub_window_count")]
    pub sub_window_count: u32,
    /// Idle time before an entry is swept. Derived from the algorithm when
    /// omitted.
    #[serde(default)]
    pub retention_ms: Option<u64>,
    /// Sweep from a background task at this period.
    #[serde(default)]
    pub sweep_interval_ms: Option<u64>,
    /// Sweep inline every this many decisions.
    #[serde(default)]
    pub sweep_every_requests: Option<u64>,
    /// Verdict when the shared store fails.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Bound on each shared store call in milliseconds.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

fn default_sub_window_count() -> u32 {
    1
}

fn default_store_timeout_ms() -> u64 {
    DEFAULT_STORE_TIMEOUT.as_millis() as u64
}

impl LimiterConfig {
    /// Minimal configuration for `algorithm` with `capacity` per `window`.
    pub fn new(algorithm: AlgorithmKind, capacity: u64, window: Duration) -> Self {
        Self {
            algorithm,
            capacity,
            window_ms: Some(window.as_millis() as u64),
            refill_rate: None,
            sub_window_count: default_sub_window_count(),
            retention_ms: None,
            sweep_interval_ms: None,
            sweep_every_requests: None,
            failure_policy: FailurePolicy::default(),
            store_timeout_ms: default_store_timeout_ms(),
        }
    }

    /// The validated quota this configuration describes.
    pub fn quota(&self) -> Result<Quota> {
        let mut builder = QuotaBuilder::new()
            .capacity(self.capacity)
            .sub_windows(self.sub_window_count);
        if let Some(ms) = self.window_ms {
            builder = builder.window(Duration::from_millis(ms));
        }
        if let Some(rate) = self.refill_rate {
            builder = builder.refill_rate(rate);
        }
        builder.build()
    }

    /// Sweeping configuration. At most one trigger may be set; none selects
    /// the default request-count trigger.
    pub fn sweep_config(&self) -> Result<SweepConfig> {
        let interval = match (self.sweep_interval_ms, self.sweep_every_requests) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::InvalidSweep(
                    "set only one of sweep_interval_ms and sweep_every_requests".into(),
                )
                .into());
            }
            (Some(ms), None) => SweepInterval::Every(Duration::from_millis(ms)),
            (None, Some(n)) => SweepInterval::Requests(n),
            (None, None) => SweepInterval::default(),
        };

        Ok(SweepConfig {
            interval,
            retention: self.retention_ms.map(Duration::from_millis),
        })
    }

    /// Bound on each shared store call.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}
