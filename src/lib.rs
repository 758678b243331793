//! Rate limiting decision engine.
//!
//! `ratelimit_engine` decides, for each incoming request of a client, whether
//! it is admitted or rejected under a configured quota:
//!
//! - **Five Algorithms**: Token Bucket, Leaky Bucket, Fixed Window, Sliding
//!   Log and Sliding Window counter, selectable at runtime
//! - **Per-Client State**: concurrent store with per-key locking and idle
//!   entry sweeping
//! - **Injectable Clock**: monotonic, wall-clock or manual time
//! - **Shared Stores**: optional distributed operation with fail-open or
//!   fail-closed behaviour on store failure
//!
//! Transport, HTTP handling and metrics are left to the host application;
//! [`RateLimitInfo::to_headers`] renders the conventional response headers.
//!
//! # Quick Start
//!
//! ```
//! use ratelimit_engine::{AlgorithmKind, LimiterBuilder, Quota};
//! use std::time::Duration;
//!
//! // 10 requests per 10 seconds, estimated over 5 sub-windows
//! let quota = Quota::new(10, Duration::from_secs(10)).with_sub_windows(5);
//! let limiter = LimiterBuilder::new(AlgorithmKind::SlidingWindow, quota)
//!     .build()
//!     .unwrap();
//!
//! let decision = limiter.allow("user:123");
//! assert!(decision.is_allowed());
//! assert_eq!(decision.remaining(), 9);
//! ```
//!
//! # Algorithms
//!
//! | Algorithm | Best For | Memory |
//! |-----------|----------|--------|
//! | Token Bucket | Bursty traffic | O(1) |
//! | Leaky Bucket | Smooth output | O(1) |
//! | Fixed Window | Simple use cases | O(1) |
//! | Sliding Log | Precision critical | O(capacity) |
//! | Sliding Window | Many clients | O(sub-windows) |

pub mod algorithm;
pub mod clock;
pub mod config;
pub mod decision;
pub mod distributed;
pub mod error;
pub mod key;
pub mod limiter;
pub mod quota;
pub mod storage;

// Re-export main types
pub use algorithm::{Algorithm, AlgorithmKind, AlgorithmState};
pub use clock::{Clock, ManualClock, MonotonicClock, SharedClock, SystemClock};
pub use config::LimiterConfig;
pub use decision::{Decision, DecisionMetadata, RateLimitInfo};
pub use distributed::{DistributedLimiter, FailurePolicy};
pub use error::{ConfigError, RateLimitError, Result, StorageError};
pub use key::{ClientKey, CompositeKey};
pub use limiter::{Limiter, LimiterBuilder};
pub use quota::{Quota, QuotaBuilder};
pub use storage::{MemoryStorage, SharedStore, SweepConfig, SweepInterval};

// Re-export algorithms
pub use algorithm::{FixedWindow, LeakyBucket, SlidingLog, SlidingWindow, TokenBucket};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::algorithm::{Algorithm, AlgorithmKind};
    pub use crate::clock::{Clock, ManualClock, MonotonicClock, SharedClock, SystemClock};
    pub use crate::decision::{Decision, RateLimitInfo};
    pub use crate::distributed::{DistributedLimiter, FailurePolicy};
    pub use crate::error::{RateLimitError, Result};
    pub use crate::key::ClientKey;
    pub use crate::limiter::{Limiter, LimiterBuilder};
    pub use crate::quota::Quota;
    pub use crate::storage::{SharedStore, SweepInterval};

    pub use crate::algorithm::{FixedWindow, LeakyBucket, SlidingLog, SlidingWindow, TokenBucket};
}
