//! Error types for rate limiting operations.
//!
//! Steady-state admit/reject verdicts are never errors: they are returned as a
//! [`Decision`](crate::Decision). Errors are limited to invalid configuration
//! (reported at construction, or at call time for an invalid cost) and to
//! failures of an external shared store, which the distributed limiter turns
//! into a verdict according to its failure policy.

use std::time::Duration;
use thiserror::Error;

/// Result type for rate limiting operations.
pub type Result<T> = std::result::Result<T, RateLimitError>;

/// Main error type for rate limiting operations.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// Shared store error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl RateLimitError {
    /// Check if this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Shared store errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Generic storage operation failed.
    #[error("{message}")]
    OperationFailed {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Atomic operation failed (CAS conflict).
    #[error("Atomic operation failed, state was modified concurrently")]
    AtomicConflict,

    /// The store cannot be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store did not answer within the configured bound.
    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),
}

impl StorageError {
    /// Create a new operation failed error.
    pub fn operation_failed(message: impl Into<String>, retryable: bool) -> Self {
        Self::OperationFailed {
            message: message.into(),
            retryable,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::OperationFailed { retryable, .. } => *retryable,
            Self::AtomicConflict | Self::Unavailable(_) | Self::Timeout(_) => true,
            Self::Serialization(_) => false,
        }
    }
}

/// Configuration-related errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Invalid quota configuration.
    #[error("Invalid quota: {0}")]
    InvalidQuota(String),

    /// Cost of a single call is zero or exceeds the capacity.
    #[error("Invalid cost {cost}: must be between 1 and capacity {capacity}")]
    InvalidCost {
        /// Requested cost.
        cost: u64,
        /// Configured capacity.
        capacity: u64,
    },

    /// Retention does not outlive the algorithm's state horizon.
    #[error("Retention {retention:?} must exceed the algorithm horizon {horizon:?}")]
    InvalidRetention {
        /// Configured retention.
        retention: Duration,
        /// Longest time the algorithm's state can influence a decision.
        horizon: Duration,
    },

    /// Invalid sweeper configuration.
    #[error("Invalid sweep configuration: {0}")]
    InvalidSweep(String),

    /// Shared store timeout is zero.
    #[error("Store timeout must be > 0")]
    InvalidTimeout,

    /// Missing required configuration.
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Time-based sweeping was requested outside a Tokio runtime.
    #[error("Time-based sweeping requires a running Tokio runtime")]
    NoRuntime,
}
