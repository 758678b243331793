//! Per-client state storage.
//!
//! Local limiters keep state in [`MemoryStorage`], a concurrent map of
//! per-key locked entries with idle-entry sweeping. Limiters shared between
//! processes delegate to a [`SharedStore`] implementation instead.

mod entry;
mod memory_gc;
mod sweeper;

pub use memory_gc::{MemoryStorage, SweepConfig, SweepInterval};
pub(crate) use sweeper::Sweeper;

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Result, StorageError};

/// Storage shared by several limiter instances, typically a remote
/// key-value service.
///
/// All operations are async; a limiter bounds each call with its store
/// timeout and applies its failure policy when a call fails.
///
/// # Example
///
/// ```ignore
/// use ratelimit_engine::storage::{SharedStore, decode_state, encode_state};
///
/// impl SharedStore for MyStore {
///     async fn execute_atomic<S, F, T>(&self, key: &str, ttl: Duration, operation: F) -> Result<T>
///     where
///         S: Serialize + DeserializeOwned + Send,
///         F: FnOnce(Option<S>) -> (S, T) + Send,
///         T: Send,
///     {
///         let mut txn = self.begin(key).await?;
///         let current = txn.get().map(|b| decode_state(&b)).transpose()?;
///         let (next, out) = operation(current);
///         txn.commit(encode_state(&next)?, ttl).await?;
///         Ok(out)
///     }
///     // ...
/// }
/// ```
pub trait SharedStore: Send + Sync + 'static {
    /// Atomically add `delta` to the counter of `key` for the window
    /// starting at `window_start`.
    ///
    /// A counter belonging to a different window is replaced by a fresh one
    /// holding `delta`. Returns the count after incrementing.
    fn increment_and_get(
        &self,
        key: &str,
        delta: u64,
        window_start: u64,
        ttl: Duration,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Execute an atomic read-modify-write operation.
    ///
    /// The operation receives the current state (if any) and returns the new
    /// state to store along with a result value. No other writer may touch
    /// `key` between the read and the write.
    fn execute_atomic<S, F, T>(
        &self,
        key: &str,
        ttl: Duration,
        operation: F,
    ) -> impl Future<Output = Result<T>> + Send
    where
        S: Serialize + DeserializeOwned + Send,
        F: FnOnce(Option<S>) -> (S, T) + Send,
        T: Send;

    /// Delete the state of `key`. Succeeds if the key does not exist.
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}

impl<T: SharedStore + ?Sized> SharedStore for std::sync::Arc<T> {
    async fn increment_and_get(
        &self,
        key: &str,
        delta: u64,
        window_start: u64,
        ttl: Duration,
    ) -> Result<u64> {
        (**self).increment_and_get(key, delta, window_start, ttl).await
    }

    async fn execute_atomic<S, F, R>(&self, key: &str, ttl: Duration, operation: F) -> Result<R>
    where
        S: Serialize + DeserializeOwned + Send,
        F: FnOnce(Option<S>) -> (S, R) + Send,
        R: Send,
    {
        (**self).execute_atomic(key, ttl, operation).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }
}

/// Serialize algorithm state for stores that persist bytes.
pub fn encode_state<S: Serialize>(state: &S) -> Result<Vec<u8>> {
    serde_json::to_vec(state).map_err(|e| StorageError::Serialization(e.to_string()).into())
}

/// Inverse of [`encode_state`].
pub fn decode_state<S: DeserializeOwned>(bytes: &[u8]) -> Result<S> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()).into())
}
