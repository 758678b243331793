//! Background sweeping of idle entries.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::error::{ConfigError, Result};
use crate::storage::MemoryStorage;

/// Handle of a periodic sweep task. Stops the task when dropped.
#[derive(Debug)]
pub(crate) struct Sweeper {
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn a task on the current Tokio runtime that sweeps `storage` every
    /// `interval`. The task ends by itself once the storage is dropped.
    pub fn spawn<S, C>(storage: &Arc<MemoryStorage<S>>, clock: Arc<C>, interval: Duration) -> Result<Self>
    where
        S: Send + 'static,
        C: Clock,
    {
        let handle = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;
        let shutdown = Arc::new(Notify::new());
        let storage: Weak<MemoryStorage<S>> = Arc::downgrade(storage);
        let signal = Arc::clone(&shutdown);

        let task = handle.spawn(async move {
            tracing::debug!(?interval, "sweeper started");
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        let Some(storage) = storage.upgrade() else { break };
                        storage.sweep_at(clock.now());
                    }
                    _ = signal.notified() => {
                        break;
                    }
                }
            }
            tracing::debug!("sweeper stopped");
        });

        Ok(Self { shutdown, task })
    }

    /// Ask the task to stop. Does not wait for it.
    pub fn stop(&self) {
        // Stores a permit, so the task stops even if it is mid-sweep.
        self.shutdown.notify_one();
    }

    /// Whether the task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop();
    }
}
