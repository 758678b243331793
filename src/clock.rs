//! Time sources for the limiter.
//!
//! All timestamps handled by the engine are `u64` nanoseconds measured from an
//! arbitrary, clock-specific origin. Algorithms only ever look at differences
//! between two readings of the same clock, and at `now / window` for window
//! alignment, so the origin matters only when several limiter instances must
//! agree on time; such instances take a [`SharedClock`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Nanoseconds per second.
pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// `d` in nanoseconds, or `None` past `u64::MAX` (about 584 years).
pub fn duration_nanos(d: Duration) -> Option<u64> {
    u64::try_from(d.as_nanos()).ok()
}

/// Source of the current time in nanoseconds.
///
/// Implementations must be thread-safe. The engine tolerates a clock that
/// occasionally steps backwards: every algorithm clamps negative deltas to
/// zero and logs the anomaly.
pub trait Clock: Send + Sync + 'static {
    /// Current time in nanoseconds.
    fn now(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> u64 {
        (**self).now()
    }
}

/// Clock whose readings mean the same instant in every process.
///
/// Limiters sharing a store compare timestamps written by other instances,
/// so they only accept a clock with a common origin. [`MonotonicClock`]
/// counts from its own creation and is rejected at compile time:
///
/// ```compile_fail
/// use ratelimit_engine::clock::{MonotonicClock, SharedClock};
///
/// fn shared<C: SharedClock>(_: C) {}
/// shared(MonotonicClock::new());
/// ```
pub trait SharedClock: Clock {}

impl<C: SharedClock + ?Sized> SharedClock for Arc<C> {}

/// Monotonic clock backed by [`Instant`], counting from its creation.
///
/// This is the default clock of a local limiter.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock whose origin is the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> u64 {
        duration_nanos(self.origin.elapsed()).unwrap_or(u64::MAX)
    }
}

/// Wall clock: nanoseconds since the Unix epoch.
///
/// Windows computed from this clock line up across processes, which is what
/// a shared store needs. It is not monotonic; backwards steps are handled as
/// clock anomalies.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => duration_nanos(d).unwrap_or(u64::MAX),
            Err(e) => {
                tracing::warn!(
                    target: "ratelimit_engine::clock",
                    behind = ?e.duration(),
                    "system clock is before the Unix epoch"
                );
                0
            }
        }
    }
}

impl SharedClock for SystemClock {}

/// Manually driven clock for deterministic tests and simulations.
///
/// Clones share the same underlying time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock reading `start_nanos`.
    pub fn new(start_nanos: u64) -> Self {
        Self {
            nanos: Arc::new(AtomicU64::new(start_nanos)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let by = duration_nanos(by).unwrap_or(u64::MAX);
        let _ = self
            .nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_add(by)));
    }

    /// Set the clock to an absolute reading, possibly in the past.
    pub fn set(&self, nanos: u64) {
        self.nanos.store(nanos, Ordering::SeqCst);
    }

    /// Set the clock to an absolute reading in seconds.
    pub fn set_secs_f64(&self, secs: f64) {
        self.set((secs * NANOS_PER_SEC as f64).round() as u64);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }
}

/// Clones share one reading, so instances given clones of the same clock
/// agree on time.
impl SharedClock for ManualClock {}
