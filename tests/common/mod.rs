//! Helpers shared by the integration tests.

use ratelimit_engine::{Algorithm, Limiter, LimiterBuilder, ManualClock, Quota, SweepInterval};

/// Route `tracing` output through the test harness. `RUST_LOG` selects what
/// is shown.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Limiter on a manual clock with manual sweeping.
#[allow(dead_code)]
pub fn manual_limiter<A: Algorithm>(algorithm: A, quota: Quota, clock: &ManualClock) -> Limiter<A, ManualClock> {
    init_tracing();
    LimiterBuilder::new(algorithm, quota)
        .clock(clock.clone())
        .sweep_interval(SweepInterval::Manual)
        .build()
        .unwrap()
}

/// Seconds to nanoseconds.
#[allow(dead_code)]
pub fn secs(s: f64) -> u64 {
    (s * 1e9).round() as u64
}
