//! Integration tests for rate limiting algorithms.

mod common;

use std::collections::VecDeque;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ratelimit_engine::{
    Algorithm, AlgorithmKind, FixedWindow, LeakyBucket, ManualClock, Quota, SlidingLog,
    SlidingWindow, TokenBucket,
};

use common::{manual_limiter, secs};

#[test]
fn test_token_bucket_scenario() {
    let clock = ManualClock::new(0);
    let limiter = manual_limiter(TokenBucket, Quota::per_second(5).with_refill_rate(1.0), &clock);

    for i in 1..=5 {
        assert!(limiter.allow("client").is_allowed(), "Request {} should be allowed", i);
    }
    let decision = limiter.allow("client");
    assert!(decision.is_denied(), "6th request should be denied");
    assert_eq!(decision.retry_after(), Some(Duration::from_secs(1)));

    clock.set_secs_f64(1.0);
    assert!(limiter.allow("client").is_allowed());
    assert!(limiter.allow("client").is_denied());
}

#[test]
fn test_bucket_burst_bound() {
    let quota = Quota::new(8, Duration::from_secs(4));
    for kind in [AlgorithmKind::TokenBucket, AlgorithmKind::LeakyBucket] {
        let clock = ManualClock::new(secs(100.0));
        let limiter = manual_limiter(kind, quota.clone(), &clock);

        let admitted = (0..20).filter(|_| limiter.allow("k").is_allowed()).count();
        assert_eq!(admitted, 8, "{kind}");
    }
}

#[test]
fn test_bucket_refill_convergence() {
    let quota = Quota::new(4, Duration::from_secs(1)).with_refill_rate(2.0);
    for kind in [AlgorithmKind::TokenBucket, AlgorithmKind::LeakyBucket] {
        let clock = ManualClock::new(0);
        let limiter = manual_limiter(kind, quota.clone(), &clock);
        for _ in 0..4 {
            limiter.allow("k");
        }

        clock.advance(Duration::from_millis(500));
        let admitted = (0..4).filter(|_| limiter.allow("k").is_allowed()).count();
        assert_eq!(admitted, 1, "{kind}");
    }
}

#[test]
fn test_fixed_window_boundary_burst() {
    let clock = ManualClock::new(0);
    let limiter = manual_limiter(FixedWindow, Quota::new(10, Duration::from_secs(10)), &clock);

    clock.set_secs_f64(9.9);
    let tail = (0..20).filter(|_| limiter.allow("k").is_allowed()).count();
    clock.set_secs_f64(10.1);
    let head = (0..20).filter(|_| limiter.allow("k").is_allowed()).count();

    // 2C within 200ms.
    assert_eq!(tail + head, 20);
}

/// Admission times of `algorithm` for a seeded random arrival sequence.
fn admitted_times<A: Algorithm>(algorithm: A, quota: &Quota, seed: u64, arrivals: usize) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut state = algorithm.initial_state(quota, 0);
    let mut now = 0;
    let mut admitted = Vec::new();

    for _ in 0..arrivals {
        // Bursts of simultaneous arrivals mixed with gaps up to half a window.
        if rng.gen_bool(0.7) {
            now += rng.gen_range(0..quota.window_nanos() / 2);
        }
        let cost = if rng.gen_bool(0.9) { 1 } else { rng.gen_range(1..=quota.capacity()) };
        if algorithm.decide(&mut state, quota, now, cost).is_allowed() {
            admitted.extend(std::iter::repeat_n(now, cost as usize));
        }
    }
    admitted
}

/// Largest number of admissions inside any closed interval of length `window`.
fn max_in_window(times: &[u64], window: u64) -> usize {
    let mut open: VecDeque<u64> = VecDeque::new();
    let mut max = 0;
    for &t in times {
        open.push_back(t);
        while open.front().is_some_and(|&first| first + window < t) {
            open.pop_front();
        }
        max = max.max(open.len());
    }
    max
}

#[test]
fn test_sliding_log_is_exact() {
    let quota = Quota::new(10, Duration::from_secs(1));
    for seed in 0..20 {
        let times = admitted_times(SlidingLog, &quota, seed, 2_000);
        assert!(!times.is_empty());
        assert!(
            max_in_window(&times, quota.window_nanos()) <= 10,
            "seed {seed} exceeded the capacity"
        );
    }
}

#[test]
fn test_sliding_window_approximation_bound() {
    for sub_windows in [1, 4] {
        let quota = Quota::new(10, Duration::from_secs(1)).with_sub_windows(sub_windows);
        for seed in 0..20 {
            let times = admitted_times(SlidingWindow, &quota, seed, 2_000);
            let max = max_in_window(&times, quota.window_nanos());
            assert!(max <= 20, "N={sub_windows} seed {seed}: {max} in one window");
        }
    }
}

#[test]
fn test_sliding_window_converges_to_log() {
    let window = Duration::from_secs(16);
    let retry_at = secs(18.0) + 1;

    let admits_after_burst = |kind: AlgorithmKind, quota: Quota| {
        let mut state = kind.initial_state(&quota, 0);
        for _ in 0..16 {
            assert!(kind.decide(&mut state, &quota, 0, 1).is_allowed());
        }
        (0..16)
            .filter(|_| kind.decide(&mut state, &quota, retry_at, 1).is_allowed())
            .count()
    };

    let coarse = admits_after_burst(AlgorithmKind::SlidingWindow, Quota::new(16, window));
    let medium = admits_after_burst(AlgorithmKind::SlidingWindow, Quota::new(16, window).with_sub_windows(4));
    let fine = admits_after_burst(AlgorithmKind::SlidingWindow, Quota::new(16, window).with_sub_windows(16));
    let exact = admits_after_burst(AlgorithmKind::SlidingLog, Quota::new(16, window));

    assert_eq!((coarse, medium, fine, exact), (3, 9, 16, 16));
}

#[test]
fn test_leaky_bucket_retry_after_is_accurate() {
    let quota = Quota::new(3, Duration::from_secs(3));
    let mut state = LeakyBucket.initial_state(&quota, 0);
    for _ in 0..3 {
        LeakyBucket.decide(&mut state, &quota, 0, 1);
    }

    let denied = LeakyBucket.decide(&mut state, &quota, secs(0.25), 1);
    let wait = denied.retry_after().unwrap().as_nanos() as u64;
    assert_eq!(wait, secs(0.75));

    assert!(LeakyBucket.decide(&mut state, &quota, secs(0.25) + wait - 1, 1).is_denied());
    assert!(LeakyBucket.decide(&mut state, &quota, secs(0.25) + wait, 1).is_allowed());
}

#[test]
fn test_retry_after_is_never_early() {
    let quota = Quota::new(5, Duration::from_secs(2));
    for kind in [
        AlgorithmKind::TokenBucket,
        AlgorithmKind::LeakyBucket,
        AlgorithmKind::FixedWindow,
        AlgorithmKind::SlidingLog,
    ] {
        let mut state = kind.initial_state(&quota, 0);
        for _ in 0..5 {
            kind.decide(&mut state, &quota, secs(0.3), 1);
        }
        let denied = kind.decide(&mut state, &quota, secs(0.3), 1);
        let retry = denied.retry_after().unwrap().as_nanos() as u64;

        let mut probe = state.clone();
        assert!(kind.decide(&mut probe, &quota, secs(0.3) + retry - 1, 1).is_denied(), "{kind}");
        assert!(kind.decide(&mut state, &quota, secs(0.3) + retry, 1).is_allowed(), "{kind}");
    }
}
