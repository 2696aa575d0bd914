// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use reflexive_core::FakeClock;
use std::time::Duration;

fn limiter(max: u32, window_ms: u64) -> (RateLimiter<FakeClock>, FakeClock) {
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_000_000);
    (RateLimiter::new(max, window_ms, clock.clone()), clock)
}

#[test]
fn n_plus_first_request_in_window_is_denied() {
    let (limiter, _clock) = limiter(3, 60_000);
    for i in 0..3 {
        let decision = limiter.check("key:0");
        assert!(decision.allowed, "request {i} should pass");
    }
    let fourth = limiter.check("key:0");
    assert!(!fourth.allowed);
    assert_eq!(fourth.remaining, 0);
    assert!(fourth.retry_after_secs >= 1);
    assert!(fourth.retry_after_secs <= 60, "Retry-After bounded by the window");
}

#[test]
fn remaining_counts_down() {
    let (limiter, _clock) = limiter(3, 60_000);
    assert_eq!(limiter.check("k").remaining, 2);
    assert_eq!(limiter.check("k").remaining, 1);
    assert_eq!(limiter.check("k").remaining, 0);
}

#[test]
fn identities_have_independent_buckets() {
    let (limiter, _clock) = limiter(1, 60_000);
    assert!(limiter.check("a").allowed);
    assert!(limiter.check("b").allowed);
    assert!(!limiter.check("a").allowed);
}

#[test]
fn bucket_drains_over_time() {
    let (limiter, clock) = limiter(2, 10_000);
    assert!(limiter.check("k").allowed);
    assert!(limiter.check("k").allowed);
    assert!(!limiter.check("k").allowed);

    // Half the window drains one unit.
    clock.advance(Duration::from_millis(5_000));
    assert!(limiter.check("k").allowed);
    assert!(!limiter.check("k").allowed);
}

#[test]
fn idle_buckets_are_collected_at_window_boundaries() {
    let (limiter, clock) = limiter(2, 10_000);
    limiter.check("a");
    limiter.check("b");
    assert_eq!(limiter.bucket_count(), 2);

    clock.advance(Duration::from_millis(20_000));
    limiter.check("c");
    assert_eq!(limiter.bucket_count(), 1, "fully drained buckets are dropped");
}

#[test]
fn reset_is_in_the_future_while_loaded() {
    let (limiter, clock) = limiter(1, 60_000);
    let decision = limiter.check("k");
    assert!(decision.reset_ms > clock.epoch_ms());
}
