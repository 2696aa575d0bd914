// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-identity leaky bucket.
//!
//! Buckets drain continuously at `max_requests / window_ms`; a request is
//! admitted while the bucket holds fewer than `max_requests` units. Idle
//! buckets are collected once they have fully drained past a window.

use parking_lot::Mutex;
use reflexive_core::Clock;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Bucket {
    /// Units currently in the bucket (fractional during drain).
    level: f64,
    last_update_ms: u64,
}

/// What the edge needs to answer a request and set the
/// `X-RateLimit-{Limit,Remaining,Reset}` headers.
#[derive(Debug, Clone, PartialEq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch-ms when the bucket will be empty again.
    pub reset_ms: u64,
    /// Seconds to wait, only meaningful when denied.
    pub retry_after_secs: u64,
}

pub struct RateLimiter<C: Clock> {
    max_requests: u32,
    window_ms: u64,
    clock: C,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl<C: Clock> RateLimiter<C> {
    pub fn new(max_requests: u32, window_ms: u64, clock: C) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window_ms: window_ms.max(1),
            clock,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    fn drain_rate_per_ms(&self) -> f64 {
        self.max_requests as f64 / self.window_ms as f64
    }

    /// Account one request for `identity` and decide.
    pub fn check(&self, identity: &str) -> RateDecision {
        let now = self.clock.epoch_ms();
        let rate = self.drain_rate_per_ms();
        let mut buckets = self.buckets.lock();

        // Window-boundary GC: drop buckets that have fully drained.
        buckets.retain(|_, bucket| {
            let elapsed = now.saturating_sub(bucket.last_update_ms) as f64;
            bucket.level - elapsed * rate > 0.0
        });

        let bucket = buckets
            .entry(identity.to_string())
            .or_insert(Bucket { level: 0.0, last_update_ms: now });
        let elapsed = now.saturating_sub(bucket.last_update_ms) as f64;
        bucket.level = (bucket.level - elapsed * rate).max(0.0);
        bucket.last_update_ms = now;

        let allowed = bucket.level + 1.0 <= self.max_requests as f64;
        if allowed {
            bucket.level += 1.0;
        }

        let remaining = (self.max_requests as f64 - bucket.level).floor().max(0.0) as u32;
        let reset_ms = now + (bucket.level / rate).ceil() as u64;
        let retry_after_secs = if allowed {
            0
        } else {
            // Time until one unit drains.
            ((1.0 / rate) / 1000.0).ceil() as u64
        };

        RateDecision {
            allowed,
            limit: self.max_requests,
            remaining,
            reset_ms,
            retry_after_secs,
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().len()
    }
}

#[cfg(test)]
#[path = "rate_limit_tests.rs"]
mod tests;
