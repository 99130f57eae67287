//! Per-key token bucket rate limiter
//!
//! Each key owns one bucket. Refill is computed lazily from elapsed time on
//! every admission check; nothing runs in the background. The check and the
//! decrement happen under the bucket's own lock.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};

/// Rate limiter configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    /// Maximum number of tokens a bucket holds (burst size)
    pub capacity: f64,
    /// Tokens added per second
    pub refill_per_second: f64,
}

impl RateLimitConfig {
    #[must_use]
    pub fn new(capacity: f64, refill_per_second: f64) -> Self {
        Self {
            capacity,
            refill_per_second,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(20.0, 10.0)
    }
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn full(config: &RateLimitConfig, now: Instant) -> Self {
        Self {
            tokens: config.capacity,
            last_refill: now,
        }
    }

    fn try_take(&mut self, config: &RateLimitConfig, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now.max(self.last_refill);
        self.tokens = (self.tokens + elapsed * config.refill_per_second).min(config.capacity);

        if self.tokens < 1.0 {
            return false;
        }
        self.tokens -= 1.0;
        true
    }
}

/// Keyed token bucket rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    enabled: bool,
    buckets: Mutex<HashMap<String, Arc<Mutex<TokenBucket>>>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            enabled: true,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// A limiter that admits everything
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new(RateLimitConfig::default())
        }
    }

    /// Try to consume one token for `key`
    pub fn admit(&self, key: &str) -> bool {
        self.admit_at(key, Instant::now())
    }

    /// `admit` evaluated at an explicit instant
    pub fn admit_at(&self, key: &str, now: Instant) -> bool {
        if !self.enabled {
            return true;
        }

        let bucket = {
            let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
            buckets
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(TokenBucket::full(&self.config, now))))
                .clone()
        };

        let mut bucket = bucket.lock().unwrap_or_else(PoisonError::into_inner);
        bucket.try_take(&self.config, now)
    }

    /// Drop the bucket for `key`
    pub fn forget(&self, key: &str) {
        self.buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Number of keys currently tracked
    pub fn tracked_keys(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
