//! Token bucket rate limiter implementation.
//!
//! Classic token bucket with lazy, fractional refill.

use super::backend::{KeyStore, RateLimiter};
use super::clock::{Clock, SystemClock};
use super::table::StateTable;
use crate::error::{Result, TollgateError};

/// Bucket state for one key.
#[derive(Debug)]
struct Bucket {
    /// Current token count, fractional so slow refills are not lost
    tokens: f64,
    /// Last time tokens were added
    last_refill: u64,
}

/// Token bucket rate limiter.
///
/// Each key owns a bucket holding up to `capacity` tokens, initially full.
/// Tokens flow back in at `refill_rate` per second; an admitted request
/// takes exactly one. Refill happens only when a request arrives, there is
/// no background timer. Short bursts are bounded by `capacity`, long-run
/// throughput by `refill_rate`.
pub struct TokenBucket<C = SystemClock> {
    /// Maximum tokens (bucket capacity).
    capacity: u64,
    /// Tokens added per second.
    refill_rate: f64,
    buckets: StateTable<Bucket>,
    clock: C,
}

impl TokenBucket<SystemClock> {
    /// Create a token bucket using the system clock.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum burst size, and the initial token count
    /// * `refill_rate` - Tokens added per second
    pub fn new(capacity: u64, refill_rate: f64) -> Result<Self> {
        Self::with_clock(capacity, refill_rate, SystemClock)
    }
}

impl<C: Clock> TokenBucket<C> {
    /// Create a token bucket reading time from `clock`.
    pub fn with_clock(capacity: u64, refill_rate: f64, clock: C) -> Result<Self> {
        let capacity = super::positive_quota("capacity", capacity)?;
        if !(refill_rate.is_finite() && refill_rate > 0.0) {
            return Err(TollgateError::invalid("refill_rate", refill_rate));
        }

        Ok(Self {
            capacity,
            refill_rate,
            buckets: StateTable::new(),
            clock,
        })
    }

    /// Get the bucket capacity.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Get the refill rate in tokens per second.
    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    fn tokens_for(&self, elapsed_ms: u64) -> f64 {
        (elapsed_ms as f64 / 1000.0) * self.refill_rate
    }
}

impl<C: Clock> RateLimiter for TokenBucket<C> {
    fn allow(&self, key: &str) -> bool {
        let now = self.clock.now_millis();
        let capacity = self.capacity as f64;

        self.buckets.with_state(
            key,
            || Bucket {
                tokens: capacity,
                last_refill: now,
            },
            |bucket| {
                let added = self.tokens_for(now.saturating_sub(bucket.last_refill));
                if added > 0.0 {
                    bucket.tokens = (bucket.tokens + added).min(capacity);
                    bucket.last_refill = now;
                }

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    true
                } else {
                    false
                }
            },
        )
    }
}

impl<C: Clock> KeyStore for TokenBucket<C> {
    fn key_count(&self) -> usize {
        self.buckets.len()
    }

    /// Drop buckets that would be full by now; a new bucket starts full.
    fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let capacity = self.capacity as f64;
        self.buckets.sweep(|bucket| {
            bucket.tokens + self.tokens_for(now.saturating_sub(bucket.last_refill)) >= capacity
        })
    }

    fn clear(&self) {
        self.buckets.clear();
    }
}
