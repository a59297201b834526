//! Sliding window log.

use std::collections::VecDeque;
use std::time::Duration;

use super::backend::{KeyStore, RateLimiter};
use super::clock::{Clock, SystemClock};
use super::table::StateTable;
use crate::error::Result;

/// Timestamps of admitted requests for one key, oldest first.
#[derive(Debug, Default)]
struct RequestLog {
    timestamps: VecDeque<u64>,
}

impl RequestLog {
    /// Drop every timestamp that is `window_ms` or more in the past.
    fn evict_expired(&mut self, now: u64, window_ms: u64) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_sub(oldest) < window_ms {
                break;
            }
            self.timestamps.pop_front();
        }
    }
}

/// Rate limiter that remembers when each admitted request happened.
///
/// At any instant, looking back exactly `window`, a key has at most
/// `max_requests` admissions. This is the only exact algorithm in the crate;
/// it pays for it with memory proportional to `max_requests` per key.
pub struct SlidingWindowLog<C = SystemClock> {
    max_requests: u64,
    window_ms: u64,
    logs: StateTable<RequestLog>,
    clock: C,
}

impl SlidingWindowLog<SystemClock> {
    /// Create a sliding window log using the system clock.
    pub fn new(max_requests: u64, window: Duration) -> Result<Self> {
        Self::with_clock(max_requests, window, SystemClock)
    }
}

impl<C: Clock> SlidingWindowLog<C> {
    /// Create a sliding window log reading time from `clock`.
    pub fn with_clock(max_requests: u64, window: Duration, clock: C) -> Result<Self> {
        Ok(Self {
            max_requests: super::positive_quota("max_requests", max_requests)?,
            window_ms: super::window_millis(window)?,
            logs: StateTable::new(),
            clock,
        })
    }

    /// Get the trailing-window quota.
    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    /// Get the window length.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl<C: Clock> RateLimiter for SlidingWindowLog<C> {
    fn allow(&self, key: &str) -> bool {
        let now = self.clock.now_millis();

        self.logs.with_state(key, RequestLog::default, |log| {
            log.evict_expired(now, self.window_ms);

            if (log.timestamps.len() as u64) < self.max_requests {
                log.timestamps.push_back(now);
                true
            } else {
                false
            }
        })
    }
}

impl<C: Clock> KeyStore for SlidingWindowLog<C> {
    fn key_count(&self) -> usize {
        self.logs.len()
    }

    fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let window_ms = self.window_ms;
        self.logs.sweep(|log| {
            log.evict_expired(now, window_ms);
            log.timestamps.is_empty()
        })
    }

    fn clear(&self) {
        self.logs.clear();
    }
}
