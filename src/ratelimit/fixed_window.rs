//! Fixed window counter.

use std::time::Duration;

use super::backend::{KeyStore, RateLimiter};
use super::clock::{Clock, SystemClock};
use super::table::StateTable;
use crate::error::Result;

/// Counter state for one key.
#[derive(Debug)]
struct WindowState {
    /// Which window `count` belongs to
    window_id: u64,
    /// Requests seen in that window, including denied ones
    count: u64,
}

/// Rate limiter that counts requests per epoch-aligned window.
///
/// Time is cut into windows of `window` length starting at the Unix epoch,
/// and each key gets `max_requests` admissions per window. The counter
/// forgets everything at a window boundary, so a caller that bursts at the
/// end of one window and again at the start of the next can get up to twice
/// the quota through in a short span. Use [`SlidingWindowLog`] or
/// [`SlidingWindowCounter`] when that matters.
///
/// [`SlidingWindowLog`]: super::SlidingWindowLog
/// [`SlidingWindowCounter`]: super::SlidingWindowCounter
pub struct FixedWindowCounter<C = SystemClock> {
    max_requests: u64,
    window_ms: u64,
    states: StateTable<WindowState>,
    clock: C,
}

impl FixedWindowCounter<SystemClock> {
    /// Create a fixed window counter using the system clock.
    pub fn new(max_requests: u64, window: Duration) -> Result<Self> {
        Self::with_clock(max_requests, window, SystemClock)
    }
}

impl<C: Clock> FixedWindowCounter<C> {
    /// Create a fixed window counter reading time from `clock`.
    pub fn with_clock(max_requests: u64, window: Duration, clock: C) -> Result<Self> {
        Ok(Self {
            max_requests: super::positive_quota("max_requests", max_requests)?,
            window_ms: super::window_millis(window)?,
            states: StateTable::new(),
            clock,
        })
    }

    /// Get the per-window quota.
    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    /// Get the window length.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    fn current_window(&self) -> u64 {
        self.clock.now_millis() / self.window_ms
    }
}

impl<C: Clock> RateLimiter for FixedWindowCounter<C> {
    fn allow(&self, key: &str) -> bool {
        let window_id = self.current_window();

        self.states.with_state(
            key,
            || WindowState { window_id, count: 0 },
            |state| {
                if state.window_id != window_id {
                    state.window_id = window_id;
                    state.count = 0;
                }
                state.count += 1;
                state.count <= self.max_requests
            },
        )
    }
}

impl<C: Clock> KeyStore for FixedWindowCounter<C> {
    fn key_count(&self) -> usize {
        self.states.len()
    }

    fn sweep(&self) -> usize {
        let window_id = self.current_window();
        self.states.sweep(|state| state.window_id < window_id)
    }

    fn clear(&self) {
        self.states.clear();
    }
}
