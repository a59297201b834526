//! Sliding window counter.

use std::time::Duration;

use super::backend::{KeyStore, RateLimiter};
use super::clock::{Clock, SystemClock};
use super::table::StateTable;
use crate::error::Result;

#[derive(Debug)]
struct CounterState {
    window_id: u64,
    current: u64,
    previous: u64,
}

impl CounterState {
    /// Move the counters forward to `window_id`.
    ///
    /// The old current count only becomes the previous count when the windows
    /// are adjacent; after a longer gap there is no history worth carrying.
    fn roll(&mut self, window_id: u64) {
        if self.window_id == window_id {
            return;
        }
        self.previous = if self.window_id.checked_add(1) == Some(window_id) {
            self.current
        } else {
            0
        };
        self.current = 0;
        self.window_id = window_id;
    }
}

/// Rate limiter that approximates a sliding window with two counters.
///
/// The previous window's count is weighted by how much of it still overlaps
/// the trailing window ending now, and added to the current window's count.
/// A request is admitted while that estimate is below `max_requests`. The
/// weight decays linearly across the window, which smooths the boundary
/// burst of [`FixedWindowCounter`] without the per-request memory of
/// [`SlidingWindowLog`].
///
/// [`FixedWindowCounter`]: super::FixedWindowCounter
/// [`SlidingWindowLog`]: super::SlidingWindowLog
pub struct SlidingWindowCounter<C = SystemClock> {
    max_requests: u64,
    window_ms: u64,
    states: StateTable<CounterState>,
    clock: C,
}

impl SlidingWindowCounter<SystemClock> {
    /// Create a sliding window counter using the system clock.
    pub fn new(max_requests: u64, window: Duration) -> Result<Self> {
        Self::with_clock(max_requests, window, SystemClock)
    }
}

impl<C: Clock> SlidingWindowCounter<C> {
    /// Create a sliding window counter reading time from `clock`.
    pub fn with_clock(max_requests: u64, window: Duration, clock: C) -> Result<Self> {
        Ok(Self {
            max_requests: super::positive_quota("max_requests", max_requests)?,
            window_ms: super::window_millis(window)?,
            states: StateTable::new(),
            clock,
        })
    }

    /// Get the quota.
    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    /// Get the window length.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl<C: Clock> RateLimiter for SlidingWindowCounter<C> {
    fn allow(&self, key: &str) -> bool {
        let now = self.clock.now_millis();
        let window_id = now / self.window_ms;
        let position = (now % self.window_ms) as f64 / self.window_ms as f64;
        let overlap = 1.0 - position;

        self.states.with_state(
            key,
            || CounterState {
                window_id,
                current: 0,
                previous: 0,
            },
            |state| {
                state.roll(window_id);

                let estimate = state.previous as f64 * overlap + state.current as f64;
                if estimate < self.max_requests as f64 {
                    state.current += 1;
                    true
                } else {
                    false
                }
            },
        )
    }
}

impl<C: Clock> KeyStore for SlidingWindowCounter<C> {
    fn key_count(&self) -> usize {
        self.states.len()
    }

    fn sweep(&self) -> usize {
        let window_id = self.clock.now_millis() / self.window_ms;
        self.states.sweep(|state| {
            // Two or more windows behind, or one behind with nothing to carry.
            state.window_id.saturating_add(1) < window_id
                || (state.window_id < window_id && state.current == 0)
        })
    }

    fn clear(&self) {
        self.states.clear();
    }
}
