//! Rate limiting algorithms and their configuration.
//!
//! Four algorithms implement [`RateLimiter`]:
//!
//! - [`FixedWindowCounter`]: a counter per epoch-aligned window
//! - [`SlidingWindowLog`]: exact trailing-window bound from a timestamp log
//! - [`SlidingWindowCounter`]: weighted blend of the current and previous window
//! - [`TokenBucket`]: bounded bursts refilled at a steady rate
//!
//! None of them perform I/O or log; callers decide what a denial means.

mod backend;
mod clock;
mod fixed_window;
mod limiter;
mod rules;
mod sliding_counter;
mod sliding_log;
mod table;
mod token_bucket;

pub use backend::{KeyStore, RateLimiter};
pub use clock::{Clock, ManualClock, SystemClock};
pub use fixed_window::FixedWindowCounter;
pub use limiter::Limiter;
pub use rules::{LimitPolicy, RulesConfig};
pub use sliding_counter::SlidingWindowCounter;
pub use sliding_log::SlidingWindowLog;
pub use token_bucket::TokenBucket;

use std::time::Duration;

use crate::error::{Result, TollgateError};

/// Validate a request quota or bucket capacity.
fn positive_quota(param: &'static str, value: u64) -> Result<u64> {
    if value == 0 {
        return Err(TollgateError::invalid(param, value));
    }
    Ok(value)
}

/// Validate a window length and convert it to whole milliseconds.
fn window_millis(window: Duration) -> Result<u64> {
    let millis = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
    if millis == 0 {
        return Err(TollgateError::invalid("window", format!("{:?}", window)));
    }
    Ok(millis)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    use super::RateLimiter;

    /// Release `callers` threads at once against a single key and count how
    /// many were admitted.
    pub(crate) fn admitted_concurrently<L: RateLimiter>(limiter: &L, callers: usize) -> usize {
        let barrier = Barrier::new(callers);
        let admitted = AtomicUsize::new(0);

        thread::scope(|s| {
            for _ in 0..callers {
                s.spawn(|| {
                    barrier.wait();
                    if limiter.allow("shared") {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        admitted.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_millis_rejects_sub_millisecond() {
        assert!(window_millis(Duration::ZERO).is_err());
        assert!(window_millis(Duration::from_micros(999)).is_err());
        assert_eq!(window_millis(Duration::from_secs(2)).unwrap(), 2_000);
    }

    #[test]
    fn test_positive_quota() {
        assert!(matches!(
            positive_quota("max_requests", 0),
            Err(TollgateError::InvalidConfig { param: "max_requests", .. })
        ));
        assert_eq!(positive_quota("max_requests", 3).unwrap(), 3);
    }
}
