//! Algorithm-agnostic limiter handle.

use super::backend::{KeyStore, RateLimiter};
use super::clock::{Clock, SystemClock};
use super::fixed_window::FixedWindowCounter;
use super::sliding_counter::SlidingWindowCounter;
use super::sliding_log::SlidingWindowLog;
use super::token_bucket::TokenBucket;

/// Any of the built-in algorithms behind one concrete type.
///
/// This is what the rules layer hands out, so a resource can switch
/// algorithms in configuration without its caller changing type.
pub enum Limiter<C = SystemClock> {
    FixedWindow(FixedWindowCounter<C>),
    SlidingLog(SlidingWindowLog<C>),
    SlidingCounter(SlidingWindowCounter<C>),
    TokenBucket(TokenBucket<C>),
}

impl<C: Clock> Limiter<C> {
    /// Short name of the algorithm, as used in configuration.
    pub fn algorithm(&self) -> &'static str {
        match self {
            Limiter::FixedWindow(_) => "fixed_window",
            Limiter::SlidingLog(_) => "sliding_log",
            Limiter::SlidingCounter(_) => "sliding_counter",
            Limiter::TokenBucket(_) => "token_bucket",
        }
    }
}

impl<C: Clock> RateLimiter for Limiter<C> {
    fn allow(&self, key: &str) -> bool {
        match self {
            Limiter::FixedWindow(l) => l.allow(key),
            Limiter::SlidingLog(l) => l.allow(key),
            Limiter::SlidingCounter(l) => l.allow(key),
            Limiter::TokenBucket(l) => l.allow(key),
        }
    }
}

impl<C: Clock> KeyStore for Limiter<C> {
    fn key_count(&self) -> usize {
        match self {
            Limiter::FixedWindow(l) => l.key_count(),
            Limiter::SlidingLog(l) => l.key_count(),
            Limiter::SlidingCounter(l) => l.key_count(),
            Limiter::TokenBucket(l) => l.key_count(),
        }
    }

    fn sweep(&self) -> usize {
        match self {
            Limiter::FixedWindow(l) => l.sweep(),
            Limiter::SlidingLog(l) => l.sweep(),
            Limiter::SlidingCounter(l) => l.sweep(),
            Limiter::TokenBucket(l) => l.sweep(),
        }
    }

    fn clear(&self) {
        match self {
            Limiter::FixedWindow(l) => l.clear(),
            Limiter::SlidingLog(l) => l.clear(),
            Limiter::SlidingCounter(l) => l.clear(),
            Limiter::TokenBucket(l) => l.clear(),
        }
    }
}

impl<C> From<FixedWindowCounter<C>> for Limiter<C> {
    fn from(l: FixedWindowCounter<C>) -> Self {
        Limiter::FixedWindow(l)
    }
}

impl<C> From<SlidingWindowLog<C>> for Limiter<C> {
    fn from(l: SlidingWindowLog<C>) -> Self {
        Limiter::SlidingLog(l)
    }
}

impl<C> From<SlidingWindowCounter<C>> for Limiter<C> {
    fn from(l: SlidingWindowCounter<C>) -> Self {
        Limiter::SlidingCounter(l)
    }
}

impl<C> From<TokenBucket<C>> for Limiter<C> {
    fn from(l: TokenBucket<C>) -> Self {
        Limiter::TokenBucket(l)
    }
}
