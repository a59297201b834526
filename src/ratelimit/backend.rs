//! Traits shared by every rate limiting algorithm.

use std::sync::Arc;

/// Trait for rate limiter implementations.
///
/// Every algorithm answers the same question: may a request identified by
/// `key` proceed right now? Implementations must be safe to call from many
/// threads at once, for the same or different keys, without the caller
/// adding any locking of its own.
pub trait RateLimiter: Send + Sync {
    /// Decide whether a request for `key` is admitted.
    ///
    /// Returns `true` to admit, `false` to deny. An admission may update the
    /// state recorded for `key`.
    fn allow(&self, key: &str) -> bool;
}

impl<L: RateLimiter + ?Sized> RateLimiter for Arc<L> {
    fn allow(&self, key: &str) -> bool {
        (**self).allow(key)
    }
}

impl<L: RateLimiter + ?Sized> RateLimiter for Box<L> {
    fn allow(&self, key: &str) -> bool {
        (**self).allow(key)
    }
}

/// Access to the per-key records a limiter keeps.
///
/// Records are created lazily and are never dropped by [`RateLimiter::allow`].
/// Long-running callers with many distinct keys should call [`sweep`]
/// periodically.
///
/// [`sweep`]: KeyStore::sweep
pub trait KeyStore {
    /// Number of keys currently tracked.
    fn key_count(&self) -> usize;

    /// Drop records that no longer influence any decision.
    ///
    /// A record is only removed when a freshly created one would decide
    /// identically, so sweeping never changes admission outcomes. Returns the
    /// number of records removed.
    fn sweep(&self) -> usize;

    /// Forget every key.
    fn clear(&self);
}
