//! Rate limit rules configuration.
//!
//! A rule names an algorithm and its parameters. Rules are attached to
//! resources (endpoints, APIs, anything the caller wants to limit
//! separately), with a default rule for resources that have none.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::clock::{Clock, SystemClock};
use super::fixed_window::FixedWindowCounter;
use super::limiter::Limiter;
use super::sliding_counter::SlidingWindowCounter;
use super::sliding_log::SlidingWindowLog;
use super::token_bucket::TokenBucket;
use crate::error::{Result, TollgateError};

/// Default quota: 5 requests...
const DEFAULT_MAX_REQUESTS: u64 = 5;
/// ...per 10 second window.
const DEFAULT_WINDOW_MS: u64 = 10_000;

/// Algorithm and parameters for one limiter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum LimitPolicy {
    /// Counter per epoch-aligned window
    FixedWindow { max_requests: u64, window_ms: u64 },
    /// Exact trailing window from admitted timestamps
    SlidingLog { max_requests: u64, window_ms: u64 },
    /// Weighted current and previous window counters
    SlidingCounter { max_requests: u64, window_ms: u64 },
    /// Burst of `capacity`, refilled at `refill_rate` tokens per second
    TokenBucket { capacity: u64, refill_rate: f64 },
}

impl Default for LimitPolicy {
    fn default() -> Self {
        LimitPolicy::FixedWindow {
            max_requests: DEFAULT_MAX_REQUESTS,
            window_ms: DEFAULT_WINDOW_MS,
        }
    }
}

impl LimitPolicy {
    /// Build a limiter for this policy using the system clock.
    pub fn build(&self) -> Result<Limiter> {
        self.build_with_clock(SystemClock)
    }

    /// Build a limiter for this policy reading time from `clock`.
    ///
    /// Fails if any parameter is zero or otherwise out of range.
    pub fn build_with_clock<C: Clock>(&self, clock: C) -> Result<Limiter<C>> {
        let limiter = match *self {
            LimitPolicy::FixedWindow {
                max_requests,
                window_ms,
            } => FixedWindowCounter::with_clock(max_requests, Duration::from_millis(window_ms), clock)?
                .into(),
            LimitPolicy::SlidingLog {
                max_requests,
                window_ms,
            } => SlidingWindowLog::with_clock(max_requests, Duration::from_millis(window_ms), clock)?
                .into(),
            LimitPolicy::SlidingCounter {
                max_requests,
                window_ms,
            } => SlidingWindowCounter::with_clock(
                max_requests,
                Duration::from_millis(window_ms),
                clock,
            )?
            .into(),
            LimitPolicy::TokenBucket {
                capacity,
                refill_rate,
            } => TokenBucket::with_clock(capacity, refill_rate, clock)?.into(),
        };
        Ok(limiter)
    }

    /// How long a denied caller should wait before trying again.
    ///
    /// Window algorithms suggest a full window; the token bucket suggests
    /// the time to refill one token, rounded up to the millisecond.
    pub fn retry_after(&self) -> Duration {
        match *self {
            LimitPolicy::FixedWindow { window_ms, .. }
            | LimitPolicy::SlidingLog { window_ms, .. }
            | LimitPolicy::SlidingCounter { window_ms, .. } => Duration::from_millis(window_ms),
            LimitPolicy::TokenBucket { refill_rate, .. } => {
                // Saturates at u64::MAX for very slow rates.
                Duration::from_millis((1000.0 / refill_rate).ceil() as u64)
            }
        }
    }

    /// Short name of the algorithm.
    pub fn algorithm(&self) -> &'static str {
        match self {
            LimitPolicy::FixedWindow { .. } => "fixed_window",
            LimitPolicy::SlidingLog { .. } => "sliding_log",
            LimitPolicy::SlidingCounter { .. } => "sliding_counter",
            LimitPolicy::TokenBucket { .. } => "token_bucket",
        }
    }
}

/// Rules for every resource, plus a default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Policy for resources without their own entry
    #[serde(default)]
    pub default: LimitPolicy,
    /// Map of resource name to policy
    #[serde(default)]
    pub resources: BTreeMap<String, LimitPolicy>,
}

impl RulesConfig {
    /// Create a configuration with only the default policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse rules from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| TollgateError::Config(format!("Failed to parse rate limit rules: {}", e)))
    }

    /// Add or replace the policy for a resource.
    pub fn with_resource(mut self, resource: impl Into<String>, policy: LimitPolicy) -> Self {
        self.resources.insert(resource.into(), policy);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rules() {
        let yaml = r#"
default:
  algorithm: sliding_counter
  max_requests: 100
  window_ms: 60000
resources:
  login:
    algorithm: sliding_log
    max_requests: 5
    window_ms: 60000
  search:
    algorithm: token_bucket
    capacity: 20
    refill_rate: 2.5
  export:
    algorithm: fixed_window
    max_requests: 10
    window_ms: 3600000
"#;
        let rules = RulesConfig::from_yaml(yaml).unwrap();

        assert_eq!(
            rules.default,
            LimitPolicy::SlidingCounter {
                max_requests: 100,
                window_ms: 60_000
            }
        );
        assert_eq!(rules.resources.len(), 3);
        assert_eq!(
            rules.resources["search"],
            LimitPolicy::TokenBucket {
                capacity: 20,
                refill_rate: 2.5
            }
        );
    }

    #[test]
    fn test_missing_default_uses_fixed_window() {
        let rules = RulesConfig::from_yaml("resources: {}").unwrap();
        assert_eq!(
            rules.default,
            LimitPolicy::FixedWindow {
                max_requests: 5,
                window_ms: 10_000
            }
        );
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        let yaml = r#"
default:
  algorithm: leaky_bucket
  capacity: 5
"#;
        assert!(matches!(
            RulesConfig::from_yaml(yaml),
            Err(TollgateError::Config(_))
        ));
    }

    #[test]
    fn test_build_matches_algorithm() {
        let policies = [
            LimitPolicy::FixedWindow { max_requests: 1, window_ms: 1000 },
            LimitPolicy::SlidingLog { max_requests: 1, window_ms: 1000 },
            LimitPolicy::SlidingCounter { max_requests: 1, window_ms: 1000 },
            LimitPolicy::TokenBucket { capacity: 1, refill_rate: 1.0 },
        ];

        for policy in &policies {
            let limiter = policy.build().unwrap();
            assert_eq!(limiter.algorithm(), policy.algorithm());
        }
    }

    #[test]
    fn test_build_rejects_invalid_parameters() {
        assert!(LimitPolicy::FixedWindow { max_requests: 5, window_ms: 0 }.build().is_err());
        assert!(LimitPolicy::TokenBucket { capacity: 5, refill_rate: 0.0 }.build().is_err());
    }

    #[test]
    fn test_retry_after() {
        let window = LimitPolicy::SlidingLog { max_requests: 5, window_ms: 1500 };
        assert_eq!(window.retry_after(), Duration::from_millis(1500));

        let bucket = LimitPolicy::TokenBucket { capacity: 5, refill_rate: 3.0 };
        assert_eq!(bucket.retry_after(), Duration::from_millis(334));

        let slow = LimitPolicy::TokenBucket { capacity: 5, refill_rate: 0.5 };
        assert_eq!(slow.retry_after(), Duration::from_secs(2));

        let glacial = LimitPolicy::TokenBucket { capacity: 1, refill_rate: 1e-300 };
        assert!(glacial.build().is_ok());
        assert_eq!(glacial.retry_after(), Duration::from_millis(u64::MAX));
    }
}
