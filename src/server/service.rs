//! Admission service mapping resources to limiters.

use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Result, TollgateError};
use crate::ratelimit::{
    Clock, KeyStore, LimitPolicy, Limiter, RateLimiter, RulesConfig, SystemClock,
};

/// Outcome of an admission check, ready to be turned into a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The request may proceed
    Allowed,
    /// The request is over its limit
    Limited {
        /// Suggested wait before retrying
        retry_after: Duration,
    },
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed)
    }
}

/// A configured limiter and the policy it was built from.
struct Route<C> {
    policy: LimitPolicy,
    limiter: Limiter<C>,
}

impl<C: Clock> Route<C> {
    fn build(policy: &LimitPolicy, clock: C) -> Result<Self> {
        Ok(Self {
            policy: policy.clone(),
            limiter: policy.build_with_clock(clock)?,
        })
    }
}

/// Selects the limiter for each resource and produces verdicts.
///
/// Every configured resource gets its own limiter instance. Requests for
/// resources without a rule, and requests naming no resource at all, share
/// the default limiter. There every key is stored as `<len>:<resource><key>`
/// (an empty resource for bare keys), so no two resource and key pairs can
/// collide and unknown resources never share quota with each other.
pub struct Gate<C = SystemClock> {
    routes: HashMap<String, Route<C>>,
    fallback: Route<C>,
}

impl Gate<SystemClock> {
    /// Build a gate for `rules` using the system clock.
    pub fn new(rules: &RulesConfig) -> Result<Self> {
        Self::with_clock(rules, SystemClock)
    }
}

impl<C: Clock + Clone> Gate<C> {
    /// Build a gate for `rules`, all limiters reading time from `clock`.
    ///
    /// Fails if any policy has invalid parameters.
    pub fn with_clock(rules: &RulesConfig, clock: C) -> Result<Self> {
        let fallback = Route::build(&rules.default, clock.clone())?;
        let mut routes = HashMap::with_capacity(rules.resources.len());
        for (resource, policy) in &rules.resources {
            let route = Route::build(policy, clock.clone()).map_err(|e| {
                TollgateError::Config(format!("resource '{}': {}", resource, e))
            })?;
            routes.insert(resource.clone(), route);
        }

        Ok(Self { routes, fallback })
    }
}

impl<C: Clock> Gate<C> {
    /// Check a request for `key` against the rule for `resource`.
    ///
    /// `None` selects the default rule directly.
    pub fn check(&self, resource: Option<&str>, key: &str) -> Verdict {
        let (route, allowed) = match resource.and_then(|name| self.routes.get(name)) {
            Some(route) => (route, route.limiter.allow(key)),
            None => {
                let scoped = fallback_key(resource.unwrap_or_default(), key);
                (&self.fallback, self.fallback.limiter.allow(&scoped))
            }
        };

        if allowed {
            debug!(
                resource = resource.unwrap_or_default(),
                key = %key,
                "Request allowed"
            );
            Verdict::Allowed
        } else {
            let retry_after = route.policy.retry_after();
            info!(
                resource = resource.unwrap_or_default(),
                key = %key,
                algorithm = route.policy.algorithm(),
                retry_after_ms = retry_after.as_millis() as u64,
                "Request over limit"
            );
            Verdict::Limited { retry_after }
        }
    }

    /// Sweep idle keys from every limiter, returning how many were removed.
    pub fn sweep(&self) -> usize {
        self.limiters().map(|l| l.sweep()).sum()
    }

    /// Total number of keys tracked across all limiters.
    pub fn key_count(&self) -> usize {
        self.limiters().map(|l| l.key_count()).sum()
    }

    /// Configured resources and their policies, sorted by name.
    pub fn resources(&self) -> Vec<(&str, &LimitPolicy)> {
        let mut resources: Vec<_> = self
            .routes
            .iter()
            .map(|(name, route)| (name.as_str(), &route.policy))
            .collect();
        resources.sort_by_key(|(name, _)| *name);
        resources
    }

    /// Policy applied to resources without their own rule.
    pub fn default_policy(&self) -> &LimitPolicy {
        &self.fallback.policy
    }

    fn limiters(&self) -> impl Iterator<Item = &Limiter<C>> {
        self.routes
            .values()
            .chain(std::iter::once(&self.fallback))
            .map(|route| &route.limiter)
    }
}

/// Key under which the fallback limiter tracks `key` for `resource`.
fn fallback_key(resource: &str, key: &str) -> String {
    format!("{}:{}{}", resource.len(), resource, key)
}
