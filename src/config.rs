//! Pool configuration options

use crate::errors::{PoolError, PoolResult};
use std::time::Duration;

/// Which hooks [`Pool::acquire`](crate::Pool::acquire) runs after taking a
/// resource from the queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AcquireHookPolicy {
    /// Run `pre_acquire` twice: once before the checkout is recorded and
    /// once after. `post_acquire` is never called.
    #[default]
    RepeatPreAcquire,

    /// Run `pre_acquire` before the checkout is recorded and
    /// `post_acquire` after it.
    PreThenPost,
}

/// What happens to a resource whose `pre_acquire`, `post_acquire` or
/// `pre_release` hook failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HookFailurePolicy {
    /// Drop the resource. The pool runs one short until it is refilled.
    #[default]
    Discard,

    /// Put the resource back into the pool despite the failure
    Requeue,

    /// Drop the resource and queue a fresh one created with `add()`. If
    /// creation fails the pool runs one short.
    Replace,
}

/// Configuration for resource pool behavior
///
/// # Examples
///
/// ```
/// use esox_resourcepool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_pool_size(20)
///     .with_timeout(Duration::from_millis(250))
///     .with_eviction_test(Duration::from_secs(30));
///
/// assert_eq!(config.pool_size, 20);
/// assert!(config.eviction_test);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfiguration {
    /// Number of resources in the pool, fixed for its lifetime
    pub pool_size: usize,

    /// Maximum wait for an acquire, for each slot of a refresh pass and for
    /// a release into a full queue
    pub timeout: Duration,

    /// Whether a background task periodically refreshes the pool
    pub eviction_test: bool,

    /// Interval between refresh passes
    pub evict_test_schedule: Duration,

    /// Hooks run by acquire after taking a resource from the queue
    pub acquire_hooks: AcquireHookPolicy,

    /// What happens to a resource whose lifecycle hook failed
    pub hook_failure: HookFailurePolicy,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            pool_size: 10,
            timeout: Duration::from_secs(1),
            eviction_test: false,
            evict_test_schedule: Duration::from_secs(1),
            acquire_hooks: AcquireHookPolicy::default(),
            hook_failure: HookFailurePolicy::default(),
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of resources in the pool
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Set the acquire timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable the background refresh task, running every `schedule`
    pub fn with_eviction_test(mut self, schedule: Duration) -> Self {
        self.eviction_test = true;
        self.evict_test_schedule = schedule;
        self
    }

    /// Set which hooks acquire runs
    pub fn with_acquire_hooks(mut self, policy: AcquireHookPolicy) -> Self {
        self.acquire_hooks = policy;
        self
    }

    /// Set the hook failure policy
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::{HookFailurePolicy, PoolConfiguration};
    ///
    /// let config = PoolConfiguration::new()
    ///     .with_hook_failure_policy(HookFailurePolicy::Replace);
    ///
    /// assert_eq!(config.hook_failure, HookFailurePolicy::Replace);
    /// ```
    pub fn with_hook_failure_policy(mut self, policy: HookFailurePolicy) -> Self {
        self.hook_failure = policy;
        self
    }

    /// Check the configuration for values the pool cannot run with
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::new().with_pool_size(0);
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> PoolResult<()> {
        if self.pool_size == 0 {
            return Err(PoolError::InvalidConfiguration(
                "pool_size must be greater than zero".to_string(),
            ));
        }
        if self.eviction_test && self.evict_test_schedule.is_zero() {
            return Err(PoolError::InvalidConfiguration(
                "evict_test_schedule must be non-zero when eviction_test is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfiguration::default();
        assert_eq!(config.pool_size, 10);
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert!(!config.eviction_test);
        assert_eq!(config.acquire_hooks, AcquireHookPolicy::RepeatPreAcquire);
        assert_eq!(config.hook_failure, HookFailurePolicy::Discard);
    }

    #[test]
    fn test_zero_schedule_rejected_only_with_eviction() {
        let mut config = PoolConfiguration::new();
        config.evict_test_schedule = Duration::ZERO;
        assert!(config.validate().is_ok());

        let config = config.with_eviction_test(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(PoolError::InvalidConfiguration(_))
        ));
    }
}
