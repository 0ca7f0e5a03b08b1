//! Connection cache lifetime policy

use std::time::Duration;

/// Default idle threshold after which a cached client is closed: 1 hour
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(3600);

/// Default period between idle sweeps: 5 minutes
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Default ceiling on client construction (handshake included): 5 seconds
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default ceiling on a single client teardown: 10 seconds
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Slack the cache grants a build past `connect_timeout`.
///
/// Factories apply `connect_timeout` to their own handshake, so a failure
/// they detect at that ceiling is reported as itself instead of racing the
/// outer deadline.
pub const CONNECT_GRACE: Duration = Duration::from_millis(500);

/// Timing rules governing how long cached clients live.
///
/// Entries leave the cache only through idleness or explicit invalidation;
/// there is no capacity bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Inactivity after which an entry is eligible for eviction
    pub idle_timeout: Duration,
    /// How often the background sweep runs
    pub sweep_interval: Duration,
    /// Upper bound on building a new client
    pub connect_timeout: Duration,
    /// Upper bound on closing a client before giving up on it
    pub close_timeout: Duration,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl EvictionPolicy {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Outer deadline on one build attempt, grace included
    #[must_use]
    pub const fn build_deadline(&self) -> Duration {
        self.connect_timeout.saturating_add(CONNECT_GRACE)
    }

    /// Whether an entry idle for `idle` should be evicted
    #[must_use]
    pub fn is_expired(&self, idle: Duration) -> bool {
        idle > self.idle_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults() {
        let policy = EvictionPolicy::default();
        assert_eq!(policy.idle_timeout, Duration::from_secs(3600));
        assert_eq!(policy.sweep_interval, Duration::from_secs(300));
        assert_eq!(policy.connect_timeout, Duration::from_secs(5));
        assert_eq!(policy.close_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_policy_new_matches_default() {
        assert_eq!(EvictionPolicy::new(), EvictionPolicy::default());
    }

    #[test]
    fn test_policy_builders() {
        let policy = EvictionPolicy::new()
            .with_idle_timeout(Duration::from_secs(60))
            .with_sweep_interval(Duration::from_secs(10))
            .with_connect_timeout(Duration::from_secs(2))
            .with_close_timeout(Duration::from_secs(1));

        assert_eq!(policy.idle_timeout, Duration::from_secs(60));
        assert_eq!(policy.sweep_interval, Duration::from_secs(10));
        assert_eq!(policy.connect_timeout, Duration::from_secs(2));
        assert_eq!(policy.close_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_build_deadline_exceeds_connect_timeout() {
        let policy = EvictionPolicy::new();
        assert_eq!(policy.build_deadline(), Duration::from_millis(5500));

        let policy = policy.with_connect_timeout(Duration::from_secs(2));
        assert!(policy.build_deadline() > policy.connect_timeout);
    }

    #[test]
    fn test_is_expired_is_strict() {
        let policy = EvictionPolicy::new();
        assert!(!policy.is_expired(Duration::from_secs(3600)));
        assert!(policy.is_expired(Duration::from_secs(3601)));
        assert!(!policy.is_expired(Duration::ZERO));
    }
}
