//! Retry policies for connection establishment and reconnection.

use std::time::Duration;

/// Generator of exponentially growing retry delays: the delay starts at
/// `initial_delay` and doubles on every failure up to `max_delay`, optionally
/// giving up after `retry_limit` attempts.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    max_delay: Duration,
    next_delay: Duration,
    retry_limit: Option<u32>,
    retry_count: u32,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff generator.
    pub fn new(max_delay: Duration, retry_limit: Option<u32>, initial_delay: Duration) -> Self {
        Self {
            max_delay,
            next_delay: initial_delay,
            retry_limit,
            retry_count: 0,
        }
    }
}

impl Iterator for ExponentialBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        if self.retry_limit.is_some_and(|limit| self.retry_count >= limit) {
            return None;
        }

        let delay = self.next_delay;
        self.next_delay = (self.next_delay * 2).min(self.max_delay);
        self.retry_count += 1;
        Some(delay)
    }
}

/// The retry behaviour of a session: how often and how long to try reconnecting after a
/// channel fault. Success resets the sequence.
#[derive(Debug, Clone)]
pub struct SessionRetryPolicy {
    initial_delay: Duration,
    max_delay: Duration,
    retry_limit: Option<u32>,
}

impl SessionRetryPolicy {
    /// The default starting delay between reconnect attempts.
    pub const DEFAULT_INITIAL_DELAY_MS: u64 = 2_000;
    /// The default ceiling the delay doubles up to.
    pub const DEFAULT_MAX_DELAY_MS: u64 = 20_000;

    /// Create a session retry policy. A `retry_limit` of `None` retries forever.
    pub fn new(max_delay: Duration, retry_limit: Option<u32>, initial_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            retry_limit,
        }
    }

    /// A policy that retries forever with the default delays.
    pub fn infinity() -> Self {
        Self::new(
            Duration::from_millis(Self::DEFAULT_MAX_DELAY_MS),
            None,
            Duration::from_millis(Self::DEFAULT_INITIAL_DELAY_MS),
        )
    }

    /// A policy that never retries, failing on the first error.
    pub fn never() -> Self {
        Self::new(
            Duration::from_millis(Self::DEFAULT_MAX_DELAY_MS),
            Some(0),
            Duration::from_millis(Self::DEFAULT_INITIAL_DELAY_MS),
        )
    }

    /// Begin a new backoff sequence.
    pub fn new_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.max_delay, self.retry_limit, self.initial_delay)
    }
}

impl Default for SessionRetryPolicy {
    fn default() -> Self {
        Self::infinity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_to_ceiling() {
        let mut backoff = SessionRetryPolicy::infinity().new_backoff();
        assert_eq!(backoff.next(), Some(Duration::from_millis(2_000)));
        assert_eq!(backoff.next(), Some(Duration::from_millis(4_000)));
        assert_eq!(backoff.next(), Some(Duration::from_millis(8_000)));
        assert_eq!(backoff.next(), Some(Duration::from_millis(16_000)));
        assert_eq!(backoff.next(), Some(Duration::from_millis(20_000)));
        assert_eq!(backoff.next(), Some(Duration::from_millis(20_000)));
    }

    #[test]
    fn limit_is_honoured() {
        let policy = SessionRetryPolicy::new(
            Duration::from_secs(20),
            Some(2),
            Duration::from_secs(2),
        );
        let mut backoff = policy.new_backoff();
        assert!(backoff.next().is_some());
        assert!(backoff.next().is_some());
        assert!(backoff.next().is_none());

        assert!(SessionRetryPolicy::never().new_backoff().next().is_none());
    }
}
