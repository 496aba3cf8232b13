//! Exponential backoff with jitter for the accept loop.
//!
//! Persistent accept failures (EMFILE, ENFILE) would otherwise spin the loop.

use std::time::Duration;

use rand::Rng;

/// Consecutive-failure backoff. Call [`Backoff::reset`] after a success.
#[derive(Debug, Clone)]
pub struct Backoff {
    attempt: u32,
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            attempt: 0,
            base,
            max,
        }
    }

    /// Delay before the next attempt; grows with each call.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        let factor = 2u32.saturating_pow(self.attempt - 1);
        let capped = self.base.saturating_mul(factor).min(self.max);

        // Up to 10% jitter
        let jitter_range = capped.as_millis() as u64 / 10;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };
        capped + Duration::from_millis(jitter)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(5), Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_and_caps() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(1000));
        assert!(backoff.next_delay() >= Duration::from_millis(100));
        assert!(backoff.next_delay() >= Duration::from_millis(200));
        for _ in 0..20 {
            let d = backoff.next_delay();
            assert!(d >= Duration::from_millis(1000));
            assert!(d < Duration::from_millis(1100));
        }
    }

    #[test]
    fn reset_starts_over() {
        let mut backoff = Backoff::new(Duration::from_millis(10), Duration::from_secs(1));
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.attempts(), 2);
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert!(backoff.next_delay() < Duration::from_millis(20));
    }
}
