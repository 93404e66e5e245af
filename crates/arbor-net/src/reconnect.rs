//! Exponential backoff for transport reconnection.
//!
//! The client retries indefinitely; delays grow from 1 s by 1.5x up to a
//! 30 s cap, and reset to the base the moment a connection succeeds.

use std::time::Duration;

use rand::Rng;

/// Backoff tuning.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first reconnection attempt. Default: 1 s.
    pub initial_delay: Duration,
    /// Multiplier applied after each failed attempt. Default: 1.5.
    pub multiplier: f64,
    /// Delay ceiling. Default: 30 s.
    pub max_delay: Duration,
    /// Jitter factor (0.0–1.0), applied as ±jitter. Default: 0.0.
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            multiplier: 1.5,
            max_delay: Duration::from_millis(30_000),
            jitter: 0.0,
        }
    }
}

/// Tracks consecutive failures and computes the next delay.
#[derive(Debug)]
pub struct Backoff {
    config: BackoffConfig,
    current_delay: Duration,
    attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

impl Backoff {
    /// Creates a backoff tracker from the given config.
    pub fn new(config: BackoffConfig) -> Self {
        let current_delay = config.initial_delay;
        Self {
            config,
            current_delay,
            attempts: 0,
        }
    }

    /// Returns the delay for the next attempt and advances the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current_delay;
        self.attempts += 1;

        let jittered = if self.config.jitter > 0.0 {
            let mut rng = rand::rng();
            let factor =
                rng.random_range((1.0 - self.config.jitter)..=(1.0 + self.config.jitter));
            base.mul_f64(factor)
        } else {
            base
        };

        self.current_delay = self
            .current_delay
            .mul_f64(self.config.multiplier)
            .min(self.config.max_delay);

        jittered.min(self.config.max_delay)
    }

    /// Resets to the initial delay after a successful connect.
    pub fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempts = 0;
    }

    /// Consecutive failed attempts since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_sequence_1000_times_1_5_capped() {
        let mut backoff = Backoff::default();

        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1500));
        assert_eq!(backoff.next_delay(), Duration::from_millis(2250));
        assert_eq!(backoff.next_delay(), Duration::from_millis(3375));

        // Keep going; the sequence must level off at the 30 s cap.
        let mut last = Duration::ZERO;
        for _ in 0..20 {
            last = backoff.next_delay();
        }
        assert_eq!(last, Duration::from_millis(30_000));
    }

    #[test]
    fn test_reset_returns_to_base_delay() {
        let mut backoff = Backoff::default();
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.attempts(), 2);

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
    }

    #[test]
    fn test_jitter_varies_delay() {
        let mut delays = Vec::new();
        for _ in 0..10 {
            let mut backoff = Backoff::new(BackoffConfig {
                jitter: 0.25,
                ..Default::default()
            });
            delays.push(backoff.next_delay());
        }
        let all_same = delays.windows(2).all(|w| w[0] == w[1]);
        assert!(!all_same, "jitter should vary delays: {delays:?}");
    }
}
