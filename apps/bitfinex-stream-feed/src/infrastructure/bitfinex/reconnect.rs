//! Reconnection Policy
//!
//! Exponential backoff with jitter between reconnection attempts. The
//! policy only decides how long to wait before the next attempt; the feed
//! client bounds the whole reconnect window with its configured timeout.

use std::time::Duration;

use rand::Rng;

/// Configuration for backoff between reconnection attempts.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Ceiling for the delay between attempts.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after every attempt.
    pub multiplier: f64,
    /// Jitter factor as a fraction (0.1 = plus or minus 10%).
    pub jitter_factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl ReconnectConfig {
    /// Create configuration from `ConnectionSettings`.
    #[must_use]
    pub const fn from_connection_settings(
        settings: &crate::infrastructure::config::ConnectionSettings,
    ) -> Self {
        Self {
            initial_delay: settings.reconnect_delay_initial,
            max_delay: settings.reconnect_delay_max,
            multiplier: settings.reconnect_delay_multiplier,
            jitter_factor: 0.1, // Default jitter
        }
    }
}

/// Backoff state across the attempts of one reconnect window.
///
/// # Example
///
/// ```rust
/// use bitfinex_stream_feed::infrastructure::bitfinex::reconnect::{
///     ReconnectConfig, ReconnectPolicy,
/// };
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
/// let first = policy.next_delay();
/// let second = policy.next_delay();
/// assert!(second >= first);
/// ```
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    current_delay: Duration,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a fresh policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        let initial_delay = config.initial_delay;
        Self {
            config,
            current_delay: initial_delay,
            attempt_count: 0,
        }
    }

    /// Delay to wait before the next attempt, with jitter applied.
    #[must_use]
    pub fn next_delay(&mut self) -> Duration {
        self.attempt_count += 1;

        let delay_with_jitter = self.apply_jitter(self.current_delay);

        // Scale the base delay for the following attempt.
        #[allow(clippy::cast_precision_loss)]
        let scaled = (self.current_delay.as_millis() as f64 * self.config.multiplier).round();
        let next_millis = if scaled.is_finite() && scaled > 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                scaled as u128
            }
        } else {
            0
        };
        let capped = next_millis.min(self.config.max_delay.as_millis());
        self.current_delay = Duration::from_millis(u64::try_from(capped).unwrap_or(u64::MAX));

        delay_with_jitter
    }

    /// Reset after a successful connection.
    pub const fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempt_count = 0;
    }

    /// Attempts made since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return duration;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_millis = duration.as_millis() as f64;
        let jitter_range = base_millis * self.config.jitter_factor;
        let mut rng = rand::rng();
        let jitter: f64 = rng.random_range(-jitter_range..=jitter_range);
        let adjusted_millis = (base_millis + jitter).max(1.0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let adjusted_u64 = adjusted_millis as u64;
        Duration::from_millis(adjusted_u64)
    }
}
