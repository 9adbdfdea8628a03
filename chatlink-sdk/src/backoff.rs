//! Delay between reconnect attempts.

use std::time::Duration;

use rand::Rng;

/// Default delay before reconnecting after an unexpected close.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Exponential back-off with additive jitter, capped at `max_delay`.
///
/// Attempt `n` (0-based) waits `min(initial_delay * multiplier^n, max_delay)`
/// plus up to `jitter` times that amount. Jitter only lengthens the wait, so
/// a delay is never shorter than the configured base.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Fraction in `[0, 1]`.
    pub jitter: f64,
}

impl ReconnectPolicy {
    /// Same delay for every attempt, no jitter.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            jitter: 0.0,
        }
    }

    /// Doubling delay from `initial` up to `max`, with 20% jitter.
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self {
            initial_delay: initial,
            max_delay: max.max(initial),
            multiplier: 2.0,
            jitter: 0.2,
        }
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Capped delay for `attempt`, before jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let initial = self.initial_delay.as_secs_f64();
        let cap = self.max_delay.as_secs_f64().max(initial);
        let exp = self.multiplier.max(1.0).powi(attempt.min(i32::MAX as u32) as i32);
        let secs = (initial * exp).min(cap);
        // A cap near Duration::MAX rounds past it as f64.
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay.max(self.initial_delay))
    }

    /// Delay for `attempt` including jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.delay_with(attempt, &mut rand::thread_rng())
    }

    pub fn delay_with<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = self.base_delay(attempt);
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 || base.is_zero() {
            return base;
        }
        let extra = base.as_secs_f64() * rng.gen_range(0.0..jitter);
        base.saturating_add(Duration::try_from_secs_f64(extra).unwrap_or(Duration::ZERO))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_DELAY)
    }
}
