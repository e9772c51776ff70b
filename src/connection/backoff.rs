//! Reconnect delay policy.

use std::time::Duration;

/// Bounded exponential backoff.
///
/// The delay before retry `n` (0-based) is `initial * multiplier^n`, capped
/// at `max`. After `max_retries` consecutive failures there is no further
/// delay and the caller should give up.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
    /// `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            multiplier: 2.0,
            max_retries: Some(10),
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt`, or `None` if retries are exhausted.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if self.max_retries.is_some_and(|max| attempt >= max) {
            return None;
        }
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.initial.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        let capped = scaled.min(self.max.as_secs_f64());
        Some(Duration::from_secs_f64(capped.max(0.0)))
    }
}
