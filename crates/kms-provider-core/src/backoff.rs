use std::time::Duration;

/// Capped exponential backoff with an overall time budget.
///
/// `delay(n) = min(max_delay, min_delay * factor^n)`. Delays are advisory:
/// they are handed back to the caller as resume delays, never slept on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
    pub budget: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            factor: 1.3,
            budget: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (0-based), ignoring the budget.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let secs = self.min_delay.as_secs_f64() * self.factor.powi(exponent);
        Duration::from_secs_f64(secs.max(0.0).min(self.max_delay.as_secs_f64()))
    }

    /// Total delay spent by the retries before `attempt`.
    pub fn elapsed_before(&self, attempt: u32) -> Duration {
        (0..attempt).map(|n| self.delay(n)).sum()
    }

    /// Delay before retry `attempt`, or `None` once it would overrun the
    /// budget.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        let delay = self.delay(attempt);
        if self.elapsed_before(attempt) + delay > self.budget {
            None
        } else {
            Some(delay)
        }
    }
}
