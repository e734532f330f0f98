use std::time::Duration;

use conductor_config::RetryBackoff;

/// How often, and how patiently, a failed primary invocation is re-issued
/// before the fallback is tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
  pub retries: u32,
  pub backoff: RetryBackoff,
  pub initial_delay: Duration,
}

impl RetryPolicy {
  /// Delay before re-issue number `attempt` (1-based).
  pub fn delay(&self, attempt: u32) -> Duration {
    let attempt = attempt.max(1);
    match self.backoff {
      RetryBackoff::Constant => self.initial_delay,
      RetryBackoff::Linear => self.initial_delay.saturating_mul(attempt),
      RetryBackoff::Exponential => self
        .initial_delay
        .saturating_mul(2u32.saturating_pow(attempt - 1)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn policy(backoff: RetryBackoff) -> RetryPolicy {
    RetryPolicy {
      retries: 3,
      backoff,
      initial_delay: Duration::from_millis(100),
    }
  }

  #[test]
  fn test_backoff_delays() {
    let constant = policy(RetryBackoff::Constant);
    assert_eq!(constant.delay(3), Duration::from_millis(100));

    let linear = policy(RetryBackoff::Linear);
    assert_eq!(linear.delay(3), Duration::from_millis(300));

    let exponential = policy(RetryBackoff::Exponential);
    assert_eq!(exponential.delay(1), Duration::from_millis(100));
    assert_eq!(exponential.delay(3), Duration::from_millis(400));
  }
}
