// Retry configuration with full-jitter exponential backoff.
//
// Full jitter (sleep = random(0, base * factor^attempt), capped) avoids the
// thundering herd that deterministic backoff produces when a source recovers
// and every worker retries on the same schedule.

use std::time::Duration;

/// Backoff/retry parameters shared by fetch workers, discovery and the
/// persistence actor.
#[derive(Debug, Clone)]
pub struct RetryConfig {
  /// Maximum number of attempts, including the first (so `3` means two retries).
  pub max_attempts: u32,
  /// Base backoff duration for attempt 0.
  pub base_backoff: Duration,
  /// Exponential factor applied per attempt.
  pub backoff_factor: f64,
  /// Upper bound on any single backoff sleep.
  pub max_backoff: Duration,
  /// Whether to draw the sleep uniformly from `[0, computed)`.
  pub full_jitter: bool,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      base_backoff: Duration::from_secs(1),
      backoff_factor: 2.0,
      max_backoff: Duration::from_secs(30),
      full_jitter: true,
    }
  }
}

impl RetryConfig {
  /// Backoff duration before retrying after the given 0-indexed attempt.
  pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
    let exp = self.base_backoff.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
    let capped = exp.min(self.max_backoff.as_secs_f64());

    if self.full_jitter {
      Duration::from_secs_f64(capped * rand_f64())
    } else {
      Duration::from_secs_f64(capped)
    }
  }

  /// True when another attempt is allowed after `attempt` (0-indexed) failed.
  pub fn has_attempts_left(&self, attempt: u32) -> bool {
    attempt + 1 < self.max_attempts
  }
}

/// A simple pseudo-random number generator for jitter (no external deps).
fn rand_f64() -> f64 {
  use std::time::{SystemTime, UNIX_EPOCH};

  let nanos = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .subsec_nanos();

  (nanos as f64 / u32::MAX as f64).fract()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn no_jitter() -> RetryConfig {
    RetryConfig {
      full_jitter: false,
      ..RetryConfig::default()
    }
  }

  #[test]
  fn backoff_grows_exponentially_without_jitter() {
    let config = no_jitter();
    assert_eq!(config.backoff_for_attempt(0), Duration::from_secs(1));
    assert_eq!(config.backoff_for_attempt(1), Duration::from_secs(2));
    assert_eq!(config.backoff_for_attempt(2), Duration::from_secs(4));
    assert_eq!(config.backoff_for_attempt(3), Duration::from_secs(8));
  }

  #[test]
  fn backoff_respects_cap() {
    let config = no_jitter();
    // 1 * 2^10 = 1024s, capped at 30s
    assert_eq!(config.backoff_for_attempt(10), Duration::from_secs(30));
  }

  #[test]
  fn full_jitter_stays_within_bounds() {
    let config = RetryConfig::default();
    for attempt in 0..6 {
      let ceiling = no_jitter().backoff_for_attempt(attempt);
      for _ in 0..50 {
        let backoff = config.backoff_for_attempt(attempt);
        assert!(backoff <= ceiling, "attempt {attempt}: {backoff:?} > {ceiling:?}");
      }
    }
  }

  #[test]
  fn attempt_accounting() {
    let config = RetryConfig::default();
    assert!(config.has_attempts_left(0));
    assert!(config.has_attempts_left(1));
    assert!(!config.has_attempts_left(2));
  }

  #[test]
  fn rand_f64_is_bounded() {
    for _ in 0..100 {
      let val = rand_f64();
      assert!((0.0..=1.0).contains(&val));
    }
  }
}
