//! Token-bucket rate limiter shared across a source's fetchers and its
//! discovery loop.
//!
//! Bucket of capacity `⌈R⌉` refilled at `R` tokens/sec. `acquire()` suspends
//! until a token is available or the job is cancelled; waiters queue on a
//! `tokio::sync::Mutex`, whose FIFO wakeups give first-come-first-served
//! fairness with no priority lanes. `R = 0` admits nothing: every acquire
//! parks until cancellation.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// The acquire was abandoned because the job was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rate limiter cancelled")]
pub struct Cancelled;

#[derive(Debug)]
struct BucketState {
  tokens: f64,
  last_refill: Instant,
}

/// Async token-bucket gate. The single shared mutable object in the
/// pipeline; it protects its own state.
#[derive(Debug)]
pub struct RateLimiter {
  rate: f64,
  capacity: f64,
  state: Mutex<BucketState>,
  cancel: CancellationToken,
}

impl RateLimiter {
  pub fn new(requests_per_second: f64, cancel: CancellationToken) -> Self {
    let rate = requests_per_second.max(0.0);
    let capacity = if rate > 0.0 { rate.ceil().max(1.0) } else { 0.0 };
    Self {
      rate,
      capacity,
      state: Mutex::new(BucketState {
        tokens: capacity,
        last_refill: Instant::now(),
      }),
      cancel,
    }
  }

  /// Wait until a request token is available, or until cancelled.
  ///
  /// Cancellation does not consume a token.
  pub async fn acquire(&self) -> Result<(), Cancelled> {
    if self.rate <= 0.0 {
      // Zero budget: nothing is ever admitted.
      self.cancel.cancelled().await;
      return Err(Cancelled);
    }

    loop {
      let wait = {
        let mut state = self.state.lock().await;
        let elapsed = state.last_refill.elapsed();
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.rate).min(self.capacity);
        state.last_refill = Instant::now();

        if state.tokens >= 1.0 {
          state.tokens -= 1.0;
          return Ok(());
        }
        Duration::from_secs_f64((1.0 - state.tokens) / self.rate)
      };

      tokio::select! {
        _ = self.cancel.cancelled() => return Err(Cancelled),
        _ = tokio::time::sleep(wait) => {}
      }
    }
  }
}
