//! Fixed-interval pacing for sequential remote calls.

use std::time::Duration;

use tokio::time::Instant;

/// Keeps successive [`Pacer::pace`] returns at least `interval` apart.
///
/// The first call returns immediately. A zero interval never waits.
#[derive(Debug)]
pub struct Pacer {
  interval: Duration,
  last:     Option<Instant>,
}

impl Pacer {
  pub fn new(interval: Duration) -> Self { Self { interval, last: None } }

  /// Wait until the interval since the previous call has elapsed.
  pub async fn pace(&mut self) {
    if let Some(last) = self.last {
      tokio::time::sleep_until(last + self.interval).await;
    }
    self.last = Some(Instant::now());
  }
}
