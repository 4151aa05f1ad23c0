//! Pool-wide slowdown shared between settlement tasks and the scheduler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

/// Shared rate-limit state.
///
/// When the accrual service answers 429, hammering it with the pool's full
/// concurrency only makes things worse, so the observing task engages the
/// throttle and the scheduler skips whole ticks until the deadline passes.
#[derive(Debug, Clone)]
pub struct Throttle {
    origin: Instant,
    paused_until_ms: Arc<AtomicU64>,
}

impl Throttle {
    /// Create a disengaged throttle.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            paused_until_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Pause reconciliation for `pause` from now. Concurrent callers keep
    /// the furthest deadline.
    pub fn engage(&self, pause: Duration) {
        let deadline = (self.origin.elapsed() + pause).as_millis() as u64;
        self.paused_until_ms.fetch_max(deadline, Ordering::Relaxed);
    }

    /// Whether the pause deadline is still in the future.
    #[must_use]
    pub fn is_engaged(&self) -> bool {
        let now = self.origin.elapsed().as_millis() as u64;
        now < self.paused_until_ms.load(Ordering::Relaxed)
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn engages_and_expires() {
        let throttle = Throttle::new();
        assert!(!throttle.is_engaged());

        throttle.engage(Duration::from_secs(10));
        assert!(throttle.is_engaged());

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(!throttle.is_engaged());
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_the_furthest_deadline() {
        let throttle = Throttle::new();
        throttle.engage(Duration::from_secs(30));
        throttle.engage(Duration::from_secs(5));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(throttle.is_engaged());
    }
}
