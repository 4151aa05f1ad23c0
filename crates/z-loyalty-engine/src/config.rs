//! Engine configuration.

use std::time::Duration;

/// Reconciliation engine configuration.
///
/// Passed explicitly through [`crate::Engine::new`]; there is no
/// process-wide configuration state.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval between scheduler ticks.
    pub poll_interval: Duration,

    /// Number of concurrent settlement executors.
    pub workers: usize,

    /// Bounded task queue capacity in front of the executors.
    pub queue_capacity: usize,

    /// Deadline for a single settlement task, lookup and persistence
    /// included.
    pub task_timeout: Duration,

    /// Pool-wide pause applied on a rate-limit response that carries no
    /// `Retry-After` hint.
    pub rate_limit_pause: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            workers: 10,
            queue_capacity: 50,
            task_timeout: Duration::from_secs(5),
            rate_limit_pause: Duration::from_secs(60),
        }
    }
}
