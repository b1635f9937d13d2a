//! Exponential restart delay for supervised background tasks.
//!
//! Keeps a task that keeps faulting from turning into a tight crash loop
//! and a log storm.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        let base = base.max(Duration::from_millis(1));
        let max = max.max(base);
        Self {
            base,
            max,
            current: base,
        }
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }

    /// Returns the delay before the next attempt and doubles it, up to `max`.
    pub fn fail(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn max(&self) -> Duration {
        self.max
    }
}
