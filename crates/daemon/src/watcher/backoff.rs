// Backoff for event-triggered sync failures.

use std::time::Duration;

pub const BACKOFF_FLOOR: Duration = Duration::from_secs(1);
pub const BACKOFF_CEILING: Duration = Duration::from_secs(60);

/// Exponential penalty applied after a failed event-triggered attempt.
///
/// Starts at the floor, doubles per consecutive failure, never exceeds the
/// ceiling. A success resets it to the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventBackoff {
    floor: Duration,
    ceiling: Duration,
    current: Duration,
}

impl Default for EventBackoff {
    fn default() -> Self {
        Self::new(BACKOFF_FLOOR, BACKOFF_CEILING)
    }
}

impl EventBackoff {
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        let ceiling = ceiling.max(floor);
        Self { floor, ceiling, current: floor }
    }

    /// Penalty the next failure will incur.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Record a failure: returns the penalty to sleep now and grows the next.
    pub fn on_failure(&mut self) -> Duration {
        let penalty = self.current;
        self.current = self.current.saturating_mul(2).min(self.ceiling);
        penalty
    }

    pub fn on_success(&mut self) {
        self.current = self.floor;
    }
}
