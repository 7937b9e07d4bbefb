use std::time::Duration;

/// Exponential backoff clock for broker reconnect attempts: doubles on
/// failure up to a ceiling, resets to the floor on success.
#[derive(Debug, Clone)]
pub struct BackoffClock {
    floor: Duration,
    ceiling: Duration,
    current: Duration,
}

impl BackoffClock {
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        Self {
            floor,
            ceiling,
            current: floor,
        }
    }

    /// The delay to wait before the next connection attempt.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Record a failed attempt; doubles the delay, capped at the ceiling.
    pub fn record_failure(&mut self) {
        self.current = (self.current * 2).min(self.ceiling);
    }

    /// Record a successful attempt; resets the delay to the floor.
    pub fn record_success(&mut self) {
        self.current = self.floor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_on_failure_up_to_ceiling() {
        let mut clock = BackoffClock::new(Duration::from_secs(1), Duration::from_secs(30));
        assert_eq!(clock.current(), Duration::from_secs(1));
        clock.record_failure();
        assert_eq!(clock.current(), Duration::from_secs(2));
        clock.record_failure();
        assert_eq!(clock.current(), Duration::from_secs(4));
        for _ in 0..10 {
            clock.record_failure();
        }
        assert_eq!(clock.current(), Duration::from_secs(30));
    }

    #[test]
    fn resets_to_floor_on_success() {
        let mut clock = BackoffClock::new(Duration::from_secs(1), Duration::from_secs(30));
        clock.record_failure();
        clock.record_failure();
        assert_eq!(clock.current(), Duration::from_secs(4));
        clock.record_success();
        assert_eq!(clock.current(), Duration::from_secs(1));
    }
}
