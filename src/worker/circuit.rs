//! Rolling-window circuit breaker, per spec.md §3's `CircuitConfig`.

use std::time::{Duration, Instant};

/// Trips after `max_failures` failures within `window`. Tripped is
/// terminal for the worker it guards.
#[derive(Debug, Clone, Copy)]
pub struct CircuitConfig {
    pub max_failures: u32,
    pub window: Duration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            max_failures: 10,
            window: Duration::from_secs(60),
        }
    }
}

/// Tracks failure timestamps within the configured window and reports
/// whether the breaker has tripped.
pub(crate) struct RollingWindow {
    config: CircuitConfig,
    failures: Vec<Instant>,
}

impl RollingWindow {
    pub(crate) fn new(config: CircuitConfig) -> Self {
        Self {
            config,
            failures: Vec::new(),
        }
    }

    /// Records a failure at `now` and reports whether the breaker has
    /// tripped as a result.
    pub(crate) fn record_failure(&mut self, now: Instant) -> bool {
        self.failures.retain(|t| now.duration_since(*t) <= self.config.window);
        self.failures.push(now);
        self.failures.len() as u32 > self.config.max_failures
    }

    /// Resets the window, e.g. after a sustained period of healthy
    /// running (spec.md §4.3 step 5).
    pub(crate) fn reset(&mut self) {
        self.failures.clear();
    }

    /// The number of failures currently inside the window.
    pub(crate) fn count(&self) -> u32 {
        self.failures.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_after_exceeding_max_failures_in_window() {
        let mut window = RollingWindow::new(CircuitConfig {
            max_failures: 2,
            window: Duration::from_secs(1),
        });
        let t0 = Instant::now();
        assert!(!window.record_failure(t0));
        assert!(!window.record_failure(t0));
        assert!(window.record_failure(t0));
    }

    #[test]
    fn failures_outside_window_do_not_count() {
        let mut window = RollingWindow::new(CircuitConfig {
            max_failures: 1,
            window: Duration::from_millis(10),
        });
        let t0 = Instant::now();
        assert!(!window.record_failure(t0));
        let t1 = t0 + Duration::from_millis(50);
        assert!(!window.record_failure(t1));
    }

    #[test]
    fn reset_clears_recorded_failures() {
        let mut window = RollingWindow::new(CircuitConfig {
            max_failures: 1,
            window: Duration::from_secs(10),
        });
        let t0 = Instant::now();
        assert!(!window.record_failure(t0));
        window.reset();
        assert!(!window.record_failure(t0));
    }
}
