use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Sliding-window error counter. Trips on any critical error, or when the
/// window accumulates `threshold` errors. Once tripped it stays tripped for
/// the remainder of the run.
#[derive(Debug)]
pub struct CircuitBreaker {
    window: Duration,
    threshold: usize,
    errors: VecDeque<Instant>,
    critical: bool,
}

impl CircuitBreaker {
    pub fn new(window: Duration, threshold: usize) -> Self {
        Self {
            window,
            threshold,
            errors: VecDeque::new(),
            critical: false,
        }
    }

    pub fn record(&mut self, is_critical: bool) {
        let now = Instant::now();
        self.errors.push_back(now);
        self.prune(now);

        if is_critical || self.errors.len() >= self.threshold {
            self.critical = true;
        }
    }

    pub fn tripped(&self) -> bool {
        self.critical
    }

    pub fn recent_errors(&mut self) -> usize {
        self.prune(Instant::now());
        self.errors.len()
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.errors.front() {
            if now.duration_since(oldest) > self.window {
                self.errors.pop_front();
            } else {
                break;
            }
        }
    }
}
