use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    Stable,
    NotStable,
}

/// Rolling window of recent prices. The market counts as stable once
/// `required` consecutive samples each moved less than `threshold`
/// relative to their predecessor.
#[derive(Debug)]
pub struct StabilityWindow {
    threshold: f64,
    required: usize,
    samples: VecDeque<f64>,
    consecutive_stable: usize,
}

impl StabilityWindow {
    pub fn new(threshold: f64, required: usize) -> Self {
        Self {
            threshold,
            required,
            samples: VecDeque::with_capacity(required + 1),
            consecutive_stable: 0,
        }
    }

    pub fn observe(&mut self, price: f64) -> Stability {
        if let Some(&last) = self.samples.back() {
            let relative_move = ((price - last) / last).abs();
            if relative_move <= self.threshold {
                self.consecutive_stable += 1;
            } else {
                self.consecutive_stable = 0;
            }
        }

        self.samples.push_back(price);
        while self.samples.len() > self.required + 1 {
            self.samples.pop_front();
        }

        if self.consecutive_stable >= self.required {
            Stability::Stable
        } else {
            Stability::NotStable
        }
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.consecutive_stable = 0;
    }

    pub fn consecutive_stable(&self) -> usize {
        self.consecutive_stable
    }
}
