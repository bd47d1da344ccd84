//! Utility capabilities attached to every task.
//!
//! A calculator scores one job outcome in `[0, 1]`; an aggregator folds the
//! scores into a history-aware value. Schedulers use the predicting side to
//! evaluate outcomes without committing them.

use std::collections::VecDeque;
use std::fmt;

use crate::job::Job;
use crate::time::Time;

/// Scores a job finishing at `time`.
pub trait UtilityCalculator: fmt::Debug + Send {
    /// Utility in `[0, 1]` of `job` completing at `time`.
    fn calc_utility(&self, job: &Job, time: Time) -> f64;
}

/// Folds per-job utilities into a running value.
pub trait UtilityAggregator: fmt::Debug + Send {
    /// Record one job's utility.
    fn add_utility(&mut self, utility: f64);

    /// Current aggregated value.
    fn current_utility(&self) -> f64;

    /// Value the aggregator would report after recording `utility`.
    fn predict_utility(&self, utility: f64) -> f64;

    /// Sum of every utility recorded.
    fn total(&self) -> f64;

    /// Number of utilities recorded.
    fn count(&self) -> u64;

    /// Forget all recorded values.
    fn reset(&mut self);
}

/// Full utility for an on-time completion, none otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadlineStepUtility;

impl UtilityCalculator for DeadlineStepUtility {
    fn calc_utility(&self, job: &Job, time: Time) -> f64 {
        if time <= job.deadline() { 1.0 } else { 0.0 }
    }
}

/// Running mean over every recorded utility.
///
/// An empty history reports 1.0.
#[derive(Debug, Clone, Default)]
pub struct MeanAggregator {
    total: f64,
    count: u64,
}

impl MeanAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl UtilityAggregator for MeanAggregator {
    fn add_utility(&mut self, utility: f64) {
        self.total += utility.clamp(0.0, 1.0);
        self.count = self.count.saturating_add(1);
    }

    fn current_utility(&self) -> f64 {
        if self.count == 0 {
            1.0
        } else {
            self.total / self.count as f64
        }
    }

    fn predict_utility(&self, utility: f64) -> f64 {
        (self.total + utility.clamp(0.0, 1.0)) / (self.count as f64 + 1.0)
    }

    fn total(&self) -> f64 {
        self.total
    }

    fn count(&self) -> u64 {
        self.count
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Mean over the most recent `size` utilities.
///
/// `total` and `count` still cover the whole history.
#[derive(Debug, Clone)]
pub struct WindowAggregator {
    size: usize,
    window: VecDeque<f64>,
    total: f64,
    count: u64,
}

impl WindowAggregator {
    /// Create an aggregator over the last `size` samples (at least one).
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            window: VecDeque::with_capacity(size),
            total: 0.0,
            count: 0,
        }
    }

    fn window_sum(&self) -> f64 {
        self.window.iter().sum()
    }
}

impl UtilityAggregator for WindowAggregator {
    fn add_utility(&mut self, utility: f64) {
        let utility = utility.clamp(0.0, 1.0);
        if self.window.len() == self.size {
            self.window.pop_front();
        }
        self.window.push_back(utility);
        self.total += utility;
        self.count = self.count.saturating_add(1);
    }

    fn current_utility(&self) -> f64 {
        if self.window.is_empty() {
            1.0
        } else {
            self.window_sum() / self.window.len() as f64
        }
    }

    fn predict_utility(&self, utility: f64) -> f64 {
        let utility = utility.clamp(0.0, 1.0);
        let mut sum = self.window_sum();
        let mut len = self.window.len();
        if len == self.size {
            sum -= self.window.front().copied().unwrap_or(0.0);
            len -= 1;
        }
        (sum + utility) / (len as f64 + 1.0)
    }

    fn total(&self) -> f64 {
        self.total
    }

    fn count(&self) -> u64 {
        self.count
    }

    fn reset(&mut self) {
        self.window.clear();
        self.total = 0.0;
        self.count = 0;
    }
}
