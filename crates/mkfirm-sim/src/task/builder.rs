//! Fluent construction of [`Task`]s.

use rand::SeedableRng;
use rand::rngs::StdRng;

use super::{Task, TaskKind, TaskParams};
use crate::error::{TaskError, TaskResult};
use crate::mk::MkMonitor;
use crate::time::{Interval, Priority, TaskId};
use crate::utility::{DeadlineStepUtility, MeanAggregator, UtilityAggregator, UtilityCalculator};

/// Builder for [`Task`].
///
/// Shared parameters are set with the chained setters; the terminal methods
/// pick the variant, validate everything and return the task.
///
/// ```
/// use mkfirm_sim::Task;
///
/// let task = Task::builder(1)
///     .execution_time(2)
///     .priority(3)
///     .mk_firm(10, 2, 3)?;
/// assert_eq!(task.relative_deadline(), 10);
/// # Ok::<(), mkfirm_sim::TaskError>(())
/// ```
#[derive(Debug)]
pub struct TaskBuilder {
    id: TaskId,
    execution_time: Interval,
    relative_deadline: Option<Interval>,
    priority: Priority,
    phase: Interval,
    initial_mk_state: Option<u64>,
    calculator: Option<Box<dyn UtilityCalculator>>,
    aggregator: Option<Box<dyn UtilityAggregator>>,
}

impl TaskBuilder {
    pub(crate) fn new(id: TaskId) -> Self {
        Self {
            id,
            execution_time: 1,
            relative_deadline: None,
            priority: 0,
            phase: 0,
            initial_mk_state: None,
            calculator: None,
            aggregator: None,
        }
    }

    /// Worst-case execution time in ticks. Defaults to 1.
    #[must_use]
    pub fn execution_time(mut self, ticks: Interval) -> Self {
        self.execution_time = ticks;
        self
    }

    /// Relative deadline. Defaults to the period.
    #[must_use]
    pub fn deadline(mut self, ticks: Interval) -> Self {
        self.relative_deadline = Some(ticks);
        self
    }

    /// Static priority; smaller is more urgent. Defaults to 0.
    #[must_use]
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Offset of the first activation. Defaults to 0.
    #[must_use]
    pub fn phase(mut self, ticks: Interval) -> Self {
        self.phase = ticks;
        self
    }

    /// Initial packed (m,k) history, most recent outcome in bit 0. Defaults
    /// to all successes. Ignored by variants without a window.
    #[must_use]
    pub fn initial_mk_state(mut self, state: u64) -> Self {
        self.initial_mk_state = Some(state);
        self
    }

    #[must_use]
    pub fn utility_calculator(mut self, calculator: impl UtilityCalculator + 'static) -> Self {
        self.calculator = Some(Box::new(calculator));
        self
    }

    #[must_use]
    pub fn utility_aggregator(mut self, aggregator: impl UtilityAggregator + 'static) -> Self {
        self.aggregator = Some(Box::new(aggregator));
        self
    }

    /// Strictly periodic task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidParameter`] for non-positive timing values
    /// or a negative phase.
    pub fn periodic(self, period: Interval) -> TaskResult<Task> {
        TaskError::require_positive("period", period)?;
        self.finish(period, TaskKind::Periodic { period })
    }

    /// Sporadic task with inter-arrival times in
    /// `[min_interarrival, min_interarrival + max_extra]`, drawn from a
    /// generator seeded with `seed`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidParameter`] for non-positive timing
    /// values, a negative `max_extra` or a negative phase.
    pub fn sporadic(
        self,
        min_interarrival: Interval,
        max_extra: Interval,
        seed: u64,
    ) -> TaskResult<Task> {
        TaskError::require_positive("minimum inter-arrival time", min_interarrival)?;
        if max_extra < 0 {
            return Err(TaskError::invalid_parameter(format!(
                "maximum extra delay must not be negative, got {max_extra}"
            )));
        }
        self.finish(
            min_interarrival,
            TaskKind::Sporadic {
                min_interarrival,
                max_extra,
                seed,
                rng: StdRng::seed_from_u64(seed),
            },
        )
    }

    /// (m,k)-firm task without a fixed pattern.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Window`] for an invalid (m,k) pair and
    /// [`TaskError::InvalidParameter`] for invalid timing values.
    pub fn mk_firm(self, period: Interval, m: u32, k: u32) -> TaskResult<Task> {
        TaskError::require_positive("period", period)?;
        let (monitor, seed) = self.monitor(m, k)?;
        self.finish(
            period,
            TaskKind::MkFree {
                period,
                monitor,
                seed,
            },
        )
    }

    /// (m,k)-firm task with the evenly distributed mandatory pattern rotated
    /// by `spin`.
    ///
    /// # Errors
    ///
    /// Same as [`TaskBuilder::mk_firm`].
    pub fn mk_fixed(self, period: Interval, m: u32, k: u32, spin: u32) -> TaskResult<Task> {
        TaskError::require_positive("period", period)?;
        let (monitor, seed) = self.monitor(m, k)?;
        self.finish(
            period,
            TaskKind::MkFixed {
                period,
                monitor,
                seed,
                spin,
            },
        )
    }

    /// (m,k)-firm task whose jobs take their distance to failure as priority.
    ///
    /// # Errors
    ///
    /// Same as [`TaskBuilder::mk_firm`].
    pub fn distance_priority(self, period: Interval, m: u32, k: u32) -> TaskResult<Task> {
        TaskError::require_positive("period", period)?;
        let (monitor, seed) = self.monitor(m, k)?;
        self.finish(
            period,
            TaskKind::DistancePriority {
                period,
                monitor,
                seed,
            },
        )
    }

    fn monitor(&self, m: u32, k: u32) -> TaskResult<(MkMonitor, Option<u64>)> {
        let monitor = match self.initial_mk_state {
            Some(state) => MkMonitor::with_state(m, k, state)?,
            None => MkMonitor::new(m, k)?,
        };
        Ok((monitor, self.initial_mk_state))
    }

    fn finish(self, period: Interval, kind: TaskKind) -> TaskResult<Task> {
        let relative_deadline = self.relative_deadline.unwrap_or(period);
        TaskError::require_positive("execution time", self.execution_time)?;
        TaskError::require_positive("relative deadline", relative_deadline)?;
        if self.phase < 0 {
            return Err(TaskError::invalid_parameter(format!(
                "phase must not be negative, got {}",
                self.phase
            )));
        }
        let params = TaskParams {
            id: self.id,
            execution_time: self.execution_time,
            relative_deadline,
            priority: self.priority,
            phase: self.phase,
        };
        let calculator = self
            .calculator
            .unwrap_or_else(|| Box::new(DeadlineStepUtility));
        let aggregator = self
            .aggregator
            .unwrap_or_else(|| Box::new(MeanAggregator::new()));
        Ok(Task::from_parts(params, kind, calculator, aggregator))
    }
}
