//! Tasks: persistent producers of jobs.
//!
//! A [`Task`] starts uninitialised, becomes running with [`Task::start`], and
//! from then on releases jobs on the schedule its [`TaskKind`] dictates. The
//! driver reports every completion and cancellation back to the owning task,
//! which updates its statistics and utility history before its variant hook
//! releases the job from the arena.
//!
//! ```text
//! ┌───────────────┐  start(now)  ┌───────────┐
//! │ Uninitialised │─────────────▶│  Running  │◀─┐ spawn / complete / cancel
//! └───────────────┘              └─────┬─────┘──┘
//!                                      │ start(now) resets counters
//!                                      ▼
//! ```

mod builder;
mod kind;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{SimulationError, SimulationResult, TaskError, TaskResult};
use crate::job::{Job, JobArena, JobHandle};
use crate::mk::MkMonitor;
use crate::time::{Interval, Priority, TaskId, Time};
use crate::utility::{UtilityAggregator, UtilityCalculator};

pub use builder::TaskBuilder;
pub use kind::{TaskKind, TaskParams, is_mandatory_instance};

/// Lifetime counters of one task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub activations: u64,
    pub completions: u64,
    pub cancellations: u64,
    /// Completions after the absolute deadline.
    pub misses: u64,
    /// Preemptions accumulated over completed jobs.
    pub preemptions: u64,
    /// Cancellations of jobs that had already started.
    pub execution_cancellations: u64,
    /// Ticks spent on jobs that were later cancelled.
    pub lost_execution_cycles: u64,
    /// Length of each finished run of consecutive failures, mapped to how
    /// often it occurred.
    pub failure_histogram: BTreeMap<u32, u64>,
    /// Consecutive failures since the last success.
    pub current_failure_run: u32,
}

impl TaskStats {
    fn record_outcome(&mut self, success: bool) {
        if success {
            self.close_failure_run();
        } else {
            self.current_failure_run = self.current_failure_run.saturating_add(1);
        }
    }

    fn close_failure_run(&mut self) {
        if self.current_failure_run > 0 {
            let count = self
                .failure_histogram
                .entry(self.current_failure_run)
                .or_insert(0);
            *count = count.saturating_add(1);
            self.current_failure_run = 0;
        }
    }

    /// Move an open failure run into the histogram.
    pub fn finish_histogram(&mut self) {
        self.close_failure_run();
    }

    /// Fraction of finished jobs that met their deadline.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let finished = self.completions.saturating_add(self.cancellations);
        if finished == 0 {
            1.0
        } else {
            self.completions.saturating_sub(self.misses) as f64 / finished as f64
        }
    }
}

/// A recurring source of jobs.
#[derive(Debug)]
pub struct Task {
    params: TaskParams,
    kind: TaskKind,
    stats: TaskStats,
    next_activation: Option<Time>,
    calculator: Box<dyn UtilityCalculator>,
    aggregator: Box<dyn UtilityAggregator>,
}

impl Task {
    /// Start building a task with the given id.
    #[must_use]
    pub fn builder(id: TaskId) -> TaskBuilder {
        TaskBuilder::new(id)
    }

    pub(crate) fn from_parts(
        params: TaskParams,
        kind: TaskKind,
        calculator: Box<dyn UtilityCalculator>,
        aggregator: Box<dyn UtilityAggregator>,
    ) -> Self {
        Self {
            params,
            kind,
            stats: TaskStats::default(),
            next_activation: None,
            calculator,
            aggregator,
        }
    }

    /// Reset all counters and schedule the first activation relative to `now`.
    pub fn start(&mut self, now: Time) {
        self.stats = TaskStats::default();
        self.aggregator.reset();
        self.kind.reset();
        let offset = self.kind.first_offset(self.params.phase);
        self.next_activation = Some(now.saturating_add(offset));
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.next_activation.is_some()
    }

    /// Release a job if one is due at `now`.
    ///
    /// At most one job is released per call. Uninitialised tasks never
    /// release jobs.
    pub fn spawn_job(&mut self, now: Time, jobs: &mut JobArena) -> Option<JobHandle> {
        let due = self.next_activation?;
        if now < due {
            return None;
        }
        let instance = self.stats.activations;
        let handle = self.kind.spawn(&self.params, instance, due, jobs);
        let offset = self.kind.next_offset();
        self.next_activation = Some(due.saturating_add(offset));
        self.stats.activations = self.stats.activations.saturating_add(1);
        tracing::debug!(
            task = self.params.id,
            job = %handle,
            activation = due,
            "job released"
        );
        Some(handle)
    }

    fn owned_job<'a>(&self, jobs: &'a JobArena, handle: JobHandle) -> TaskResult<&'a Job> {
        let job = jobs.get(handle).ok_or(TaskError::UnknownJob(handle))?;
        if job.task() != self.params.id {
            return Err(TaskError::ForeignJob {
                task: self.params.id,
                owner: job.task(),
                job: handle,
            });
        }
        Ok(job)
    }

    /// Account for a job that finished executing at `finish`.
    ///
    /// The job is a miss iff `finish` lies after its absolute deadline.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::UnknownJob`] or [`TaskError::ForeignJob`] if the
    /// handle does not name a live job of this task.
    pub fn complete_job(
        &mut self,
        jobs: &mut JobArena,
        handle: JobHandle,
        finish: Time,
    ) -> TaskResult<()> {
        let job = self.owned_job(jobs, handle)?;
        let on_time = finish <= job.deadline();
        let preemptions = u64::from(job.preemptions());
        let utility = self.calculator.calc_utility(job, finish);

        self.stats.completions = self.stats.completions.saturating_add(1);
        if !on_time {
            self.stats.misses = self.stats.misses.saturating_add(1);
        }
        self.stats.preemptions = self.stats.preemptions.saturating_add(preemptions);
        self.aggregator.add_utility(utility);
        self.stats.record_outcome(on_time);

        let job = self.kind.on_complete(jobs, handle, on_time)?;
        tracing::debug!(
            task = self.params.id,
            job = %handle,
            instance = job.id(),
            finish,
            on_time,
            "job completed"
        );
        Ok(())
    }

    /// Account for a job the scheduler dropped.
    ///
    /// Returns whether the task's own state is still valid; (m,k) variants
    /// return `false` once their constraint is broken.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::UnknownJob`] or [`TaskError::ForeignJob`] if the
    /// handle does not name a live job of this task.
    pub fn cancel_job(&mut self, jobs: &mut JobArena, handle: JobHandle) -> TaskResult<bool> {
        let job = self.owned_job(jobs, handle)?;
        let consumed = job.consumed();

        self.stats.cancellations = self.stats.cancellations.saturating_add(1);
        if consumed > 0 {
            self.stats.execution_cancellations =
                self.stats.execution_cancellations.saturating_add(1);
            self.stats.lost_execution_cycles = self
                .stats
                .lost_execution_cycles
                .saturating_add(consumed.unsigned_abs());
        }
        self.aggregator.add_utility(0.0);
        self.stats.record_outcome(false);

        let (job, valid) = self.kind.on_cancel(jobs, handle)?;
        tracing::debug!(
            task = self.params.id,
            job = %handle,
            instance = job.id(),
            consumed,
            valid,
            "job cancelled"
        );
        Ok(valid)
    }

    /// Distance to failure of this task right now.
    #[must_use]
    pub fn distance(&self) -> u32 {
        self.kind.distance()
    }

    /// Utility `job` would earn if it ran uninterrupted from `now`.
    #[must_use]
    pub fn possible_exec_value(&self, job: &Job, now: Time) -> f64 {
        self.calculator
            .calc_utility(job, now.saturating_add(job.remaining()))
    }

    /// Aggregated utility after `job` ran uninterrupted from `now`.
    #[must_use]
    pub fn possible_history_value(&self, job: &Job, now: Time) -> f64 {
        self.aggregator
            .predict_utility(self.possible_exec_value(job, now))
    }

    /// Aggregated utility after the next job fails.
    #[must_use]
    pub fn possible_fail_history_value(&self) -> f64 {
        self.aggregator.predict_utility(0.0)
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.params.id
    }

    #[inline]
    #[must_use]
    pub fn execution_time(&self) -> Interval {
        self.params.execution_time
    }

    #[inline]
    #[must_use]
    pub fn relative_deadline(&self) -> Interval {
        self.params.relative_deadline
    }

    #[inline]
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.params.priority
    }

    #[inline]
    #[must_use]
    pub fn params(&self) -> &TaskParams {
        &self.params
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    /// Period, or minimum inter-arrival time for sporadic tasks.
    #[must_use]
    pub fn period(&self) -> Interval {
        self.kind.period()
    }

    #[must_use]
    pub fn mk_monitor(&self) -> Option<&MkMonitor> {
        self.kind.monitor()
    }

    #[must_use]
    pub fn stats(&self) -> &TaskStats {
        &self.stats
    }

    /// Close open failure runs so the histogram covers the whole run.
    pub fn finish_stats(&mut self) {
        self.stats.finish_histogram();
    }

    #[must_use]
    pub fn next_activation(&self) -> Option<Time> {
        self.next_activation
    }

    #[must_use]
    pub fn current_utility(&self) -> f64 {
        self.aggregator.current_utility()
    }

    #[must_use]
    pub fn utility_total(&self) -> f64 {
        self.aggregator.total()
    }

    #[must_use]
    pub fn utility_count(&self) -> u64 {
        self.aggregator.count()
    }

    /// Processor share `execution_time / period`.
    #[must_use]
    pub fn utilisation(&self) -> f64 {
        self.params.execution_time as f64 / self.period() as f64
    }
}

/// The tasks of one simulation, in activation order.
#[derive(Debug, Default)]
pub struct TaskSet {
    tasks: Vec<Task>,
    index: HashMap<TaskId, usize>,
}

impl TaskSet {
    /// Build a task set.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::DuplicateTask`] if two tasks share an id.
    pub fn new(tasks: Vec<Task>) -> SimulationResult<Self> {
        let mut index = HashMap::with_capacity(tasks.len());
        for (slot, task) in tasks.iter().enumerate() {
            if index.insert(task.id(), slot).is_some() {
                return Err(SimulationError::DuplicateTask(task.id()));
            }
        }
        Ok(Self { tasks, index })
    }

    #[must_use]
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.index.get(&id).and_then(|&slot| self.tasks.get(slot))
    }

    #[must_use]
    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        let slot = *self.index.get(&id)?;
        self.tasks.get_mut(slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Task> {
        self.tasks.iter_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Total processor utilisation of the set.
    #[must_use]
    pub fn utilisation(&self) -> f64 {
        self.tasks.iter().map(Task::utilisation).sum()
    }

    /// Least common multiple of all periods, `None` on overflow or for an
    /// empty set.
    #[must_use]
    pub fn hyperperiod(&self) -> Option<Interval> {
        fn gcd(a: Interval, b: Interval) -> Interval {
            if b == 0 { a } else { gcd(b, a % b) }
        }
        let mut periods = self.tasks.iter().map(Task::period);
        let first = periods.next()?;
        periods.try_fold(first, |acc, p| (acc / gcd(acc, p)).checked_mul(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mkfirm_test_helpers::{assert_approx_eq, must, must_err, must_some};

    fn periodic(id: TaskId, period: Interval, c: Interval) -> Task {
        must(Task::builder(id).execution_time(c).periodic(period))
    }

    #[test]
    fn test_uninitialised_task_releases_nothing() {
        let mut task = periodic(1, 5, 2);
        let mut jobs = JobArena::new();
        assert!(!task.is_running());
        assert_eq!(task.spawn_job(0, &mut jobs), None);
        assert!(jobs.is_empty());
    }

    #[test]
    fn test_spawn_follows_period() {
        let mut task = periodic(1, 5, 2);
        let mut jobs = JobArena::new();
        task.start(0);

        let released: Vec<Time> = (0..12)
            .filter_map(|now| task.spawn_job(now, &mut jobs).map(|_| now))
            .collect();
        assert_eq!(released, vec![0, 5, 10]);
        assert_eq!(task.stats().activations, 3);
        assert_eq!(task.next_activation(), Some(15));
    }

    #[test]
    fn test_complete_on_time_and_late() {
        let mut task = periodic(1, 5, 1);
        let mut jobs = JobArena::new();
        task.start(0);

        let first = must_some(task.spawn_job(0, &mut jobs), "first job");
        must(task.complete_job(&mut jobs, first, 5));
        let second = must_some(task.spawn_job(5, &mut jobs), "second job");
        must(task.complete_job(&mut jobs, second, 11));

        let stats = task.stats();
        assert_eq!(stats.completions, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.current_failure_run, 1);
        assert!(jobs.is_empty());
        assert_approx_eq!(task.current_utility(), 0.5, 1e-12);
    }

    #[test]
    fn test_cancel_counts_lost_cycles() {
        let mut task = periodic(1, 10, 4);
        let mut jobs = JobArena::new();
        task.start(0);

        let h = must_some(task.spawn_job(0, &mut jobs), "job");
        if let Some(job) = jobs.get_mut(h) {
            job.exec_step(0);
            job.exec_step(1);
        }
        assert!(must(task.cancel_job(&mut jobs, h)));

        let stats = task.stats();
        assert_eq!(stats.cancellations, 1);
        assert_eq!(stats.execution_cancellations, 1);
        assert_eq!(stats.lost_execution_cycles, 2);
        assert_eq!(task.utility_count(), 1);
        assert_approx_eq!(task.utility_total(), 0.0, 1e-12);
    }

    #[test]
    fn test_pure_cancellation_loses_nothing() {
        let mut task = periodic(1, 10, 4);
        let mut jobs = JobArena::new();
        task.start(0);
        let h = must_some(task.spawn_job(0, &mut jobs), "job");
        assert!(must(task.cancel_job(&mut jobs, h)));
        assert_eq!(task.stats().execution_cancellations, 0);
        assert_eq!(task.stats().lost_execution_cycles, 0);
    }

    #[test]
    fn test_foreign_job_is_rejected() {
        let mut a = periodic(1, 5, 1);
        let mut b = periodic(2, 5, 1);
        let mut jobs = JobArena::new();
        a.start(0);
        b.start(0);
        let h = must_some(a.spawn_job(0, &mut jobs), "job");
        assert_eq!(
            must_err(b.complete_job(&mut jobs, h, 1)),
            TaskError::ForeignJob {
                task: 2,
                owner: 1,
                job: h
            }
        );
        assert!(jobs.contains(h));
    }

    #[test]
    fn test_failure_histogram() {
        let mut task = periodic(1, 2, 1);
        let mut jobs = JobArena::new();
        task.start(0);

        // fail, fail, ok, fail, ok, fail
        let outcomes = [false, false, true, false, true, false];
        for (n, ok) in outcomes.into_iter().enumerate() {
            let now = Time::try_from(n).unwrap_or(0) * 2;
            let h = must_some(task.spawn_job(now, &mut jobs), "job");
            if ok {
                must(task.complete_job(&mut jobs, h, now + 1));
            } else {
                must(task.cancel_job(&mut jobs, h));
            }
        }
        task.finish_stats();

        let hist = &task.stats().failure_histogram;
        assert_eq!(hist.get(&2), Some(&1));
        assert_eq!(hist.get(&1), Some(&2));
        assert_eq!(task.stats().current_failure_run, 0);
    }

    #[test]
    fn test_mk_task_reports_broken_constraint() {
        let mut task = must(Task::builder(1).execution_time(1).mk_firm(4, 2, 2));
        let mut jobs = JobArena::new();
        task.start(0);
        let h = must_some(task.spawn_job(0, &mut jobs), "job");
        assert!(!must(task.cancel_job(&mut jobs, h)));
        assert_eq!(must_some(task.mk_monitor(), "monitor").current_sum(), 1);
    }

    #[test]
    fn test_distance_defaults_to_one() {
        assert_eq!(periodic(1, 5, 1).distance(), 1);
        let mk = must(Task::builder(2).execution_time(1).mk_firm(5, 1, 3));
        assert_eq!(mk.distance(), 3);
    }

    #[test]
    fn test_what_if_values() {
        let mut task = periodic(1, 5, 2);
        let mut jobs = JobArena::new();
        task.start(0);
        let h = must_some(task.spawn_job(0, &mut jobs), "job");
        let job = must_some(jobs.get(h), "live job");

        assert_approx_eq!(task.possible_exec_value(job, 3), 1.0, 1e-12);
        assert_approx_eq!(task.possible_exec_value(job, 4), 0.0, 1e-12);
        assert_approx_eq!(task.possible_history_value(job, 0), 1.0, 1e-12);
        assert_approx_eq!(task.possible_fail_history_value(), 0.0, 1e-12);
        // What-if evaluation records nothing.
        assert_eq!(task.utility_count(), 0);
    }

    #[test]
    fn test_restart_resets_counters() {
        let mut task = periodic(1, 5, 1);
        let mut jobs = JobArena::new();
        task.start(0);
        let h = must_some(task.spawn_job(0, &mut jobs), "job");
        must(task.complete_job(&mut jobs, h, 1));

        task.start(100);
        assert_eq!(task.stats(), &TaskStats::default());
        assert_eq!(task.next_activation(), Some(100));
        assert_eq!(task.utility_count(), 0);
    }

    #[test]
    fn test_task_set_rejects_duplicates() {
        let err = must_err(TaskSet::new(vec![periodic(1, 5, 1), periodic(1, 6, 1)]));
        assert_eq!(err, SimulationError::DuplicateTask(1));
    }

    #[test]
    fn test_task_set_lookup_and_hyperperiod() {
        let set = must(TaskSet::new(vec![
            periodic(4, 4, 1),
            periodic(6, 6, 1),
            periodic(10, 10, 2),
        ]));
        assert_eq!(set.len(), 3);
        assert_eq!(set.get(6).map(Task::period), Some(6));
        assert!(set.get(5).is_none());
        assert_eq!(set.hyperperiod(), Some(60));
        assert_approx_eq!(set.utilisation(), 0.25 + 1.0 / 6.0 + 0.2, 1e-12);
    }
}
