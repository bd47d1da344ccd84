//! Schedulers and the per-tick protocol they implement.
//!
//! Every scheduler is a [`ListDispatch`] engine around a [`ListPolicy`]. The
//! engine owns the deadline monitor, the miss-pending set and the one-tick
//! dispatch logic; the policy only decides the order of ready jobs.
//!
//! Per tick the driver calls, in order:
//!
//! 1. [`Scheduler::init_step`] to collect deadline-driven cancellations
//! 2. [`Scheduler::enqueue_job`] for every job released this tick
//! 3. [`Scheduler::schedule`] to let the policy reorder
//! 4. [`Scheduler::dispatch`] to execute one tick of the chosen job
//!
//! Schedulers never release jobs. Every handle they return from `init_step`
//! or `schedule` must be passed to the owning task's `cancel_job`, and every
//! finished handle to its `complete_job`.

mod fifo;
mod fpp;
mod gdpa;
mod gdpa_simplified;
mod list;
mod registry;

use std::fmt;

use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::exit::ExitCondition;
use crate::job::{Job, JobArena, JobHandle};
use crate::task::{Task, TaskSet};
use crate::time::{Interval, Time};

pub use fifo::Fifo;
pub use fpp::FixedPriority;
pub use gdpa::Gdpa;
pub use gdpa_simplified::GdpaSimplified;
pub use list::{ListDispatch, ListPolicy};
pub use registry::{SchedulerFactory, SchedulerRegistry};

/// Read-only access to the jobs and tasks of a simulation.
#[derive(Debug, Clone, Copy)]
pub struct SchedView<'a> {
    pub jobs: &'a JobArena,
    pub tasks: &'a TaskSet,
}

impl<'a> SchedView<'a> {
    /// Look up a job the scheduler holds.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnknownJob`] if the arena has no such job.
    pub fn job(&self, handle: JobHandle) -> SchedulerResult<&'a Job> {
        self.jobs
            .get(handle)
            .ok_or(SchedulerError::UnknownJob(handle))
    }

    /// Look up the task that spawned `job`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnknownTask`] if the task set has no such
    /// task.
    pub fn task_of(&self, job: &Job) -> SchedulerResult<&'a Task> {
        self.tasks
            .get(job.task())
            .ok_or(SchedulerError::UnknownTask(job.task()))
    }
}

/// Mutable access to the jobs of a simulation plus read access to its tasks.
#[derive(Debug)]
pub struct SchedContext<'a> {
    pub jobs: &'a mut JobArena,
    pub tasks: &'a TaskSet,
}

impl<'a> SchedContext<'a> {
    pub fn new(jobs: &'a mut JobArena, tasks: &'a TaskSet) -> Self {
        Self { jobs, tasks }
    }

    #[must_use]
    pub fn view(&self) -> SchedView<'_> {
        SchedView {
            jobs: self.jobs,
            tasks: self.tasks,
        }
    }
}

/// What one dispatch tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No job was eligible.
    Idle,
    /// The job executed one tick and still has work left.
    Executed(JobHandle),
    /// The job executed its last tick and left the scheduler.
    Finished(JobHandle),
}

impl DispatchOutcome {
    #[must_use]
    pub fn job(self) -> Option<JobHandle> {
        match self {
            Self::Idle => None,
            Self::Executed(h) | Self::Finished(h) => Some(h),
        }
    }

    #[must_use]
    pub fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Protocol phase a scheduler error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    InitStep,
    Schedule,
    Dispatch,
}

impl SchedulerPhase {
    /// Exit bit a failure in this phase trips.
    #[must_use]
    pub fn exit_condition(self) -> ExitCondition {
        match self {
            Self::InitStep => ExitCondition::INIT_STEP_FAILURE,
            Self::Schedule => ExitCondition::SCHEDULE_FAILURE,
            Self::Dispatch => ExitCondition::DISPATCH_FAILURE,
        }
    }
}

impl fmt::Display for SchedulerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InitStep => "init_step",
            Self::Schedule => "schedule",
            Self::Dispatch => "dispatch",
        })
    }
}

/// A scheduling policy driven one tick at a time.
pub trait Scheduler: fmt::Debug + Send {
    /// Registry identifier of the policy.
    fn name(&self) -> &'static str;

    fn config(&self) -> &SchedulerConfig;

    /// Accept a newly released job. Handles without a live job are ignored.
    fn enqueue_job(&mut self, ctx: SchedView<'_>, handle: JobHandle);

    /// Collect jobs that can no longer meet their deadline.
    ///
    /// # Errors
    ///
    /// Returns an error if a tracked handle has no job behind it.
    fn init_step(&mut self, ctx: SchedView<'_>, now: Time) -> SchedulerResult<Vec<JobHandle>>;

    /// Let the policy rebuild its dispatch order.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy cannot build an ordering.
    fn schedule(&mut self, ctx: SchedView<'_>, now: Time) -> SchedulerResult<Vec<JobHandle>>;

    /// Execute the interval `[now, now + 1)`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NonMonotonicTime`] unless `now` is later than
    /// the previous dispatch, and policy errors such as
    /// [`SchedulerError::JobListChanged`].
    fn dispatch(&mut self, ctx: SchedContext<'_>, now: Time) -> SchedulerResult<DispatchOutcome>;

    /// Forget a job without reporting it. Returns whether it was held.
    fn remove_job(&mut self, handle: JobHandle) -> bool;

    /// Number of jobs the scheduler holds.
    fn pending_jobs(&self) -> usize;

    fn has_pending_jobs(&self) -> bool {
        self.pending_jobs() > 0
    }

    /// Current dispatch order, most urgent first.
    fn dispatch_order(&self) -> Vec<JobHandle>;
}

/// Whether running `jobs` back to back from `now`, in the given order, meets
/// every deadline. Each item is `(remaining, deadline)`.
#[must_use]
pub fn edf_feasible<I>(now: Time, jobs: I) -> bool
where
    I: IntoIterator<Item = (Interval, Time)>,
{
    let mut t = now;
    jobs.into_iter().all(|(remaining, deadline)| {
        t = t.saturating_add(remaining);
        t <= deadline
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edf_feasible() {
        assert!(edf_feasible(0, std::iter::empty()));
        assert!(edf_feasible(0, [(3, 3), (2, 5)]));
        assert!(!edf_feasible(0, [(3, 3), (3, 5)]));
        assert!(!edf_feasible(1, [(3, 3)]));
        assert!(edf_feasible(2, [(1, 3)]));
    }

    #[test]
    fn test_phase_exit_bits() {
        assert_eq!(
            SchedulerPhase::InitStep.exit_condition(),
            ExitCondition::INIT_STEP_FAILURE
        );
        assert_eq!(
            SchedulerPhase::Schedule.exit_condition(),
            ExitCondition::SCHEDULE_FAILURE
        );
        assert_eq!(
            SchedulerPhase::Dispatch.exit_condition(),
            ExitCondition::DISPATCH_FAILURE
        );
        assert_eq!(SchedulerPhase::Dispatch.to_string(), "dispatch");
    }

    #[test]
    fn test_outcome_job() {
        let h = JobHandle::from_raw(4);
        assert_eq!(DispatchOutcome::Finished(h).job(), Some(h));
        assert_eq!(DispatchOutcome::Executed(h).job(), Some(h));
        assert!(DispatchOutcome::Idle.is_idle());
        assert_eq!(DispatchOutcome::Idle.job(), None);
    }
}
