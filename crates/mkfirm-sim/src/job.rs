//! Jobs and the arena that owns them.
//!
//! A [`Job`] is one activation of a task. All live jobs sit in a single
//! [`JobArena`]; schedulers and the deadline monitor only ever hold
//! [`JobHandle`]s. The arena's `release` is crate-private and only called from
//! the task completion and cancellation hooks, so a job leaves the arena at
//! exactly one place.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::time::{Interval, Priority, TaskId, Time};

/// Stable reference to a job in a [`JobArena`].
///
/// Handles are never reused and order by creation, so comparing handles
/// compares arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobHandle(u64);

impl JobHandle {
    /// Build a handle from its raw value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw handle value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

/// One instance of work produced by a task.
///
/// `deadline` is fixed at creation as `activation + relative_deadline`.
/// `remaining` only ever decreases, one unit per executed tick, and the cached
/// latest start time follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    task: TaskId,
    id: u64,
    activation: Time,
    execution_time: Interval,
    deadline: Time,
    priority: Priority,
    remaining: Interval,
    preemptions: u32,
    latest_start: Time,
    first_executed: Option<Time>,
}

impl Job {
    /// Create a job released at `activation`.
    #[must_use]
    pub fn new(
        task: TaskId,
        id: u64,
        activation: Time,
        execution_time: Interval,
        relative_deadline: Interval,
        priority: Priority,
    ) -> Self {
        let deadline = activation.saturating_add(relative_deadline);
        let remaining = execution_time.max(0);
        Self {
            task,
            id,
            activation,
            execution_time: remaining,
            deadline,
            priority,
            remaining,
            preemptions: 0,
            latest_start: deadline.saturating_sub(remaining),
            first_executed: None,
        }
    }

    /// Owning task.
    #[inline]
    #[must_use]
    pub fn task(&self) -> TaskId {
        self.task
    }

    /// Instance number within the owning task.
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn activation(&self) -> Time {
        self.activation
    }

    /// Execution budget at release.
    #[inline]
    #[must_use]
    pub fn execution_time(&self) -> Interval {
        self.execution_time
    }

    /// Absolute deadline.
    #[inline]
    #[must_use]
    pub fn deadline(&self) -> Time {
        self.deadline
    }

    #[inline]
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    #[inline]
    #[must_use]
    pub fn remaining(&self) -> Interval {
        self.remaining
    }

    #[inline]
    #[must_use]
    pub fn preemptions(&self) -> u32 {
        self.preemptions
    }

    /// Tick at which the job first ran, if it has run at all.
    #[inline]
    #[must_use]
    pub fn first_executed(&self) -> Option<Time> {
        self.first_executed
    }

    /// Cached latest start time, `deadline - remaining`.
    #[inline]
    #[must_use]
    pub fn latest_start_time(&self) -> Time {
        self.latest_start
    }

    /// Ticks of budget already consumed.
    #[inline]
    #[must_use]
    pub fn consumed(&self) -> Interval {
        self.execution_time.saturating_sub(self.remaining)
    }

    /// Whether some of the budget has been consumed.
    #[inline]
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.remaining < self.execution_time
    }

    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    /// Execute one tick at `now`.
    ///
    /// Returns `true` iff the remaining budget is now zero. Callers never step
    /// a completed job; if they do, the budget stays at zero.
    pub fn exec_step(&mut self, now: Time) -> bool {
        if self.first_executed.is_none() {
            self.first_executed = Some(now);
        }
        self.remaining = self.remaining.saturating_sub(1).max(0);
        self.update_latest_start_time();
        self.remaining == 0
    }

    /// Count a preemption. The scheduler calls this when it switches away from
    /// this job while it still has work left.
    pub fn preempt(&mut self) {
        self.preemptions = self.preemptions.saturating_add(1);
    }

    /// Whether the job can still meet its deadline when started at `now`.
    #[must_use]
    pub fn is_feasible(&self, now: Time) -> bool {
        now <= self.deadline.saturating_sub(self.remaining)
    }

    /// Recompute the cached latest start time. Required after every change
    /// of the remaining budget.
    pub fn update_latest_start_time(&mut self) {
        self.latest_start = self.deadline.saturating_sub(self.remaining);
    }
}

/// Owner of every live job in a simulation.
#[derive(Debug, Default)]
pub struct JobArena {
    jobs: HashMap<JobHandle, Job>,
    next: u64,
}

impl JobArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `job` and return its handle.
    pub fn insert(&mut self, job: Job) -> JobHandle {
        let handle = JobHandle(self.next);
        self.next = self.next.saturating_add(1);
        self.jobs.insert(handle, job);
        handle
    }

    #[must_use]
    pub fn get(&self, handle: JobHandle) -> Option<&Job> {
        self.jobs.get(&handle)
    }

    #[must_use]
    pub fn get_mut(&mut self, handle: JobHandle) -> Option<&mut Job> {
        self.jobs.get_mut(&handle)
    }

    #[must_use]
    pub fn contains(&self, handle: JobHandle) -> bool {
        self.jobs.contains_key(&handle)
    }

    /// Number of jobs still owned by the arena.
    #[must_use]
    pub fn live(&self) -> usize {
        self.jobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Handles of all live jobs in arrival order.
    #[must_use]
    pub fn handles(&self) -> Vec<JobHandle> {
        let mut handles: Vec<JobHandle> = self.jobs.keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    /// Remove a job from the arena. Only task hooks release jobs.
    pub(crate) fn release(&mut self, handle: JobHandle) -> Option<Job> {
        self.jobs.remove(&handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(execution_time: Interval, relative_deadline: Interval) -> Job {
        Job::new(1, 0, 10, execution_time, relative_deadline, 3)
    }

    #[test]
    fn test_job_creation() {
        let j = job(2, 5);
        assert_eq!(j.deadline(), 15);
        assert_eq!(j.remaining(), 2);
        assert_eq!(j.latest_start_time(), 13);
        assert!(!j.is_started());
        assert_eq!(j.first_executed(), None);
    }

    #[test]
    fn test_exec_step_counts_down() {
        let mut j = job(3, 10);
        assert!(!j.exec_step(10));
        assert_eq!(j.remaining(), 2);
        assert_eq!(j.latest_start_time(), 18);
        assert!(j.is_started());
        assert_eq!(j.first_executed(), Some(10));

        assert!(!j.exec_step(11));
        assert!(j.exec_step(12));
        assert!(j.is_complete());
        assert_eq!(j.consumed(), 3);
        assert_eq!(j.first_executed(), Some(10));
    }

    #[test]
    fn test_feasibility_boundary() {
        let j = job(2, 5);
        assert!(j.is_feasible(13));
        assert!(!j.is_feasible(14));
    }

    #[test]
    fn test_preempt_counts() {
        let mut j = job(2, 5);
        j.preempt();
        j.preempt();
        assert_eq!(j.preemptions(), 2);
    }

    #[test]
    fn test_arena_handles_are_unique_and_ordered() {
        let mut arena = JobArena::new();
        let a = arena.insert(job(1, 1));
        let b = arena.insert(job(1, 1));
        assert!(a < b);
        assert_eq!(arena.live(), 2);
        assert_eq!(arena.handles(), vec![a, b]);

        assert!(arena.release(a).is_some());
        assert!(arena.release(a).is_none());
        assert!(!arena.contains(a));

        let c = arena.insert(job(1, 1));
        assert_ne!(c, a);
        assert_eq!(arena.live(), 2);
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(JobHandle::from_raw(12).to_string(), "job#12");
    }
}
