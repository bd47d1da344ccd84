//! Guaranteed dynamic priority assignment.
//!
//! Each `schedule` call rebuilds a feasible EDF list from scratch. Ready jobs
//! are visited in order of their task's distance to failure, most urgent
//! first; each one is tentatively placed into a copy of the feasible list at
//! its deadline position, and the copy replaces the list only if every job in
//! it still meets its deadline. The cost is quadratic in the number of ready
//! jobs.
//!
//! Jobs that do not fit stay ready. They only run when nothing was admitted,
//! which happens once each of them is past its latest start time. With both
//! cancellation switches off such a job is never cancelled, so it finishes
//! late in otherwise idle ticks.

use super::{ListPolicy, SchedView, edf_feasible};
use crate::error::{SchedulerError, SchedulerResult};
use crate::job::JobHandle;
use crate::time::{Interval, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    deadline: Time,
    remaining: Interval,
    handle: JobHandle,
}

/// Guaranteed dynamic priority assignment policy.
#[derive(Debug, Clone, Default)]
pub struct Gdpa {
    ready: Vec<JobHandle>,
    feasible: Vec<Slot>,
    rejected: Vec<JobHandle>,
    dirty: bool,
}

impl Gdpa {
    /// The admitted jobs in EDF order as of the last `schedule`.
    #[must_use]
    pub fn feasible_list(&self) -> Vec<JobHandle> {
        self.feasible.iter().map(|s| s.handle).collect()
    }

    /// Ready jobs turned away by the last `schedule`, in distance order.
    #[must_use]
    pub fn rejected(&self) -> &[JobHandle] {
        &self.rejected
    }
}

impl ListPolicy for Gdpa {
    const NAME: &'static str = "gdpa";

    fn insert(&mut self, _view: SchedView<'_>, handle: JobHandle) {
        self.ready.push(handle);
        self.dirty = true;
    }

    fn remove(&mut self, handle: JobHandle) -> bool {
        let before = self.ready.len();
        self.ready.retain(|&h| h != handle);
        self.feasible.retain(|s| s.handle != handle);
        self.rejected.retain(|&h| h != handle);
        let removed = self.ready.len() != before;
        if removed {
            self.dirty = true;
        }
        removed
    }

    fn reorder(&mut self, view: SchedView<'_>, now: Time) -> SchedulerResult<Vec<JobHandle>> {
        let mut by_distance = Vec::with_capacity(self.ready.len());
        for &handle in &self.ready {
            let job = view.job(handle)?;
            let distance = view.task_of(job)?.distance();
            by_distance.push((
                distance,
                Slot {
                    deadline: job.deadline(),
                    remaining: job.remaining(),
                    handle,
                },
            ));
        }
        by_distance.sort_by_key(|&(distance, slot)| (distance, slot.deadline, slot.handle));

        let mut feasible: Vec<Slot> = Vec::with_capacity(by_distance.len());
        let mut rejected = Vec::new();
        for (_, slot) in by_distance {
            let mut candidate = feasible.clone();
            let at = candidate.partition_point(|s| s.deadline <= slot.deadline);
            candidate.insert(at, slot);
            if edf_feasible(now, candidate.iter().map(|s| (s.remaining, s.deadline))) {
                feasible = candidate;
            } else {
                tracing::trace!(job = %slot.handle, now, "not admitted to the feasible list");
                rejected.push(slot.handle);
            }
        }

        self.feasible = feasible;
        self.rejected = rejected;
        self.dirty = false;
        Ok(Vec::new())
    }

    fn select(&self, _view: SchedView<'_>, _now: Time) -> SchedulerResult<Option<JobHandle>> {
        if self.dirty {
            return Err(SchedulerError::JobListChanged);
        }
        Ok(self
            .feasible
            .first()
            .map(|s| s.handle)
            .or_else(|| self.rejected.first().copied()))
    }

    fn order(&self) -> Vec<JobHandle> {
        let mut order = self.feasible_list();
        order.extend_from_slice(&self.rejected);
        // Jobs enqueued since the last `schedule`.
        let unscheduled: Vec<JobHandle> =
            self.ready.iter().copied().filter(|h| !order.contains(h)).collect();
        order.extend(unscheduled);
        order
    }

    fn len(&self) -> usize {
        self.ready.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Job, JobArena};
    use crate::task::{Task, TaskSet};
    use mkfirm_test_helpers::{must, must_err};

    fn tasks() -> TaskSet {
        must(TaskSet::new(vec![
            must(Task::builder(1).execution_time(3).deadline(4).periodic(10)),
            must(Task::builder(2).execution_time(3).deadline(3).mk_firm(10, 1, 3)),
        ]))
    }

    #[test]
    fn test_rejects_job_of_tolerant_task() {
        let tasks = tasks();
        let mut jobs = JobArena::new();
        let urgent = jobs.insert(Job::new(1, 0, 0, 3, 4, 0));
        let tolerant = jobs.insert(Job::new(2, 0, 0, 3, 3, 0));
        let view = SchedView { jobs: &jobs, tasks: &tasks };

        let mut gdpa = Gdpa::default();
        gdpa.insert(view, tolerant);
        gdpa.insert(view, urgent);
        assert!(must(gdpa.reorder(view, 0)).is_empty());

        assert_eq!(gdpa.feasible_list(), vec![urgent]);
        assert_eq!(gdpa.rejected(), &[tolerant]);
        assert_eq!(must(gdpa.select(view, 0)), Some(urgent));
        assert_eq!(gdpa.order(), vec![urgent, tolerant]);
    }

    #[test]
    fn test_admits_all_when_feasible_in_edf_order() {
        let tasks = tasks();
        let mut jobs = JobArena::new();
        let a = jobs.insert(Job::new(1, 0, 0, 1, 6, 0));
        let b = jobs.insert(Job::new(2, 0, 0, 2, 3, 0));
        let view = SchedView { jobs: &jobs, tasks: &tasks };

        let mut gdpa = Gdpa::default();
        gdpa.insert(view, a);
        gdpa.insert(view, b);
        must(gdpa.reorder(view, 0));
        // Distance order is a then b, EDF order is b then a.
        assert_eq!(gdpa.feasible_list(), vec![b, a]);
    }

    #[test]
    fn test_select_requires_fresh_schedule() {
        let tasks = tasks();
        let mut jobs = JobArena::new();
        let a = jobs.insert(Job::new(1, 0, 0, 1, 6, 0));
        let view = SchedView { jobs: &jobs, tasks: &tasks };

        let mut gdpa = Gdpa::default();
        gdpa.insert(view, a);
        assert_eq!(must_err(gdpa.select(view, 0)), SchedulerError::JobListChanged);
        must(gdpa.reorder(view, 0));
        assert_eq!(must(gdpa.select(view, 0)), Some(a));
        assert!(gdpa.remove(a));
        assert_eq!(must_err(gdpa.select(view, 0)), SchedulerError::JobListChanged);
    }

    #[test]
    fn test_rejected_job_runs_when_nothing_fits() {
        let tasks = tasks();
        let mut jobs = JobArena::new();
        let late = jobs.insert(Job::new(1, 0, 0, 3, 4, 0));
        let view = SchedView { jobs: &jobs, tasks: &tasks };

        let mut gdpa = Gdpa::default();
        gdpa.insert(view, late);
        must(gdpa.reorder(view, 2));
        assert!(gdpa.feasible_list().is_empty());
        assert_eq!(gdpa.rejected(), &[late]);
        assert_eq!(must(gdpa.select(view, 2)), Some(late));
        assert_eq!(gdpa.len(), 1);
    }

    #[test]
    fn test_admitted_job_runs_before_rejected_ones() {
        let tasks = tasks();
        let mut jobs = JobArena::new();
        let late = jobs.insert(Job::new(1, 0, 0, 3, 4, 0));
        let fresh = jobs.insert(Job::new(2, 0, 2, 2, 5, 0));
        let view = SchedView { jobs: &jobs, tasks: &tasks };

        let mut gdpa = Gdpa::default();
        gdpa.insert(view, late);
        gdpa.insert(view, fresh);
        must(gdpa.reorder(view, 2));
        assert_eq!(gdpa.feasible_list(), vec![fresh]);
        assert_eq!(must(gdpa.select(view, 2)), Some(fresh));
        assert_eq!(gdpa.order(), vec![fresh, late]);
    }

    #[test]
    fn test_order_includes_jobs_not_yet_scheduled() {
        let tasks = tasks();
        let mut jobs = JobArena::new();
        let a = jobs.insert(Job::new(1, 0, 0, 1, 6, 0));
        let b = jobs.insert(Job::new(2, 0, 0, 2, 3, 0));
        let view = SchedView { jobs: &jobs, tasks: &tasks };

        let mut gdpa = Gdpa::default();
        gdpa.insert(view, a);
        must(gdpa.reorder(view, 0));
        gdpa.insert(view, b);
        assert_eq!(gdpa.order(), vec![a, b]);
    }

    #[test]
    fn test_unknown_task_fails_schedule() {
        let tasks = tasks();
        let mut jobs = JobArena::new();
        let stray = jobs.insert(Job::new(9, 0, 0, 1, 4, 0));
        let view = SchedView { jobs: &jobs, tasks: &tasks };

        let mut gdpa = Gdpa::default();
        gdpa.insert(view, stray);
        assert_eq!(must_err(gdpa.reorder(view, 0)), SchedulerError::UnknownTask(9));
    }
}
