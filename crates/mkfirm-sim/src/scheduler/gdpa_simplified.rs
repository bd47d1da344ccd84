//! Simplified guaranteed dynamic priority assignment.
//!
//! Both candidate orders are maintained incrementally. Feasibility of the
//! whole EDF list is only checked when a dispatch decision is due.

use super::{ListPolicy, SchedView, edf_feasible};
use crate::error::SchedulerResult;
use crate::job::JobHandle;
use crate::task::Task;
use crate::time::{Interval, Time};

/// Distance key captured at enqueue time.
type DistanceKey = (u32, Time, JobHandle);

/// Simplified GDPA policy.
///
/// Dispatches the head of the EDF list while that list is feasible as a
/// whole, and the head of the distance list otherwise.
#[derive(Debug, Clone, Default)]
pub struct GdpaSimplified {
    by_distance: Vec<DistanceKey>,
    by_deadline: Vec<(Time, JobHandle)>,
}

impl GdpaSimplified {
    /// Jobs ordered by distance to failure, then deadline, then arrival.
    #[must_use]
    pub fn distance_order(&self) -> Vec<JobHandle> {
        self.by_distance.iter().map(|&(_, _, h)| h).collect()
    }

    /// Jobs ordered by deadline, equal deadlines in arrival order.
    #[must_use]
    pub fn deadline_order(&self) -> Vec<JobHandle> {
        self.by_deadline.iter().map(|&(_, h)| h).collect()
    }

    /// Whether the EDF list meets every deadline when started at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if a held handle has no live job.
    pub fn deadline_order_feasible(&self, view: SchedView<'_>, now: Time) -> SchedulerResult<bool> {
        let mut work: Vec<(Interval, Time)> = Vec::with_capacity(self.by_deadline.len());
        for &(deadline, handle) in &self.by_deadline {
            work.push((view.job(handle)?.remaining(), deadline));
        }
        Ok(edf_feasible(now, work))
    }
}

impl ListPolicy for GdpaSimplified {
    const NAME: &'static str = "gdpas";

    fn insert(&mut self, view: SchedView<'_>, handle: JobHandle) {
        let Some(job) = view.jobs.get(handle) else {
            return;
        };
        // A job of an unknown task is treated as having no tolerance left.
        let distance = view.tasks.get(job.task()).map_or(0, Task::distance);
        let key = (distance, job.deadline(), handle);
        let at = self.by_distance.partition_point(|k| *k <= key);
        self.by_distance.insert(at, key);

        let entry = (job.deadline(), handle);
        let at = self.by_deadline.partition_point(|e| *e <= entry);
        self.by_deadline.insert(at, entry);
    }

    fn remove(&mut self, handle: JobHandle) -> bool {
        let before = self.by_deadline.len();
        self.by_deadline.retain(|&(_, h)| h != handle);
        self.by_distance.retain(|&(_, _, h)| h != handle);
        self.by_deadline.len() != before
    }

    fn select(&self, view: SchedView<'_>, now: Time) -> SchedulerResult<Option<JobHandle>> {
        let Some(&(_, edf_head)) = self.by_deadline.first() else {
            return Ok(None);
        };
        if self.deadline_order_feasible(view, now)? {
            return Ok(Some(edf_head));
        }
        Ok(self.by_distance.first().map(|&(_, _, h)| h))
    }

    fn order(&self) -> Vec<JobHandle> {
        self.deadline_order()
    }

    fn len(&self) -> usize {
        self.by_deadline.len()
    }
}
