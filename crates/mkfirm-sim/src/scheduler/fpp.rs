//! Fixed-priority preemptive scheduling.

use super::{ListPolicy, SchedView};
use crate::error::SchedulerResult;
use crate::job::{Job, JobHandle};
use crate::time::{LOWEST_PRIORITY, Priority, Time};

/// Runs the job with the smallest static priority value.
///
/// The list is kept sorted at insertion; jobs of equal priority keep their
/// arrival order, so `schedule` has nothing to do.
#[derive(Debug, Clone, Default)]
pub struct FixedPriority {
    ready: Vec<(Priority, JobHandle)>,
}

impl FixedPriority {
    /// Priorities in dispatch order.
    #[must_use]
    pub fn priorities(&self) -> Vec<Priority> {
        self.ready.iter().map(|&(p, _)| p).collect()
    }
}

impl ListPolicy for FixedPriority {
    const NAME: &'static str = "fpp";

    fn insert(&mut self, view: SchedView<'_>, handle: JobHandle) {
        let priority = view.jobs.get(handle).map_or(LOWEST_PRIORITY, Job::priority);
        let slot = self.ready.partition_point(|&(p, _)| p <= priority);
        self.ready.insert(slot, (priority, handle));
    }

    fn remove(&mut self, handle: JobHandle) -> bool {
        match self.ready.iter().position(|&(_, h)| h == handle) {
            Some(slot) => {
                self.ready.remove(slot);
                true
            }
            None => false,
        }
    }

    fn select(&self, _view: SchedView<'_>, _now: Time) -> SchedulerResult<Option<JobHandle>> {
        Ok(self.ready.first().map(|&(_, h)| h))
    }

    fn order(&self) -> Vec<JobHandle> {
        self.ready.iter().map(|&(_, h)| h).collect()
    }

    fn len(&self) -> usize {
        self.ready.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobArena;
    use crate::task::TaskSet;
    use mkfirm_test_helpers::must;

    #[test]
    fn test_sorted_and_stable() {
        let mut jobs = JobArena::new();
        let tasks = TaskSet::default();
        let priorities = [3, 1, 3, 0, 1];
        let handles: Vec<JobHandle> = priorities
            .iter()
            .map(|&p| jobs.insert(Job::new(1, 0, 0, 1, 10, p)))
            .collect();

        let mut fpp = FixedPriority::default();
        for &h in &handles {
            fpp.insert(SchedView { jobs: &jobs, tasks: &tasks }, h);
        }
        assert_eq!(fpp.priorities(), vec![0, 1, 1, 3, 3]);
        assert_eq!(
            fpp.order(),
            vec![handles[3], handles[1], handles[4], handles[0], handles[2]]
        );
        assert_eq!(
            must(fpp.select(SchedView { jobs: &jobs, tasks: &tasks }, 0)),
            Some(handles[3])
        );
    }
}
