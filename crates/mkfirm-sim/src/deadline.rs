//! Deadline monitor.
//!
//! Keeps the enqueued jobs ordered by latest possible start time so that the
//! list-dispatch engine can drop jobs as soon as they can no longer finish in
//! time.

use std::collections::{BTreeSet, HashMap};

use crate::job::{Job, JobHandle};
use crate::time::Time;

/// Enqueued jobs keyed by latest start time.
#[derive(Debug, Clone, Default)]
pub struct DeadlineMonitor {
    by_start: BTreeSet<(Time, JobHandle)>,
    keys: HashMap<JobHandle, Time>,
}

impl DeadlineMonitor {
    /// Create an empty monitor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start watching `handle`. Re-adding a watched job re-keys it.
    pub fn add_job(&mut self, handle: JobHandle, job: &Job) {
        self.remove_job(handle);
        let key = job.latest_start_time();
        self.by_start.insert((key, handle));
        self.keys.insert(handle, key);
    }

    /// Stop watching `handle`. Returns the handle if it was watched.
    pub fn remove_job(&mut self, handle: JobHandle) -> Option<JobHandle> {
        let key = self.keys.remove(&handle)?;
        self.by_start.remove(&(key, handle));
        Some(handle)
    }

    /// Re-key `handle` after it consumed a tick.
    ///
    /// Jobs the monitor no longer watches (already surfaced by [`check`]) are
    /// ignored.
    ///
    /// [`check`]: DeadlineMonitor::check
    pub fn job_executed(&mut self, handle: JobHandle, job: &Job) {
        if self.keys.contains_key(&handle) {
            self.add_job(handle, job);
        }
    }

    /// Remove and return one job whose latest start time is behind `now`.
    ///
    /// Callers loop until `None`.
    pub fn check(&mut self, now: Time) -> Option<JobHandle> {
        let &(key, handle) = self.by_start.first()?;
        if key >= now {
            return None;
        }
        self.by_start.remove(&(key, handle));
        self.keys.remove(&handle);
        Some(handle)
    }

    #[must_use]
    pub fn contains(&self, handle: JobHandle) -> bool {
        self.keys.contains_key(&handle)
    }

    /// Latest start time the monitor currently holds for `handle`.
    #[must_use]
    pub fn latest_start(&self, handle: JobHandle) -> Option<Time> {
        self.keys.get(&handle).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobArena;

    #[test]
    fn test_check_surfaces_only_infeasible_jobs() {
        let mut arena = JobArena::new();
        let early = arena.insert(Job::new(1, 0, 0, 2, 4, 0));
        let late = arena.insert(Job::new(2, 0, 0, 2, 10, 0));

        let mut monitor = DeadlineMonitor::new();
        for h in [early, late] {
            if let Some(job) = arena.get(h) {
                monitor.add_job(h, job);
            }
        }

        assert_eq!(monitor.check(2), None);
        assert_eq!(monitor.check(3), Some(early));
        assert_eq!(monitor.check(3), None);
        assert!(!monitor.contains(early));
        assert!(monitor.contains(late));
        assert_eq!(monitor.check(9), Some(late));
        assert!(monitor.is_empty());
    }

    #[test]
    fn test_executed_job_is_rekeyed() {
        let mut arena = JobArena::new();
        let h = arena.insert(Job::new(1, 0, 0, 3, 5, 0));
        let mut monitor = DeadlineMonitor::new();
        if let Some(job) = arena.get(h) {
            monitor.add_job(h, job);
        }
        assert_eq!(monitor.latest_start(h), Some(2));

        if let Some(job) = arena.get_mut(h) {
            job.exec_step(0);
        }
        if let Some(job) = arena.get(h) {
            monitor.job_executed(h, job);
        }
        assert_eq!(monitor.latest_start(h), Some(3));
        assert_eq!(monitor.check(3), None);
        assert_eq!(monitor.check(4), Some(h));
    }

    #[test]
    fn test_remove_by_identity() {
        let mut arena = JobArena::new();
        let a = arena.insert(Job::new(1, 0, 0, 1, 3, 0));
        let b = arena.insert(Job::new(1, 1, 0, 1, 3, 0));
        let mut monitor = DeadlineMonitor::new();
        for h in [a, b] {
            if let Some(job) = arena.get(h) {
                monitor.add_job(h, job);
            }
        }

        assert_eq!(monitor.remove_job(a), Some(a));
        assert_eq!(monitor.remove_job(a), None);
        assert_eq!(monitor.len(), 1);
        assert_eq!(monitor.check(10), Some(b));
    }

    #[test]
    fn test_executed_untracked_job_is_ignored() {
        let mut arena = JobArena::new();
        let h = arena.insert(Job::new(1, 0, 0, 2, 2, 0));
        let mut monitor = DeadlineMonitor::new();
        if let Some(job) = arena.get(h) {
            monitor.job_executed(h, job);
        }
        assert!(monitor.is_empty());
    }
}
