//! The list-dispatch engine shared by every policy.

use std::collections::BTreeSet;

use super::{DispatchOutcome, SchedContext, SchedView, Scheduler};
use crate::config::SchedulerConfig;
use crate::deadline::DeadlineMonitor;
use crate::error::{SchedulerError, SchedulerResult};
use crate::job::JobHandle;
use crate::time::Time;

/// Ordering decisions of a list scheduler.
///
/// The engine guarantees that `insert` sees each live handle once and that
/// `remove` is called when a handle leaves, whether it finished or was
/// cancelled.
pub trait ListPolicy: std::fmt::Debug + Send {
    /// Registry identifier.
    const NAME: &'static str;

    /// Add a ready job.
    fn insert(&mut self, view: SchedView<'_>, handle: JobHandle);

    /// Drop a job. Returns whether it was held.
    fn remove(&mut self, handle: JobHandle) -> bool;

    /// Rebuild the dispatch order. Returned handles are cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if the order cannot be built.
    fn reorder(&mut self, view: SchedView<'_>, now: Time) -> SchedulerResult<Vec<JobHandle>> {
        let _ = (view, now);
        Ok(Vec::new())
    }

    /// The job to run during `[now, now + 1)`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if a held handle is no longer live or the order is
    /// stale.
    fn select(&self, view: SchedView<'_>, now: Time) -> SchedulerResult<Option<JobHandle>>;

    /// Held jobs, most urgent first.
    fn order(&self) -> Vec<JobHandle>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Deadline-monitored list scheduler around an ordering policy.
#[derive(Debug)]
pub struct ListDispatch<P: ListPolicy> {
    policy: P,
    monitor: DeadlineMonitor,
    miss_pending: BTreeSet<JobHandle>,
    config: SchedulerConfig,
    running: Option<JobHandle>,
    last_dispatch: Option<Time>,
}

impl<P: ListPolicy> ListDispatch<P> {
    #[must_use]
    pub fn new(policy: P, config: SchedulerConfig) -> Self {
        Self {
            policy,
            monitor: DeadlineMonitor::new(),
            miss_pending: BTreeSet::new(),
            config,
            running: None,
            last_dispatch: None,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &P {
        &self.policy
    }

    #[must_use]
    pub fn deadline_monitor(&self) -> &DeadlineMonitor {
        &self.monitor
    }

    /// Started jobs waiting for their deadline before being cancelled.
    pub fn miss_pending(&self) -> impl Iterator<Item = JobHandle> + '_ {
        self.miss_pending.iter().copied()
    }

    #[must_use]
    pub fn running(&self) -> Option<JobHandle> {
        self.running
    }

    fn forget(&mut self, handle: JobHandle) -> bool {
        let monitored = self.monitor.remove_job(handle).is_some();
        let pending = self.miss_pending.remove(&handle);
        let listed = self.policy.remove(handle);
        if self.running == Some(handle) {
            self.running = None;
        }
        monitored || pending || listed
    }
}

impl<P: ListPolicy> Scheduler for ListDispatch<P> {
    fn name(&self) -> &'static str {
        P::NAME
    }

    fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    fn enqueue_job(&mut self, view: SchedView<'_>, handle: JobHandle) {
        let Some(job) = view.jobs.get(handle) else {
            tracing::warn!(job = %handle, "ignoring enqueue of a job the arena does not hold");
            return;
        };
        self.monitor.add_job(handle, job);
        self.policy.insert(view, handle);
    }

    fn init_step(&mut self, view: SchedView<'_>, now: Time) -> SchedulerResult<Vec<JobHandle>> {
        let surfaced: Vec<JobHandle> = std::iter::from_fn(|| self.monitor.check(now)).collect();

        // Nothing is cancelled in a sweep that finds a stale handle. Live jobs
        // go back into the monitor and surface again on the next call.
        let stale: Vec<JobHandle> = surfaced
            .iter()
            .chain(self.miss_pending.iter())
            .copied()
            .filter(|&h| !view.jobs.contains(h))
            .collect();
        if let Some(&first) = stale.first() {
            for &handle in &stale {
                self.forget(handle);
            }
            for &handle in &surfaced {
                if let Some(job) = view.jobs.get(handle) {
                    self.monitor.add_job(handle, job);
                }
            }
            return Err(SchedulerError::UnknownJob(first));
        }

        let mut cancelled = Vec::new();
        for handle in surfaced {
            let Some(job) = view.jobs.get(handle) else {
                continue;
            };
            if self.config.allow_execution_cancellation || !job.is_started() {
                self.forget(handle);
                cancelled.push(handle);
            } else if self.config.allow_deadline_miss_cancellation {
                tracing::trace!(job = %handle, deadline = job.deadline(), "deferring cancellation to deadline");
                self.miss_pending.insert(handle);
            } else {
                tracing::trace!(job = %handle, "infeasible job kept running");
            }
        }

        let due: Vec<JobHandle> = self
            .miss_pending
            .iter()
            .copied()
            .filter(|&h| view.jobs.get(h).is_some_and(|job| now >= job.deadline()))
            .collect();
        for handle in due {
            self.forget(handle);
            cancelled.push(handle);
        }

        Ok(cancelled)
    }

    fn schedule(&mut self, view: SchedView<'_>, now: Time) -> SchedulerResult<Vec<JobHandle>> {
        let dropped = self.policy.reorder(view, now)?;
        for &handle in &dropped {
            self.forget(handle);
        }
        Ok(dropped)
    }

    fn dispatch(&mut self, ctx: SchedContext<'_>, now: Time) -> SchedulerResult<DispatchOutcome> {
        if let Some(last) = self.last_dispatch
            && now <= last
        {
            return Err(SchedulerError::NonMonotonicTime { last, now });
        }
        let selected = self.policy.select(ctx.view(), now)?;
        self.last_dispatch = Some(now);

        if let Some(previous) = self.running
            && selected != Some(previous)
            && let Some(job) = ctx.jobs.get_mut(previous)
        {
            job.preempt();
            tracing::trace!(job = %previous, at = now, "preempted");
        }
        self.running = selected;

        let Some(handle) = selected else {
            return Ok(DispatchOutcome::Idle);
        };
        let Some(job) = ctx.jobs.get_mut(handle) else {
            self.forget(handle);
            return Err(SchedulerError::UnknownJob(handle));
        };
        if job.exec_step(now) {
            self.forget(handle);
            Ok(DispatchOutcome::Finished(handle))
        } else {
            self.monitor.job_executed(handle, job);
            Ok(DispatchOutcome::Executed(handle))
        }
    }

    fn remove_job(&mut self, handle: JobHandle) -> bool {
        self.forget(handle)
    }

    fn pending_jobs(&self) -> usize {
        self.policy.len()
    }

    fn dispatch_order(&self) -> Vec<JobHandle> {
        self.policy.order()
    }
}

impl<P: ListPolicy> Drop for ListDispatch<P> {
    fn drop(&mut self) {
        if !self.policy.is_empty() {
            tracing::error!(
                scheduler = P::NAME,
                leaked = self.policy.len(),
                jobs = ?self.policy.order(),
                "scheduler dropped while still holding jobs"
            );
        }
    }
}
