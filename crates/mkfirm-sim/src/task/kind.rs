//! Task variants and their four hooks.
//!
//! Every variant answers the same four questions: when it first activates
//! and how far apart its activations are, what job it releases, and what
//! happens to its state when a job completes or is cancelled. The completion
//! and cancellation hooks are the only place a job leaves the arena.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{TaskError, TaskResult};
use crate::job::{Job, JobArena, JobHandle};
use crate::mk::MkMonitor;
use crate::time::{Interval, LOWEST_PRIORITY, Priority, TaskId, Time};

/// Parameters shared by every task variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskParams {
    pub id: TaskId,
    pub execution_time: Interval,
    pub relative_deadline: Interval,
    pub priority: Priority,
    /// Offset of the first activation from `start`.
    pub phase: Interval,
}

/// Closed set of task behaviours.
#[derive(Debug, Clone)]
pub enum TaskKind {
    /// Strictly periodic releases.
    Periodic {
        period: Interval,
    },
    /// Releases separated by at least `min_interarrival`, plus a uniformly
    /// drawn extra delay of up to `max_extra` ticks.
    Sporadic {
        min_interarrival: Interval,
        max_extra: Interval,
        seed: u64,
        rng: StdRng,
    },
    /// (m,k)-firm task; any pattern of m successes per window is acceptable.
    MkFree {
        period: Interval,
        monitor: MkMonitor,
        seed: Option<u64>,
    },
    /// (m,k)-firm task with an evenly distributed mandatory pattern rotated
    /// by `spin`. Optional instances run at the lowest priority.
    MkFixed {
        period: Interval,
        monitor: MkMonitor,
        seed: Option<u64>,
        spin: u32,
    },
    /// (m,k)-firm task whose jobs take their distance to failure as priority.
    DistancePriority {
        period: Interval,
        monitor: MkMonitor,
        seed: Option<u64>,
    },
}

/// Whether instance `instance` is mandatory in the evenly distributed
/// (m,k) pattern rotated by `spin`.
///
/// Instance `j` maps to `i = (j + spin) mod k` and is mandatory iff
/// `i == floor(ceil(i * m / k) * k / m)`.
#[must_use]
pub fn is_mandatory_instance(m: u32, k: u32, spin: u32, instance: u64) -> bool {
    if m == 0 || k == 0 {
        return false;
    }
    let (m, k) = (u64::from(m), u64::from(k));
    let i = instance.wrapping_add(u64::from(spin)) % k;
    let c = (i * m).div_ceil(k);
    i == c * k / m
}

fn release(jobs: &mut JobArena, handle: JobHandle) -> TaskResult<Job> {
    jobs.release(handle).ok_or(TaskError::UnknownJob(handle))
}

impl TaskKind {
    /// Short variant name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Periodic { .. } => "periodic",
            Self::Sporadic { .. } => "sporadic",
            Self::MkFree { .. } => "mk-free",
            Self::MkFixed { .. } => "mk-fixed",
            Self::DistancePriority { .. } => "distance-priority",
        }
    }

    /// Nominal period, or the minimum inter-arrival time for sporadic tasks.
    #[must_use]
    pub fn period(&self) -> Interval {
        match self {
            Self::Periodic { period }
            | Self::MkFree { period, .. }
            | Self::MkFixed { period, .. }
            | Self::DistancePriority { period, .. } => *period,
            Self::Sporadic {
                min_interarrival, ..
            } => *min_interarrival,
        }
    }

    #[must_use]
    pub fn monitor(&self) -> Option<&MkMonitor> {
        match self {
            Self::MkFree { monitor, .. }
            | Self::MkFixed { monitor, .. }
            | Self::DistancePriority { monitor, .. } => Some(monitor),
            Self::Periodic { .. } | Self::Sporadic { .. } => None,
        }
    }

    fn monitor_mut(&mut self) -> Option<&mut MkMonitor> {
        match self {
            Self::MkFree { monitor, .. }
            | Self::MkFixed { monitor, .. }
            | Self::DistancePriority { monitor, .. } => Some(monitor),
            Self::Periodic { .. } | Self::Sporadic { .. } => None,
        }
    }

    /// Distance to failure: 1 unless the variant carries an (m,k) window.
    #[must_use]
    pub fn distance(&self) -> u32 {
        self.monitor().map_or(1, MkMonitor::distance)
    }

    /// Whether `instance` must meet its deadline to keep the constraint.
    #[must_use]
    pub fn is_mandatory(&self, instance: u64) -> bool {
        match self {
            Self::MkFixed { monitor, spin, .. } => {
                is_mandatory_instance(monitor.m(), monitor.k(), *spin, instance)
            }
            _ => true,
        }
    }

    /// Restore the variant's initial state.
    pub(crate) fn reset(&mut self) {
        match self {
            Self::Periodic { .. } => {}
            Self::Sporadic { seed, rng, .. } => *rng = StdRng::seed_from_u64(*seed),
            Self::MkFree { monitor, seed, .. }
            | Self::MkFixed { monitor, seed, .. }
            | Self::DistancePriority { monitor, seed, .. } => monitor.reset(*seed),
        }
    }

    /// Offset of the first activation from `start`.
    pub(crate) fn first_offset(&mut self, phase: Interval) -> Interval {
        match self {
            Self::Sporadic { max_extra, rng, .. } => {
                phase.saturating_add(rng.random_range(0..=*max_extra))
            }
            _ => phase,
        }
    }

    /// Offset from one activation to the next.
    pub(crate) fn next_offset(&mut self) -> Interval {
        match self {
            Self::Sporadic {
                min_interarrival,
                max_extra,
                rng,
                ..
            } => min_interarrival.saturating_add(rng.random_range(0..=*max_extra)),
            _ => self.period(),
        }
    }

    /// Spawn hook: release instance `instance` at `activation`.
    pub(crate) fn spawn(
        &mut self,
        params: &TaskParams,
        instance: u64,
        activation: Time,
        jobs: &mut JobArena,
    ) -> JobHandle {
        let priority = if !self.is_mandatory(instance) {
            LOWEST_PRIORITY
        } else if let Self::DistancePriority { monitor, .. } = self {
            Priority::from(monitor.distance())
        } else {
            params.priority
        };
        jobs.insert(Job::new(
            params.id,
            instance,
            activation,
            params.execution_time,
            params.relative_deadline,
            priority,
        ))
    }

    /// Completion hook: record the outcome and release the job.
    pub(crate) fn on_complete(
        &mut self,
        jobs: &mut JobArena,
        handle: JobHandle,
        on_time: bool,
    ) -> TaskResult<Job> {
        let job = release(jobs, handle)?;
        if let Some(monitor) = self.monitor_mut() {
            monitor.push(on_time);
        }
        Ok(job)
    }

    /// Cancellation hook: record the failure and release the job.
    ///
    /// Returns whether the task's constraint still holds. A fixed-pattern
    /// task only reports a broken constraint when a mandatory instance was
    /// dropped.
    pub(crate) fn on_cancel(
        &mut self,
        jobs: &mut JobArena,
        handle: JobHandle,
    ) -> TaskResult<(Job, bool)> {
        let job = release(jobs, handle)?;
        let mandatory = self.is_mandatory(job.id());
        let valid = match self.monitor_mut() {
            Some(monitor) => {
                monitor.push(false);
                !mandatory || monitor.is_valid()
            }
            None => true,
        };
        Ok((job, valid))
    }
}
