//! The time-stepped simulation driver.
//!
//! A [`Simulation`] exclusively owns one task set, one job arena and one
//! scheduler. Each tick runs the fixed protocol
//!
//! ```text
//! init_step ─▶ cancel_job*  ─▶ spawn_job* ─▶ enqueue_job*
//!           ─▶ schedule ─▶ cancel_job* ─▶ dispatch ─▶ complete_job?
//! ```
//!
//! and then advances `now` by one. A failure whose bit is in
//! [`SimulationConfig::abort_on`] stops the loop at once and leaves `now` at
//! the failing tick.

use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::error::{SchedulerError, SimulationError, SimulationResult};
use crate::exit::ExitCondition;
use crate::job::{Job, JobArena, JobHandle};
use crate::scheduler::{
    DispatchOutcome, SchedContext, SchedView, Scheduler, SchedulerPhase, SchedulerRegistry,
};
use crate::task::TaskSet;
use crate::time::Time;
use crate::trace::TraceContext;

/// Aggregate outcome of a simulation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResults {
    /// Ticks simulated so far, drain included.
    pub simulated_time: Time,
    /// No failure bit was reported by any run or drain.
    pub success: bool,
    pub activations: u64,
    pub completions: u64,
    pub cancellations: u64,
    pub execution_cancellations: u64,
    pub lost_execution_cycles: u64,
    pub misses: u64,
    pub preemptions: u64,
    pub utility_sum: f64,
    pub utility_sample_count: u64,
    /// Ticks that cancelled at least one job.
    pub steps_with_cancellations: u64,
    /// Ticks in which the processor was idle.
    pub idle_steps: u64,
}

#[derive(Debug, Default)]
struct DriverStats {
    cancel_steps: u64,
    idle_steps: u64,
    cancellation_times: Vec<Time>,
}

/// One simulation run over a task set.
#[derive(Debug)]
pub struct Simulation {
    tasks: TaskSet,
    jobs: JobArena,
    scheduler: Box<dyn Scheduler>,
    config: SimulationConfig,
    trace: TraceContext,
    now: Time,
    finalised: bool,
    exit: ExitCondition,
    stats: DriverStats,
}

impl Simulation {
    /// Create a simulation with a scheduler from the default registry.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::UnknownScheduler`] for an unregistered id
    /// and [`SimulationError::InvalidConfig`] for an invalid configuration.
    pub fn new(
        tasks: TaskSet,
        scheduler: &str,
        config: SimulationConfig,
        trace: TraceContext,
    ) -> SimulationResult<Self> {
        Self::with_registry(
            tasks,
            &SchedulerRegistry::with_defaults(),
            scheduler,
            config,
            trace,
        )
    }

    /// Create a simulation with a scheduler from `registry`.
    ///
    /// # Errors
    ///
    /// Same as [`Simulation::new`].
    pub fn with_registry(
        tasks: TaskSet,
        registry: &SchedulerRegistry,
        scheduler: &str,
        config: SimulationConfig,
        trace: TraceContext,
    ) -> SimulationResult<Self> {
        config.validate()?;
        let scheduler = registry.create(scheduler, config.scheduler)?;
        Self::with_scheduler(tasks, scheduler, config, trace)
    }

    /// Create a simulation around an already built scheduler. Its own
    /// switches replace `config.scheduler`.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidConfig`] for an invalid
    /// configuration.
    pub fn with_scheduler(
        mut tasks: TaskSet,
        scheduler: Box<dyn Scheduler>,
        mut config: SimulationConfig,
        trace: TraceContext,
    ) -> SimulationResult<Self> {
        config.validate()?;
        config.scheduler = *scheduler.config();
        let now = 0;
        trace.in_scope(scheduler.name(), || {
            for task in tasks.iter_mut() {
                task.start(now);
            }
            tracing::debug!(tasks = tasks.len(), "simulation created");
        });
        Ok(Self {
            tasks,
            jobs: JobArena::new(),
            scheduler,
            config,
            trace,
            now,
            finalised: false,
            exit: ExitCondition::empty(),
            stats: DriverStats::default(),
        })
    }

    /// Simulate up to `steps` ticks.
    ///
    /// Returns the failure bits that stopped the run, or an empty set if all
    /// ticks ran.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::AlreadyFinalised`] after [`finalise`].
    ///
    /// [`finalise`]: Simulation::finalise
    pub fn run(&mut self, steps: u64) -> SimulationResult<ExitCondition> {
        if self.finalised {
            return Err(SimulationError::AlreadyFinalised);
        }
        let trace = self.trace.clone();
        Ok(trace.in_scope(self.scheduler.name(), || {
            for _ in 0..steps {
                if let ControlFlow::Break(fatal) = self.tick(true) {
                    return fatal;
                }
            }
            ExitCondition::empty()
        }))
    }

    /// Simulate a single tick with activations.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::AlreadyFinalised`] after [`finalise`].
    ///
    /// [`finalise`]: Simulation::finalise
    pub fn step(&mut self) -> SimulationResult<ExitCondition> {
        self.run(1)
    }

    /// Run without activations until the scheduler holds no jobs.
    ///
    /// The drain is bounded by [`SimulationConfig::drain_limit`]; hitting the
    /// bound reports [`ExitCondition::DRAIN_INCOMPLETE`]. Open failure runs
    /// are closed into each task's histogram.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::AlreadyFinalised`] when called twice.
    pub fn finalise(&mut self) -> SimulationResult<ExitCondition> {
        if self.finalised {
            return Err(SimulationError::AlreadyFinalised);
        }
        self.finalised = true;
        let trace = self.trace.clone();
        Ok(trace.in_scope(self.scheduler.name(), || {
            let mut exit = ExitCondition::empty();
            let mut drained = 0_u64;
            while self.scheduler.has_pending_jobs() {
                if drained >= self.config.drain_limit {
                    tracing::warn!(
                        pending = self.scheduler.pending_jobs(),
                        limit = self.config.drain_limit,
                        "drain limit reached"
                    );
                    exit |= ExitCondition::DRAIN_INCOMPLETE;
                    self.exit |= ExitCondition::DRAIN_INCOMPLETE;
                    break;
                }
                if let ControlFlow::Break(fatal) = self.tick(false) {
                    exit |= fatal;
                    break;
                }
                drained = drained.saturating_add(1);
            }
            for task in self.tasks.iter_mut() {
                task.finish_stats();
            }
            tracing::debug!(now = self.now, drained, ?exit, "simulation finalised");
            exit
        }))
    }

    /// One tick of the protocol. Breaks with the failure bits that abort.
    fn tick(&mut self, activate: bool) -> ControlFlow<ExitCondition> {
        let now = self.now;
        tracing::trace!(now, activate, "tick");
        let mut cancel_step_counted = false;

        let view = SchedView {
            jobs: &self.jobs,
            tasks: &self.tasks,
        };
        match self.scheduler.init_step(view, now) {
            Ok(cancelled) => {
                let failed = self.propagate_cancellations(&cancelled, now);
                self.count_cancel_step(cancelled.len(), &mut cancel_step_counted);
                self.gate(failed)?;
            }
            Err(err) => self.gate(Self::scheduler_failure(SchedulerPhase::InitStep, err, now))?,
        }

        if activate {
            let mut released = Vec::new();
            for task in self.tasks.iter_mut() {
                if let Some(handle) = task.spawn_job(now, &mut self.jobs) {
                    released.push(handle);
                }
            }
            let view = SchedView {
                jobs: &self.jobs,
                tasks: &self.tasks,
            };
            for handle in released {
                self.scheduler.enqueue_job(view, handle);
            }
        }

        let view = SchedView {
            jobs: &self.jobs,
            tasks: &self.tasks,
        };
        match self.scheduler.schedule(view, now) {
            Ok(cancelled) => {
                let failed = self.propagate_cancellations(&cancelled, now);
                self.count_cancel_step(cancelled.len(), &mut cancel_step_counted);
                self.gate(failed)?;
            }
            Err(err) => self.gate(Self::scheduler_failure(SchedulerPhase::Schedule, err, now))?,
        }

        let ctx = SchedContext::new(&mut self.jobs, &self.tasks);
        match self.scheduler.dispatch(ctx, now) {
            Ok(DispatchOutcome::Idle) => {
                self.stats.idle_steps = self.stats.idle_steps.saturating_add(1);
            }
            Ok(DispatchOutcome::Executed(_)) => {}
            Ok(DispatchOutcome::Finished(handle)) => {
                let failed = self.complete(handle, now.saturating_add(1));
                self.gate(failed)?;
            }
            Err(err) => self.gate(Self::scheduler_failure(SchedulerPhase::Dispatch, err, now))?,
        }

        self.now = now.saturating_add(1);
        ControlFlow::Continue(())
    }

    /// Count the tick once, before any gate can abort it.
    fn count_cancel_step(&mut self, cancelled: usize, counted: &mut bool) {
        if cancelled > 0 && !*counted {
            *counted = true;
            self.stats.cancel_steps = self.stats.cancel_steps.saturating_add(1);
        }
    }

    fn scheduler_failure(phase: SchedulerPhase, err: SchedulerError, now: Time) -> ExitCondition {
        tracing::warn!(%phase, now, error = %err, "scheduler failure");
        phase.exit_condition()
    }

    /// Split `failed` into bits that abort and bits that are only logged.
    fn gate(&mut self, failed: ExitCondition) -> ControlFlow<ExitCondition> {
        let fatal = failed & self.config.abort_on;
        let masked = failed.difference(self.config.abort_on);
        if !masked.is_empty() {
            tracing::warn!(now = self.now, ?masked, "failure ignored by abort mask");
        }
        if fatal.is_empty() {
            ControlFlow::Continue(())
        } else {
            self.exit |= fatal;
            ControlFlow::Break(fatal)
        }
    }

    fn propagate_cancellations(&mut self, handles: &[JobHandle], now: Time) -> ExitCondition {
        let mut failed = ExitCondition::empty();
        for &handle in handles {
            self.stats.cancellation_times.push(now);
            let Some(owner) = self.jobs.get(handle).map(Job::task) else {
                tracing::warn!(job = %handle, now, "cancelled job is not held by the arena");
                failed |= ExitCondition::CANCELLATION_FAILURE;
                continue;
            };
            let Some(task) = self.tasks.get_mut(owner) else {
                tracing::warn!(job = %handle, task = owner, now, "cancelled job has no task");
                failed |= ExitCondition::CANCELLATION_FAILURE;
                continue;
            };
            match task.cancel_job(&mut self.jobs, handle) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(
                        job = %handle,
                        task = owner,
                        now,
                        "cancellation broke the task's (m,k) constraint"
                    );
                    failed |= ExitCondition::CANCELLATION_FAILURE;
                }
                Err(err) => {
                    tracing::warn!(job = %handle, now, error = %err, "cancellation bookkeeping failed");
                    failed |= ExitCondition::CANCELLATION_FAILURE;
                }
            }
        }
        failed
    }

    fn complete(&mut self, handle: JobHandle, finish: Time) -> ExitCondition {
        let owner = self.jobs.get(handle).map(Job::task);
        let Some(task) = owner.and_then(|id| self.tasks.get_mut(id)) else {
            tracing::warn!(job = %handle, ?owner, "finished job has no owning task");
            return ExitCondition::DISPATCH_FAILURE;
        };
        match task.complete_job(&mut self.jobs, handle, finish) {
            Ok(()) => ExitCondition::empty(),
            Err(err) => {
                tracing::warn!(job = %handle, error = %err, "completion bookkeeping failed");
                ExitCondition::DISPATCH_FAILURE
            }
        }
    }

    /// Aggregate counters over all tasks plus the driver's own counters.
    #[must_use]
    pub fn get_results(&self) -> SimulationResults {
        let mut results = SimulationResults {
            simulated_time: self.now,
            success: !self.exit.is_failure(),
            steps_with_cancellations: self.stats.cancel_steps,
            idle_steps: self.stats.idle_steps,
            ..SimulationResults::default()
        };
        for task in self.tasks.iter() {
            let stats = task.stats();
            results.activations += stats.activations;
            results.completions += stats.completions;
            results.cancellations += stats.cancellations;
            results.execution_cancellations += stats.execution_cancellations;
            results.lost_execution_cycles += stats.lost_execution_cycles;
            results.misses += stats.misses;
            results.preemptions += stats.preemptions;
            results.utility_sum += task.utility_total();
            results.utility_sample_count += task.utility_count();
        }
        results
    }

    #[must_use]
    pub fn get_taskset(&self) -> &TaskSet {
        &self.tasks
    }

    #[must_use]
    pub fn now(&self) -> Time {
        self.now
    }

    #[must_use]
    pub fn jobs(&self) -> &JobArena {
        &self.jobs
    }

    #[must_use]
    pub fn scheduler(&self) -> &dyn Scheduler {
        self.scheduler.as_ref()
    }

    #[must_use]
    pub fn scheduler_name(&self) -> &'static str {
        self.scheduler.name()
    }

    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// All failure bits reported so far.
    #[must_use]
    pub fn exit_condition(&self) -> ExitCondition {
        self.exit
    }

    #[must_use]
    pub fn is_finalised(&self) -> bool {
        self.finalised
    }

    /// Tick of every cancellation, in order.
    #[must_use]
    pub fn cancellation_times(&self) -> &[Time] {
        &self.stats.cancellation_times
    }

    /// Jobs still owned by the arena.
    #[must_use]
    pub fn leaked_jobs(&self) -> usize {
        self.jobs.live()
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        let trace = self.trace.clone();
        trace.in_scope(self.scheduler.name(), || {
            if !self.jobs.is_empty() {
                tracing::error!(
                    leaked = self.jobs.live(),
                    jobs = ?self.jobs.handles(),
                    finalised = self.finalised,
                    "simulation dropped while jobs are still live"
                );
            }
            for handle in self.scheduler.dispatch_order() {
                self.scheduler.remove_job(handle);
            }
        });
    }
}
