//! Logical-time simulator for (m,k)-firm real-time scheduling.
//!
//! Tasks release jobs on a logical tick clock; a pluggable scheduler decides
//! which job runs each tick, cancels jobs that can no longer meet their
//! deadline, and the driver tracks per-task statistics and (m,k) compliance.
//!
//! - **Job / JobArena**: jobs are owned by an arena and referenced by
//!   handle; only task hooks release them
//! - **DeadlineMonitor**: surfaces jobs whose latest start time has passed
//! - **MkMonitor**: sliding window of the last k outcomes of a task
//! - **Task**: periodic, sporadic and three (m,k)-firm variants
//! - **Scheduler**: list dispatch, fixed priority (`fpp`), GDPA (`gdpa`) and
//!   simplified GDPA (`gdpas`)
//! - **Simulation**: the per-tick driver
//!
//! # Example
//!
//! ```
//! use mkfirm_sim::{ExitCondition, Simulation, SimulationConfig, Task, TaskSet, TraceContext};
//!
//! let tasks = TaskSet::new(vec![
//!     Task::builder(1).execution_time(2).periodic(5)?,
//!     Task::builder(2).execution_time(1).priority(1).mk_firm(4, 2, 3)?,
//! ])?;
//! let mut sim = Simulation::new(tasks, "fpp", SimulationConfig::default(), TraceContext::none())?;
//!
//! assert_eq!(sim.run(20)?, ExitCondition::empty());
//! sim.finalise()?;
//! assert!(sim.get_results().success);
//! # Ok::<(), mkfirm_sim::SimulationError>(())
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]
#![deny(unused_must_use)]

pub mod config;
pub mod deadline;
pub mod error;
pub mod exit;
pub mod job;
pub mod mk;
pub mod scheduler;
pub mod simulation;
pub mod task;
pub mod time;
pub mod trace;
pub mod utility;

pub mod prelude;

pub use config::{SchedulerConfig, SimulationConfig, SimulationConfigBuilder};
pub use deadline::DeadlineMonitor;
pub use error::{
    MkError, MkResult, SchedulerError, SchedulerResult, SimulationError, SimulationResult,
    TaskError, TaskResult,
};
pub use exit::ExitCondition;
pub use job::{Job, JobArena, JobHandle};
pub use mk::MkMonitor;
pub use scheduler::{
    DispatchOutcome, Fifo, FixedPriority, Gdpa, GdpaSimplified, ListDispatch, ListPolicy,
    SchedContext, SchedView, Scheduler, SchedulerFactory, SchedulerPhase, SchedulerRegistry,
};
pub use simulation::{Simulation, SimulationResults};
pub use task::{Task, TaskBuilder, TaskKind, TaskParams, TaskSet, TaskStats};
pub use time::{Interval, LOWEST_PRIORITY, Priority, TaskId, Time};
pub use trace::TraceContext;
pub use utility::{
    DeadlineStepUtility, MeanAggregator, UtilityAggregator, UtilityCalculator, WindowAggregator,
};
