//! Prelude module for common simulator types.
//!
//! This module provides a convenient way to import the types needed to build
//! a task set and run a simulation.

pub use crate::config::{SchedulerConfig, SimulationConfig};
pub use crate::error::{SimulationError, SimulationResult, TaskError, TaskResult};
pub use crate::exit::ExitCondition;
pub use crate::job::{Job, JobArena, JobHandle};
pub use crate::scheduler::{DispatchOutcome, Scheduler, SchedulerRegistry};
pub use crate::simulation::{Simulation, SimulationResults};
pub use crate::task::{Task, TaskSet};
pub use crate::time::{Interval, Priority, TaskId, Time};
pub use crate::trace::TraceContext;
