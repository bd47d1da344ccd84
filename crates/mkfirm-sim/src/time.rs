//! Logical time primitives.
//!
//! The simulator only knows integer ticks. Time and intervals share one
//! signed representation so that `deadline - remaining` never underflows.

/// A logical instant, measured in ticks from simulation start.
pub type Time = i64;

/// A span of ticks: execution budgets, relative deadlines, periods.
pub type Interval = i64;

/// Static or dynamic job priority. Lower values are more urgent.
pub type Priority = i64;

/// External identifier of a task within a task set.
pub type TaskId = u32;

/// Least urgent priority, used for optional (m,k) instances.
pub const LOWEST_PRIORITY: Priority = Priority::MAX;
