//! Error types for the simulator.
//!
//! In-simulation scheduling outcomes ([`SchedulerError`], [`TaskError`]) are
//! values the driver folds into an [`ExitCondition`](crate::ExitCondition).
//! [`SimulationError`] is reserved for misuse of the public API.

use thiserror::Error;

use crate::job::JobHandle;
use crate::time::{Interval, TaskId, Time};

/// Errors raised while building or reading an (m,k) window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MkError {
    /// The window is packed into a `u64`, so `k` cannot exceed 64.
    #[error("(m,k) window of size {k} exceeds the 64-slot limit")]
    WindowTooLarge {
        /// Requested window size.
        k: u32,
    },

    /// `k` must be positive and `m` may not exceed it.
    #[error("invalid (m,k) constraint ({m},{k})")]
    InvalidWindow {
        /// Required successes.
        m: u32,
        /// Window size.
        k: u32,
    },
}

/// Errors raised by task construction and job bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// A task parameter is out of range.
    #[error("invalid task parameter: {0}")]
    InvalidParameter(String),

    /// The (m,k) window could not be built.
    #[error(transparent)]
    Window(#[from] MkError),

    /// Completion or cancellation found no job behind the handle.
    #[error("{0} is not held by the job arena")]
    UnknownJob(JobHandle),

    /// A job was handed to a task that did not spawn it.
    #[error("{job} belongs to task {owner}, not task {task}")]
    ForeignJob {
        /// Task that received the job.
        task: TaskId,
        /// Task that spawned the job.
        owner: TaskId,
        /// The job handle.
        job: JobHandle,
    },
}

impl TaskError {
    /// Create an invalid parameter error.
    #[must_use]
    pub fn invalid_parameter(reason: impl Into<String>) -> Self {
        Self::InvalidParameter(reason.into())
    }

    pub(crate) fn require_positive(name: &str, value: Interval) -> TaskResult<()> {
        if value <= 0 {
            return Err(Self::invalid_parameter(format!(
                "{name} must be positive, got {value}"
            )));
        }
        Ok(())
    }
}

/// Failures a scheduler reports from `init_step`, `schedule` or `dispatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// `dispatch` was called with a time that did not advance.
    #[error("time did not advance: last dispatch at {last}, now {now}")]
    NonMonotonicTime {
        /// Time of the previous dispatch.
        last: Time,
        /// Offending time argument.
        now: Time,
    },

    /// A handle in the scheduler's working set has no job behind it.
    #[error("{0} is not held by the job arena")]
    UnknownJob(JobHandle),

    /// A job refers to a task outside the task set.
    #[error("task {0} is not part of the task set")]
    UnknownTask(TaskId),

    /// Jobs were added or removed after the last `schedule` call.
    #[error("job list changed since the last schedule call")]
    JobListChanged,
}

/// Misuse of the simulation API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    /// `run` or `finalise` called after the simulation was finalised.
    #[error("simulation already finalised")]
    AlreadyFinalised,

    /// No scheduler is registered under the identifier.
    #[error("unknown scheduler: {0}")]
    UnknownScheduler(String),

    /// Two tasks in the set share an identifier.
    #[error("duplicate task id {0}")]
    DuplicateTask(TaskId),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A task could not be built.
    #[error(transparent)]
    Task(#[from] TaskError),
}

impl SimulationError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }
}

/// A specialized `Result` type for (m,k) window operations.
pub type MkResult<T> = std::result::Result<T, MkError>;

/// A specialized `Result` type for task operations.
pub type TaskResult<T> = std::result::Result<T, TaskError>;

/// A specialized `Result` type for scheduler operations.
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

/// A specialized `Result` type for simulation API calls.
pub type SimulationResult<T> = std::result::Result<T, SimulationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MkError::WindowTooLarge { k: 65 };
        assert!(err.to_string().contains("65"));

        let err = SchedulerError::NonMonotonicTime { last: 4, now: 4 };
        assert_eq!(err.to_string(), "time did not advance: last dispatch at 4, now 4");

        let err = TaskError::ForeignJob {
            task: 1,
            owner: 2,
            job: JobHandle::from_raw(7),
        };
        assert!(err.to_string().contains("job#7"));
    }

    #[test]
    fn test_window_error_is_transparent() {
        let err: TaskError = MkError::InvalidWindow { m: 4, k: 3 }.into();
        assert_eq!(err.to_string(), "invalid (m,k) constraint (4,3)");

        let err: SimulationError = err.into();
        assert!(matches!(err, SimulationError::Task(TaskError::Window(_))));
    }

    #[test]
    fn test_require_positive() {
        assert_eq!(TaskError::require_positive("period", 5), Ok(()));
        assert!(matches!(
            TaskError::require_positive("period", 0),
            Err(TaskError::InvalidParameter(_))
        ));
    }
}
