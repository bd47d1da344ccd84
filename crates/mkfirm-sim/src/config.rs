//! Scheduler and simulation configuration.

use serde::{Deserialize, Serialize};

use crate::error::{SimulationError, SimulationResult};
use crate::exit::ExitCondition;

/// Cancellation switches shared by every scheduler.
///
/// The two switches decide what `init_step` does with a job the deadline
/// monitor reports as infeasible:
///
/// | execution cancellation | deadline-miss cancellation | started job | unstarted job |
/// |------------------------|----------------------------|-------------|---------------|
/// | allowed                | any                        | cancelled   | cancelled     |
/// | denied                 | allowed                    | cancelled at its deadline | cancelled |
/// | denied                 | denied                     | kept, completes late | cancelled |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Cancel jobs that already consumed part of their budget.
    pub allow_execution_cancellation: bool,
    /// Cancel started jobs once their deadline has passed.
    pub allow_deadline_miss_cancellation: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            allow_execution_cancellation: true,
            allow_deadline_miss_cancellation: true,
        }
    }
}

/// Simulation driver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Failure bits that abort `run` and `finalise`. Failures outside the mask
    /// are logged and otherwise ignored.
    pub abort_on: ExitCondition,
    /// Maximum number of ticks `finalise` spends draining pending jobs.
    pub drain_limit: u64,
    /// Switches handed to the scheduler.
    pub scheduler: SchedulerConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            abort_on: ExitCondition::FAILURES,
            drain_limit: 1_000_000,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidConfig`] if `drain_limit` is zero or
    /// `abort_on` holds a bit that is not a failure bit.
    pub fn validate(&self) -> SimulationResult<()> {
        if self.drain_limit == 0 {
            return Err(SimulationError::invalid_config(
                "drain_limit must be greater than 0",
            ));
        }
        if !ExitCondition::FAILURES.contains(self.abort_on) {
            return Err(SimulationError::invalid_config(format!(
                "abort_on may only hold failure bits, got {:?}",
                self.abort_on
            )));
        }
        Ok(())
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> SimulationConfigBuilder {
        SimulationConfigBuilder::default()
    }
}

/// Builder for `SimulationConfig`.
#[derive(Debug, Default)]
pub struct SimulationConfigBuilder {
    config: SimulationConfig,
}

impl SimulationConfigBuilder {
    /// Set the failure bits that abort a run.
    #[must_use]
    pub fn abort_on(mut self, mask: ExitCondition) -> Self {
        self.config.abort_on = mask;
        self
    }

    /// Set the drain bound of `finalise`.
    #[must_use]
    pub fn drain_limit(mut self, ticks: u64) -> Self {
        self.config.drain_limit = ticks;
        self
    }

    /// Allow or deny cancelling started jobs.
    #[must_use]
    pub fn allow_execution_cancellation(mut self, allow: bool) -> Self {
        self.config.scheduler.allow_execution_cancellation = allow;
        self
    }

    /// Allow or deny cancelling started jobs at their deadline.
    #[must_use]
    pub fn allow_deadline_miss_cancellation(mut self, allow: bool) -> Self {
        self.config.scheduler.allow_deadline_miss_cancellation = allow;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> SimulationResult<SimulationConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
