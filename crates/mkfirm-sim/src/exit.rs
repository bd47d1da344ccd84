//! Exit conditions of a simulation run.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Why a run or drain stopped early.
    ///
    /// An empty set means the run completed the requested ticks (or drained
    /// every pending job) without a reported failure. Each failure bit can be
    /// masked through [`SimulationConfig::abort_on`](crate::SimulationConfig).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ExitCondition: u32 {
        /// Deadline-driven cancellation in `init_step` failed.
        const INIT_STEP_FAILURE    = 0b0000_0001;

        /// The scheduler could not build an ordering.
        const SCHEDULE_FAILURE     = 0b0000_0010;

        /// A task reported its constraint as permanently broken.
        const CANCELLATION_FAILURE = 0b0000_0100;

        /// Dispatching or completion bookkeeping failed.
        const DISPATCH_FAILURE     = 0b0000_1000;

        /// `finalise` hit its step bound with jobs still pending.
        const DRAIN_INCOMPLETE     = 0b0001_0000;
    }
}

impl ExitCondition {
    /// The maskable failure bits.
    pub const FAILURES: Self = Self::INIT_STEP_FAILURE
        .union(Self::SCHEDULE_FAILURE)
        .union(Self::CANCELLATION_FAILURE)
        .union(Self::DISPATCH_FAILURE);

    /// Whether any failure bit is set.
    #[must_use]
    pub fn is_failure(self) -> bool {
        self.intersects(Self::FAILURES)
    }
}

impl Default for ExitCondition {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_exclude_drain_bit() {
        assert!(ExitCondition::FAILURES.contains(ExitCondition::DISPATCH_FAILURE));
        assert!(!ExitCondition::FAILURES.contains(ExitCondition::DRAIN_INCOMPLETE));
        assert!(!ExitCondition::DRAIN_INCOMPLETE.is_failure());
        assert!(ExitCondition::CANCELLATION_FAILURE.is_failure());
        assert!(!ExitCondition::default().is_failure());
    }

    #[test]
    fn test_bits_are_stable() {
        assert_eq!(ExitCondition::INIT_STEP_FAILURE.bits(), 1);
        assert_eq!(ExitCondition::SCHEDULE_FAILURE.bits(), 2);
        assert_eq!(ExitCondition::CANCELLATION_FAILURE.bits(), 4);
        assert_eq!(ExitCondition::DISPATCH_FAILURE.bits(), 8);
        assert_eq!(ExitCondition::DRAIN_INCOMPLETE.bits(), 16);
    }
}
