//! Sliding (m,k) window monitor.
//!
//! The last `k` outcomes of a task are packed into a `u64`: the most recent
//! outcome in bit 0, the oldest in bit `k - 1`. Slots that have not been
//! recorded yet start out as successes, so the window is optimistic until it
//! has filled once.

use serde::{Deserialize, Serialize};

use crate::error::{MkError, MkResult};

/// Largest supported window.
pub const MAX_WINDOW: u32 = u64::BITS;

fn window_mask(k: u32) -> u64 {
    if k >= MAX_WINDOW {
        u64::MAX
    } else {
        (1u64 << k) - 1
    }
}

/// Ring buffer of the last `k` pass/fail outcomes of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MkMonitor {
    m: u32,
    k: u32,
    mask: u64,
    state: u64,
    recorded: u32,
    violations: u64,
}

impl MkMonitor {
    /// Create an empty window for an (m,k) constraint.
    ///
    /// # Errors
    ///
    /// Returns [`MkError::WindowTooLarge`] if `k > 64` and
    /// [`MkError::InvalidWindow`] if `k == 0` or `m > k`.
    pub fn new(m: u32, k: u32) -> MkResult<Self> {
        if k > MAX_WINDOW {
            return Err(MkError::WindowTooLarge { k });
        }
        if k == 0 || m > k {
            return Err(MkError::InvalidWindow { m, k });
        }
        let mask = window_mask(k);
        Ok(Self {
            m,
            k,
            mask,
            state: mask,
            recorded: 0,
            violations: 0,
        })
    }

    /// Create a window seeded with a packed history, treated as full.
    ///
    /// # Errors
    ///
    /// Same conditions as [`MkMonitor::new`].
    pub fn with_state(m: u32, k: u32, state: u64) -> MkResult<Self> {
        let mut monitor = Self::new(m, k)?;
        monitor.reset(Some(state));
        Ok(monitor)
    }

    /// Forget the history, restoring an empty window or the seeded one.
    pub fn reset(&mut self, seed: Option<u64>) {
        match seed {
            Some(state) => {
                self.state = state & self.mask;
                self.recorded = self.k;
            }
            None => {
                self.state = self.mask;
                self.recorded = 0;
            }
        }
        self.violations = 0;
    }

    /// Record one outcome, overwriting the oldest slot.
    ///
    /// Once the window has filled, every push that leaves fewer than `m`
    /// successes counts as a violated window.
    pub fn push(&mut self, success: bool) {
        self.state = ((self.state << 1) | u64::from(success)) & self.mask;
        if self.recorded < self.k {
            self.recorded += 1;
        }
        if self.is_filled() && !self.is_valid() {
            self.violations = self.violations.saturating_add(1);
        }
    }

    /// Successes in the window, counting unrecorded slots as successes.
    #[must_use]
    pub fn current_sum(&self) -> u32 {
        self.state.count_ones()
    }

    /// Sum the window would have after pushing `success`.
    #[must_use]
    pub fn sum_after(&self, success: bool) -> u32 {
        (((self.state << 1) | u64::from(success)) & self.mask).count_ones()
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.current_sum() >= self.m
    }

    /// Whether the constraint would still hold after pushing `success`.
    #[must_use]
    pub fn valid_after(&self, success: bool) -> bool {
        self.sum_after(success) >= self.m
    }

    /// Packed window, most recent outcome in bit 0.
    #[must_use]
    pub fn state(&self) -> u64 {
        self.state
    }

    /// Packed window without the most recent outcome.
    ///
    /// Two windows with equal reduced state agree on everything that the next
    /// push can still see, which makes it a cycle-detection key.
    #[must_use]
    pub fn reduced_state(&self) -> u64 {
        self.state >> 1
    }

    /// Consecutive failures the task can still absorb before the window
    /// breaks, plus one.
    ///
    /// Computed as `k - l + 1` where `l` is the 1-based position, counted from
    /// the most recent outcome, of the `m`-th success. Returns 0 if the window
    /// holds fewer than `m` successes and `k + 1` for `m == 0`.
    #[must_use]
    pub fn distance(&self) -> u32 {
        if self.m == 0 {
            return self.k + 1;
        }
        let mut seen = 0;
        for pos in 0..self.k {
            if (self.state >> pos) & 1 == 1 {
                seen += 1;
                if seen == self.m {
                    return self.k - pos;
                }
            }
        }
        0
    }

    #[must_use]
    pub fn m(&self) -> u32 {
        self.m
    }

    #[must_use]
    pub fn k(&self) -> u32 {
        self.k
    }

    /// Number of violated windows observed so far.
    #[must_use]
    pub fn violations(&self) -> u64 {
        self.violations
    }

    /// Outcomes recorded, capped at `k`.
    #[must_use]
    pub fn recorded(&self) -> u32 {
        self.recorded
    }

    /// Whether `k` outcomes have been recorded at least once.
    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.recorded >= self.k
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mkfirm_test_helpers::{must, must_err};

    #[test]
    fn test_window_limits() {
        assert_eq!(
            must_err(MkMonitor::new(1, 65)),
            MkError::WindowTooLarge { k: 65 }
        );
        assert_eq!(
            must_err(MkMonitor::new(4, 3)),
            MkError::InvalidWindow { m: 4, k: 3 }
        );
        assert_eq!(
            must_err(MkMonitor::new(0, 0)),
            MkError::InvalidWindow { m: 0, k: 0 }
        );
        let wide = must(MkMonitor::new(64, 64));
        assert_eq!(wide.current_sum(), 64);
    }

    #[test]
    fn test_unfilled_window_is_optimistic() {
        let mut mk = must(MkMonitor::new(2, 4));
        mk.push(false);
        mk.push(false);
        assert_eq!(mk.current_sum(), 2);
        assert!(mk.is_valid());
        assert_eq!(mk.violations(), 0);

        mk.push(false);
        assert_eq!(mk.current_sum(), 1);
        assert!(!mk.is_valid());
        // Not filled yet, so no violation is counted.
        assert_eq!(mk.violations(), 0);

        mk.push(false);
        assert!(mk.is_filled());
        assert_eq!(mk.violations(), 1);
    }

    #[test]
    fn test_state_packing() {
        let mut mk = must(MkMonitor::new(1, 3));
        mk.push(true);
        mk.push(false);
        mk.push(false);
        assert_eq!(mk.state(), 0b100);
        assert_eq!(mk.reduced_state(), 0b10);
        mk.push(true);
        assert_eq!(mk.state(), 0b001);
    }

    #[test]
    fn test_seeded_state_is_full() {
        let mk = must(MkMonitor::with_state(2, 3, 0b1111_0110));
        assert_eq!(mk.state(), 0b110);
        assert!(mk.is_filled());
        assert_eq!(mk.current_sum(), 2);
    }

    #[test]
    fn test_reset_restores_seed() {
        let mut mk = must(MkMonitor::new(1, 2));
        mk.push(false);
        mk.push(false);
        assert_eq!(mk.violations(), 1);

        mk.reset(None);
        assert_eq!(mk.violations(), 0);
        assert_eq!(mk.recorded(), 0);
        assert_eq!(mk.state(), 0b11);

        mk.reset(Some(0b10));
        assert!(mk.is_filled());
        assert_eq!(mk.current_sum(), 1);
    }

    #[test]
    fn test_distance() {
        let mut mk = must(MkMonitor::new(2, 3));
        assert_eq!(mk.distance(), 2);
        mk.push(false);
        assert_eq!(mk.distance(), 1);
        mk.push(false);
        assert_eq!(mk.distance(), 0);

        let loose = must(MkMonitor::new(1, 3));
        assert_eq!(loose.distance(), 3);
        let hard = must(MkMonitor::new(3, 3));
        assert_eq!(hard.distance(), 1);
        let free = must(MkMonitor::new(0, 3));
        assert_eq!(free.distance(), 4);
    }

    #[test]
    fn test_hypothetical_sum() {
        let mut mk = must(MkMonitor::new(2, 3));
        mk.push(true);
        mk.push(false);
        mk.push(true);
        assert_eq!(mk.sum_after(false), 1);
        assert!(!mk.valid_after(false));
        assert!(mk.valid_after(true));
        // Hypothetical checks do not change the window.
        assert_eq!(mk.state(), 0b101);
    }

    #[test]
    fn test_violation_counted_per_violated_window() {
        let mut mk = must(MkMonitor::new(2, 3));
        for _ in 0..3 {
            mk.push(true);
        }
        mk.push(false);
        assert_eq!(mk.violations(), 0);
        mk.push(false);
        assert_eq!(mk.violations(), 1);
        mk.push(true);
        assert_eq!(mk.violations(), 2);
        mk.push(true);
        assert_eq!(mk.violations(), 2);
    }
}
