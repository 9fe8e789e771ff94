//! Per-task search configuration.
//!
//! There is no process-wide state: a task builds one of these values at
//! start (from CLI flags or from a sidecar header) and passes it down by
//! reference.

use bmd_digest::DistanceFn;

/// Hard caps on checksum computations per block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budgets {
    pub repair: u64,
    pub restore: u64,
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            repair: 100_000,
            restore: 100_000,
        }
    }
}

/// Knobs shared by the repair and restore searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub budgets: Budgets,
    pub distance: DistanceFn,
    /// Checksum penalty `P` in the pair distance.
    pub penalty: u64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            budgets: Budgets::default(),
            distance: DistanceFn::default(),
            penalty: 1,
        }
    }
}

impl SearchOptions {
    #[must_use]
    pub fn new(budgets: Budgets, distance: DistanceFn, penalty: u64) -> Self {
        Self {
            budgets,
            distance,
            penalty,
        }
    }
}
