//! Search-budget calibration.
//!
//! The user thinks in operations ("spend at most N checksum computations
//! per block"); the engines think in frame widths. This module converts
//! between the two so the same budget buys comparable effort regardless
//! of block size or checksum width. Costs are normalized to MD5 at
//! redundancy 32, whose block is 4096 bits.

use crate::profile::Budgets;
use bmd_types::Geometry;

/// Frames wider than this are never searched; a budget that large is
/// unreachable anyway.
const MAX_FRAME_WIDTH: u32 = 64;

const REFERENCE_BLOCK_BITS: f64 = 4096.0;

/// Derived per-task search widths and tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    /// Widest dither frame the repair search will try.
    pub w_repair: u32,
    /// Most divergent bit positions the restore search will enumerate.
    pub w_restore: u32,
    /// Accepted Hamming distance between a candidate digest and the
    /// stored digest (`K / 16` bits).
    pub tolerance_bits: u32,
}

impl Calibration {
    /// Calibrate search widths so that worst-case operation counts land
    /// on the configured budgets.
    #[must_use]
    pub fn for_geometry(geometry: Geometry, budgets: &Budgets) -> Self {
        let block_bits = (geometry.block_bytes() * 8) as f64;
        let cost_factor = block_bits / REFERENCE_BLOCK_BITS;

        let mut w_repair = 1u32;
        while w_repair < MAX_FRAME_WIDTH
            && exp2(w_repair - 1) * block_bits * cost_factor < budgets.repair as f64
        {
            w_repair += 1;
        }

        let mut w_restore = 1u32;
        while w_restore < MAX_FRAME_WIDTH && exp2(w_restore) * cost_factor < budgets.restore as f64
        {
            w_restore += 1;
        }

        Self {
            w_repair,
            w_restore,
            tolerance_bits: geometry.method.digest_bits() >> 4,
        }
    }
}

fn exp2(power: u32) -> f64 {
    2.0f64.powi(power as i32)
}
