//! Weighted distance between `(block, checksum)` pairs and the
//! ambivalence score for close-running candidates.
//!
//! A flipped checksum bit is far less likely than a flipped block bit of
//! independent physical origin, so checksum differences are weighted by
//! the block-to-checksum size ratio (times a configurable penalty) to
//! normalize the probability mass.

use bmd_types::ParseError;

/// Scalar value of the else-branch multiplier when every candidate ties.
const AMBIVAL_TIE_SCALE: u64 = 10_000;

/// Distance function applied to a `(block, checksum)` difference pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceFn {
    /// `db + P·R·dc`, the default.
    #[default]
    Linear,
    /// `db² + (P·R·dc)²`.
    Square,
    /// `max(db, P·R·dc)`: scores only the dominant error source.
    Conservative,
    /// Conservative with ties broken against checksum damage.
    ConservativeBiased,
}

impl DistanceFn {
    pub const ALL: [Self; 4] = [
        Self::Linear,
        Self::Square,
        Self::Conservative,
        Self::ConservativeBiased,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Square => "square",
            Self::Conservative => "conservative",
            Self::ConservativeBiased => "conservative-biased",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, ParseError> {
        Self::ALL
            .into_iter()
            .find(|f| f.name() == name)
            .ok_or(ParseError::InvalidField {
                field: "distance",
                reason: "expected linear, square, conservative, or conservative-biased",
            })
    }

    /// Score a candidate whose block differs by `block_bits` and whose
    /// digest differs by `digest_bits` from the reference pair.
    #[must_use]
    pub fn pair_distance(
        self,
        block_bits: u64,
        digest_bits: u64,
        penalty: u64,
        redundancy: u32,
    ) -> u64 {
        let weighted = penalty * u64::from(redundancy) * digest_bits;
        match self {
            Self::Linear => block_bits + weighted,
            Self::Square => block_bits * block_bits + weighted * weighted,
            Self::Conservative => block_bits.max(weighted),
            Self::ConservativeBiased => block_bits.max(weighted) + digest_bits,
        }
    }
}

/// Index of the minimum distance; first occurrence wins on ties.
#[must_use]
pub fn min_index(distances: &[u64]) -> usize {
    let mut best = 0;
    for (i, d) in distances.iter().enumerate() {
        if *d < distances[best] {
            best = i;
        }
    }
    best
}

/// Ambivalence score for a set of two or more candidate distances.
///
/// `round(100·n·min / (avg − min))` when the average exceeds the minimum;
/// when every candidate ties the score saturates at `100·n·min·10000`.
/// Larger means less confidence in the minimum-distance candidate.
#[must_use]
pub fn ambival(distances: &[u64]) -> u64 {
    let n = distances.len() as u64;
    let min = distances.iter().copied().min().unwrap_or(0);
    let sum: u64 = distances.iter().sum();
    let avg = sum as f64 / n as f64;
    if avg > min as f64 {
        (100.0 * n as f64 * min as f64 / (avg - min as f64)).round() as u64
    } else {
        100 * n * min * AMBIVAL_TIE_SCALE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_distance_weights_checksum_bits() {
        let d = DistanceFn::Linear.pair_distance(3, 2, 1, 32);
        assert_eq!(d, 3 + 64);
    }

    #[test]
    fn distance_names_round_trip() {
        for f in DistanceFn::ALL {
            assert_eq!(DistanceFn::from_name(f.name()).unwrap(), f);
        }
        assert!(DistanceFn::from_name("euclid").is_err());
    }

    #[test]
    fn variant_ordering_on_mixed_damage() {
        // Block damage dominates under conservative scoring.
        assert_eq!(DistanceFn::Conservative.pair_distance(10, 0, 1, 32), 10);
        assert_eq!(DistanceFn::ConservativeBiased.pair_distance(10, 1, 1, 2), 33);
        assert_eq!(DistanceFn::Square.pair_distance(3, 1, 1, 2), 9 + 4);
    }

    #[test]
    fn min_index_prefers_first_on_tie() {
        assert_eq!(min_index(&[5, 3, 3, 7]), 1);
        assert_eq!(min_index(&[1]), 0);
    }

    #[test]
    fn ambival_zero_when_best_candidate_is_exact() {
        // min = 0 makes both branches collapse to zero.
        assert_eq!(ambival(&[0, 40]), 0);
        assert_eq!(ambival(&[0, 0]), 0);
    }

    #[test]
    fn ambival_spread_and_tie_cases() {
        // min 1, avg 17 over two candidates: 100·2·1/16 = 12.5 → 13.
        assert_eq!(ambival(&[1, 33]), 13);
        // All candidates tie: saturated score.
        assert_eq!(ambival(&[4, 4]), 100 * 2 * 4 * 10_000);
    }

    #[test]
    fn ambival_grows_as_candidates_close_in() {
        let far = ambival(&[2, 100]);
        let near = ambival(&[2, 4]);
        assert!(near > far);
    }
}
