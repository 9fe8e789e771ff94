#![forbid(unsafe_code)]
//! Shared types for BitMend.
//!
//! Defines the checksum-method descriptors, the block/redundancy geometry,
//! and the on-disk record kind tags used by every other crate in the
//! workspace.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Size of the self-redundant header at the start of every sidecar file.
pub const HEADER_LEN: usize = 32;

/// Fixed size of the instruction record head (tag + four u64 fields).
pub const INSTRUCTION_HEAD_LEN: usize = 40;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown checksum method {0:?}")]
    UnknownMethod(String),

    #[error("unknown record tag {0:?}")]
    UnknownTag(String),

    #[error("invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
}

/// Index of a fixed-size block within the data file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct BlockIndex(pub u64);

impl fmt::Display for BlockIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Checksum methods ────────────────────────────────────────────────────────

/// A named checksum method with a fixed digest width.
///
/// The truncated MD5 variants select fixed byte positions from the full
/// 16-byte MD5 output, so a 16/32/64-bit tag still inherits MD5's
/// diffusion. The selections are part of the on-disk format and must not
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumMethod {
    Md4,
    Md5,
    Sha256,
    Crc32,
    Md5_16,
    Md5_32,
    Md5_64,
}

impl ChecksumMethod {
    pub const ALL: [Self; 7] = [
        Self::Md4,
        Self::Md5,
        Self::Sha256,
        Self::Crc32,
        Self::Md5_16,
        Self::Md5_32,
        Self::Md5_64,
    ];

    /// Canonical method name as stored in sidecar headers.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Md4 => "md4",
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
            Self::Crc32 => "crc32",
            Self::Md5_16 => "md5_16",
            Self::Md5_32 => "md5_32",
            Self::Md5_64 => "md5_64",
        }
    }

    /// Resolve a method from its canonical name.
    pub fn from_name(name: &str) -> Result<Self, ParseError> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == name)
            .ok_or_else(|| ParseError::UnknownMethod(name.to_owned()))
    }

    /// Digest width `K` in bits. Always a power of two.
    #[must_use]
    pub fn digest_bits(self) -> u32 {
        match self {
            Self::Md4 | Self::Md5 => 128,
            Self::Sha256 => 256,
            Self::Crc32 => 32,
            Self::Md5_16 => 16,
            Self::Md5_32 => 32,
            Self::Md5_64 => 64,
        }
    }

    /// Digest width in bytes (`K / 8`).
    #[must_use]
    pub fn digest_bytes(self) -> usize {
        self.digest_bits() as usize / 8
    }
}

impl fmt::Display for ChecksumMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Geometry ────────────────────────────────────────────────────────────────

/// Validated redundancy factor: data bytes per checksum byte.
///
/// Must be a power of two so that the derived block size is too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redundancy(u32);

impl Redundancy {
    pub fn new(value: u32) -> Result<Self, ParseError> {
        if !value.is_power_of_two() {
            return Err(ParseError::InvalidField {
                field: "redundancy",
                reason: "must be a power of two",
            });
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Redundancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-task block geometry: method plus redundancy, with the derived
/// block size `B = K/8 · R`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub method: ChecksumMethod,
    pub redundancy: Redundancy,
}

impl Geometry {
    #[must_use]
    pub fn new(method: ChecksumMethod, redundancy: Redundancy) -> Self {
        Self { method, redundancy }
    }

    /// Block size in bytes.
    #[must_use]
    pub fn block_bytes(self) -> usize {
        self.method.digest_bytes() * self.redundancy.get() as usize
    }

    /// Number of blocks covering `len` bytes, counting a final short block.
    #[must_use]
    pub fn block_count(self, len: u64) -> u64 {
        let block = self.block_bytes() as u64;
        len.div_ceil(block)
    }

    /// Length of block `index` within a file of `len` bytes.
    #[must_use]
    pub fn block_len_at(self, index: BlockIndex, len: u64) -> usize {
        let block = self.block_bytes() as u64;
        let start = index.0 * block;
        len.saturating_sub(start).min(block) as usize
    }

    /// Recover the geometry recorded in a sidecar header.
    pub fn from_header_fields(method: ChecksumMethod, block_bytes: u32) -> Result<Self, ParseError> {
        let digest_bytes = method.digest_bytes() as u32;
        if block_bytes == 0 || block_bytes % digest_bytes != 0 {
            return Err(ParseError::InvalidField {
                field: "block_bytes",
                reason: "not a multiple of the digest size",
            });
        }
        let redundancy = Redundancy::new(block_bytes / digest_bytes)?;
        Ok(Self::new(method, redundancy))
    }
}

// ── Record kinds ────────────────────────────────────────────────────────────

/// Classification tag carried by instruction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// One candidate among several; informational, never applied.
    Hit,
    /// Ambiguous result: the minimum-distance candidate of several.
    HitAmbiguous,
    /// Unique reconstruction.
    HitUnique,
    /// The search exhausted its width or budget without a candidate.
    NoHits,
    /// Data and backup block lengths disagree.
    BlockLengthMismatch,
    /// Data and backup digest lengths disagree.
    ChecksumLengthMismatch,
    /// Reserved for downstream tamper analysis; never emitted here.
    Tampered,
}

impl RecordKind {
    /// ASCII tag as stored on disk (null-padded to 8 bytes).
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::HitAmbiguous => "HIT?",
            Self::HitUnique => "HIT!",
            Self::NoHits => "NOHITS",
            Self::BlockLengthMismatch => "BLENGTH?",
            Self::ChecksumLengthMismatch => "CLENGTH?",
            Self::Tampered => "TAMPER?",
        }
    }

    /// Parse a stored tag. The tamper tag is accepted with and without
    /// the trailing question mark; older files carry the bare spelling.
    pub fn from_tag(tag: &str) -> Result<Self, ParseError> {
        match tag {
            "HIT" => Ok(Self::Hit),
            "HIT?" => Ok(Self::HitAmbiguous),
            "HIT!" => Ok(Self::HitUnique),
            "NOHITS" => Ok(Self::NoHits),
            "BLENGTH?" => Ok(Self::BlockLengthMismatch),
            "CLENGTH?" => Ok(Self::ChecksumLengthMismatch),
            "TAMPER?" | "TAMPER" => Ok(Self::Tampered),
            other => Err(ParseError::UnknownTag(other.to_owned())),
        }
    }

    /// Whether execute applies a record of this kind to the data file.
    #[must_use]
    pub fn is_applied(self) -> bool {
        matches!(self, Self::HitUnique | Self::HitAmbiguous)
    }

    /// Whether this kind closes a block's record group (at most one per
    /// block, after any per-candidate `Hit` records).
    #[must_use]
    pub fn is_summary(self) -> bool {
        !matches!(self, Self::Hit)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_round_trip() {
        for method in ChecksumMethod::ALL {
            assert_eq!(ChecksumMethod::from_name(method.name()).unwrap(), method);
        }
        assert!(ChecksumMethod::from_name("md6").is_err());
    }

    #[test]
    fn digest_widths_are_powers_of_two() {
        for method in ChecksumMethod::ALL {
            assert!(method.digest_bits().is_power_of_two());
            assert_eq!(method.digest_bytes() * 8, method.digest_bits() as usize);
        }
    }

    #[test]
    fn geometry_block_size_follows_redundancy() {
        let geom = Geometry::new(ChecksumMethod::Md5_32, Redundancy::new(32).unwrap());
        assert_eq!(geom.block_bytes(), 128);
        assert_eq!(geom.block_count(3000), 24);
        assert_eq!(geom.block_len_at(BlockIndex(23), 3000), 3000 - 23 * 128);
        assert_eq!(geom.block_len_at(BlockIndex(0), 3000), 128);
    }

    #[test]
    fn geometry_recovers_from_header_fields() {
        let geom = Geometry::from_header_fields(ChecksumMethod::Md5_32, 128).unwrap();
        assert_eq!(geom.redundancy.get(), 32);
        assert!(Geometry::from_header_fields(ChecksumMethod::Md5_32, 100).is_err());
    }

    #[test]
    fn redundancy_must_be_power_of_two() {
        assert!(Redundancy::new(32).is_ok());
        assert!(Redundancy::new(0).is_err());
        assert!(Redundancy::new(24).is_err());
    }

    #[test]
    fn record_tags_round_trip() {
        for kind in [
            RecordKind::Hit,
            RecordKind::HitAmbiguous,
            RecordKind::HitUnique,
            RecordKind::NoHits,
            RecordKind::BlockLengthMismatch,
            RecordKind::ChecksumLengthMismatch,
            RecordKind::Tampered,
        ] {
            assert_eq!(RecordKind::from_tag(kind.tag()).unwrap(), kind);
            assert!(kind.tag().len() <= 8);
        }
    }

    #[test]
    fn bare_tamper_spelling_is_accepted() {
        assert_eq!(RecordKind::from_tag("TAMPER").unwrap(), RecordKind::Tampered);
    }

    #[test]
    fn only_hit_kinds_are_applied() {
        assert!(RecordKind::HitUnique.is_applied());
        assert!(RecordKind::HitAmbiguous.is_applied());
        assert!(!RecordKind::Hit.is_applied());
        assert!(!RecordKind::NoHits.is_applied());
    }
}
