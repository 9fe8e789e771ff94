//! Two-copy block restore: transition-ordered difference-mask search.
//!
//! Where repair works from one corrupt copy, restore works from two: the
//! data block and its backup. The bits where the copies agree are almost
//! certainly intact, so the search space collapses to the divergent
//! positions, enumerated fewest-transitions-first because physical
//! damage arrives in bursts. A candidate is accepted when its digest
//! lands within tolerance of either the data digest or the backup
//! digest, because either side may be the damaged one.

use crate::calibrate::Calibration;
use crate::classify::{classify_and_emit, Candidate, SearchOutcome};
use crate::device::BlockFile;
use crate::profile::SearchOptions;
use crate::report::TaskReport;
use crate::sink::RecordSink;
use bmd_digest::{bit_distance, compute, diff_positions, flip_bit, transition_masks};
use bmd_error::{BmdError, Result};
use bmd_sidecar::{read_digest_at, InstructionReader, InstructionRecord, SidecarHeader};
use bmd_types::{ChecksumMethod, ParseError, RecordKind};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info, warn};

/// Which repair outcomes a restore pass takes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestoreMode {
    /// Failed blocks and ambiguous ones.
    #[default]
    All,
    /// Failed blocks only.
    AmbiNo,
    /// Ambiguous blocks only.
    AmbiOnly,
}

impl RestoreMode {
    pub const ALL: [Self; 3] = [Self::All, Self::AmbiNo, Self::AmbiOnly];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::AmbiNo => "ambi-no",
            Self::AmbiOnly => "ambi-only",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == name)
            .ok_or_else(|| {
                BmdError::Parse(ParseError::InvalidField {
                    field: "mode",
                    reason: "expected all, ambi-no, or ambi-only",
                })
            })
    }

    fn selects(self, kind: RecordKind) -> bool {
        match kind {
            RecordKind::NoHits
            | RecordKind::BlockLengthMismatch
            | RecordKind::ChecksumLengthMismatch
            | RecordKind::Tampered => !matches!(self, Self::AmbiOnly),
            RecordKind::HitAmbiguous => !matches!(self, Self::AmbiNo),
            RecordKind::Hit | RecordKind::HitUnique => false,
        }
    }
}

/// File set a restore pass reads from.
#[derive(Debug, Clone, Copy)]
pub struct RestoreInputs<'a> {
    /// Repair instruction sidecar naming the blocks still in trouble.
    pub repair: &'a Path,
    /// The (still corrupt) data file.
    pub data: &'a Path,
    /// Backup copy of the data file.
    pub backup: &'a Path,
    /// Checksum sidecar generated from the backup.
    pub backup_checksum: &'a Path,
}

/// Re-search every block the repair pass left unresolved, using the
/// backup copy to pin down the divergent bits. Classified instruction
/// records go to `restore_path` and its text twin.
pub fn restore(
    inputs: &RestoreInputs<'_>,
    restore_path: &Path,
    mode: RestoreMode,
    opts: &SearchOptions,
) -> Result<TaskReport> {
    let mut instructions = BufReader::new(File::open(inputs.repair)?);
    let decoded = SidecarHeader::read_from(&mut instructions)?;
    let geometry = decoded.header.geometry;
    let calibration = Calibration::for_geometry(geometry, &opts.budgets);

    let mut backup_sidecar = File::open(inputs.backup_checksum)?;
    let backup_decoded = SidecarHeader::read_from(&mut backup_sidecar)?;
    let backup_digest_bytes = backup_decoded.header.geometry.method.digest_bytes();

    let mut data = BlockFile::open_read(inputs.data)?;
    let mut backup = BlockFile::open_read(inputs.backup)?;
    let mut sink = RecordSink::create(restore_path, &decoded.header)?;
    let mut report = TaskReport::default();

    let reader = InstructionReader::new(
        instructions,
        geometry.method.digest_bytes(),
        geometry.block_bytes() as u64,
    );
    for record in reader {
        let record = record?;
        if !mode.selects(record.kind) {
            continue;
        }
        let index = record.block;

        let x = match data.read_block(geometry, index) {
            Ok(block) => block,
            Err(BmdError::Io(err)) => {
                warn!(target: "bmd::restore", block = %index, error = %err, "data block unreadable");
                report.add_io_error();
                continue;
            }
            Err(err) => return Err(err),
        };
        // A backup that simply ends before this block is a length
        // mismatch, not a fatal error.
        let y = match backup.read_block(geometry, index) {
            Ok(block) => block,
            Err(BmdError::Io(err)) => {
                warn!(target: "bmd::restore", block = %index, error = %err, "backup block unreadable");
                report.add_io_error();
                continue;
            }
            Err(_) => Vec::new(),
        };
        let given = &record.digest;
        let backup_given = match read_digest_at(&mut backup_sidecar, backup_digest_bytes, index) {
            Ok(digest) => digest,
            Err(BmdError::Io(err)) => {
                warn!(target: "bmd::restore", block = %index, error = %err, "backup digest unreadable");
                report.add_io_error();
                continue;
            }
            Err(_) => Vec::new(),
        };

        if x.len() != y.len() {
            sink.instruction(&length_mismatch(
                RecordKind::BlockLengthMismatch,
                &record,
                &x,
            ))?;
            report.add_failed();
            continue;
        }
        if given.len() != backup_given.len() {
            sink.instruction(&length_mismatch(
                RecordKind::ChecksumLengthMismatch,
                &record,
                &x,
            ))?;
            report.add_failed();
            continue;
        }

        let divergent = diff_positions(&x, &y);
        let hits = if divergent.is_empty() {
            agreeing_copies(&x, given, &backup_given, geometry.method, &calibration)
        } else if divergent.len() > calibration.w_restore as usize {
            match backup_matches_exactly(&y, given, geometry.method) {
                Some(hit) => vec![hit],
                None => {
                    warn!(
                        target: "bmd::restore",
                        block = %index,
                        divergent = divergent.len(),
                        width = calibration.w_restore,
                        "copies diverge beyond the search width"
                    );
                    report.add_failed();
                    continue;
                }
            }
        } else {
            mask_search(
                &x,
                &divergent,
                given,
                &backup_given,
                geometry.method,
                &calibration,
                opts.budgets.restore,
            )
        };

        debug!(target: "bmd::restore", block = %index, hits = hits.len(), "mask search finished");
        let outcome = classify_and_emit(
            hits,
            &x,
            given,
            index,
            geometry.redundancy.get(),
            opts,
            &mut sink,
        )?;
        match outcome {
            SearchOutcome::Unique => report.add_ok(),
            SearchOutcome::Ambiguous { .. } => report.add_ambiguous(),
            SearchOutcome::NoHits => report.add_failed(),
        }
    }
    sink.finish()?;

    info!(target: "bmd::restore", summary = %report, mode = mode.name(), "restore pass finished");
    Ok(report)
}

fn length_mismatch(
    kind: RecordKind,
    record: &InstructionRecord,
    block: &[u8],
) -> InstructionRecord {
    InstructionRecord {
        kind,
        block: record.block,
        distance: 0,
        ambival: 0,
        digest: record.digest.clone(),
        data: block.to_vec(),
    }
}

/// Copies agree bit-for-bit: a single computation decides whether the
/// common block satisfies either digest.
fn agreeing_copies(
    x: &[u8],
    given: &[u8],
    backup_given: &[u8],
    method: ChecksumMethod,
    calibration: &Calibration,
) -> Vec<Candidate> {
    let tolerance = u64::from(calibration.tolerance_bits);
    let digest = compute(method, x);
    if bit_distance(&digest, given) < tolerance || bit_distance(&digest, backup_given) < tolerance {
        vec![Candidate {
            data: x.to_vec(),
            digest,
        }]
    } else {
        Vec::new()
    }
}

/// The copies diverge too widely to enumerate; the backup block is still
/// the answer when it reproduces the data digest exactly.
fn backup_matches_exactly(y: &[u8], given: &[u8], method: ChecksumMethod) -> Option<Candidate> {
    let digest = compute(method, y);
    (digest == given).then(|| Candidate {
        data: y.to_vec(),
        digest,
    })
}

/// Enumerate assignments of the divergent positions, bursty first,
/// deduplicating candidates the two-start scheme emits twice.
fn mask_search(
    x: &[u8],
    divergent: &[u64],
    given: &[u8],
    backup_given: &[u8],
    method: ChecksumMethod,
    calibration: &Calibration,
    budget: u64,
) -> Vec<Candidate> {
    let tolerance = u64::from(calibration.tolerance_bits);
    let mut hits: Vec<Candidate> = Vec::new();
    let mut work = x.to_vec();
    let mut ops: u64 = 0;

    for mask in transition_masks(divergent.len()) {
        ops += 1;
        if ops > budget {
            break;
        }
        apply_mask(&mut work, divergent, mask);
        let digest = compute(method, &work);
        let accepted = bit_distance(&digest, given) < tolerance
            || bit_distance(&digest, backup_given) < tolerance;
        if accepted && !hits.iter().any(|hit| hit.data == work) {
            hits.push(Candidate {
                data: work.clone(),
                digest,
            });
        }
        apply_mask(&mut work, divergent, mask);
    }
    hits
}

fn apply_mask(work: &mut [u8], divergent: &[u64], mask: u64) {
    let mut rest = mask;
    while rest != 0 {
        let i = rest.trailing_zeros() as usize;
        flip_bit(work, divergent[i] as usize);
        rest &= rest - 1;
    }
}
