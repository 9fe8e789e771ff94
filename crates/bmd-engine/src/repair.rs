//! Single-copy block repair: progressive dithered search.
//!
//! For each verify mismatch the engine perturbs the corrupt block with
//! every dither frame of growing width, at every bit offset, and keeps
//! the perturbations whose digest lands within tolerance of the stored
//! digest. The search stops at the first productive width, since a
//! smaller perturbation always dominates a wider one, and honors the
//! operation budget at the granularity of individual checksum
//! computations.

use crate::calibrate::Calibration;
use crate::classify::{classify_and_emit, Candidate, SearchOutcome};
use crate::device::BlockFile;
use crate::profile::SearchOptions;
use crate::report::TaskReport;
use crate::sink::RecordSink;
use bmd_digest::{bit_distance, compute, frames, xor_pattern};
use bmd_error::{BmdError, Result};
use bmd_sidecar::{MismatchReader, SidecarHeader};
use bmd_types::ChecksumMethod;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info, warn};

/// Run the repair search over every mismatch in `error_path`, writing
/// classified instruction records to `repair_path` (and its text twin).
pub fn repair(
    data_path: &Path,
    error_path: &Path,
    repair_path: &Path,
    opts: &SearchOptions,
) -> Result<TaskReport> {
    let mut errors = BufReader::new(File::open(error_path)?);
    let decoded = SidecarHeader::read_from(&mut errors)?;
    let geometry = decoded.header.geometry;
    let calibration = Calibration::for_geometry(geometry, &opts.budgets);

    let mut data = BlockFile::open_read(data_path)?;
    let mut sink = RecordSink::create(repair_path, &decoded.header)?;
    let mut report = TaskReport::default();

    for mismatch in MismatchReader::new(errors, geometry.method.digest_bytes()) {
        let mismatch = mismatch?;
        let block = match data.read_block(geometry, mismatch.block) {
            Ok(block) => block,
            Err(BmdError::Io(err)) => {
                warn!(target: "bmd::repair", block = %mismatch.block, error = %err, "block unreadable");
                report.add_io_error();
                continue;
            }
            Err(err) => return Err(err),
        };

        let hits = dither_search(
            &block,
            &mismatch.given,
            geometry.method,
            &calibration,
            opts.budgets.repair,
        );
        debug!(
            target: "bmd::repair",
            block = %mismatch.block,
            hits = hits.len(),
            "dither search finished"
        );
        let outcome = classify_and_emit(
            hits,
            &block,
            &mismatch.given,
            mismatch.block,
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

    info!(target: "bmd::repair", summary = %report, "repair pass finished");
    Ok(report)
}

/// Search for the original contents of `block` using `given` as the
/// oracle digest.
///
/// Width 0 tries the block as-is (the digest may be the damaged side).
/// Each wider round slides every frame of that width across the block.
/// Every checksum computation counts against `budget`; the search stops
/// dead the moment the count would exceed it, keeping whatever hits it
/// has. A productive width ends the search.
fn dither_search(
    block: &[u8],
    given: &[u8],
    method: ChecksumMethod,
    calibration: &Calibration,
    budget: u64,
) -> Vec<Candidate> {
    let tolerance = u64::from(calibration.tolerance_bits);
    let block_bits = block.len() * 8;
    let mut hits = Vec::new();
    let mut work = block.to_vec();
    let mut ops: u64 = 0;

    'widths: for width in 0..=calibration.w_repair {
        if width as usize > block_bits {
            break;
        }
        if width == 0 {
            ops += 1;
            if ops > budget {
                break;
            }
            let digest = compute(method, block);
            if bit_distance(&digest, given) <= tolerance {
                hits.push(Candidate {
                    data: block.to_vec(),
                    digest,
                });
            }
        } else {
            for pattern in frames(width) {
                for offset in 0..=(block_bits - width as usize) {
                    ops += 1;
                    if ops > budget {
                        break 'widths;
                    }
                    xor_pattern(&mut work, offset, pattern);
                    let digest = compute(method, &work);
                    if bit_distance(&digest, given) <= tolerance {
                        hits.push(Candidate {
                            data: work.clone(),
                            digest,
                        });
                    }
                    xor_pattern(&mut work, offset, pattern);
                }
            }
        }
        if !hits.is_empty() {
            break;
        }
    }
    hits
}
