//! Post-mortem comparison report for test harnesses.
//!
//! Given the instruction files from both search stages plus the
//! known-good original, this walks every block the pipeline touched and
//! writes a side-by-side account of where each stage's choice sits
//! relative to the truth. Only harnesses read this output; the pipeline
//! itself never does.

use crate::device::BlockFile;
use crate::report::TaskReport;
use bmd_digest::{bit_distance, compute};
use bmd_error::{BmdError, Result};
use bmd_sidecar::{InstructionReader, InstructionRecord, SidecarHeader};
use bmd_types::{BlockIndex, Geometry, RecordKind};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// File set a diagnose pass reads from.
#[derive(Debug, Clone, Copy)]
pub struct DiagnoseInputs<'a> {
    /// Repair-stage instruction sidecar.
    pub repair: &'a Path,
    /// Restore-stage instruction sidecar.
    pub restore: &'a Path,
    /// The uncorrupted original file.
    pub original: &'a Path,
    /// The backup copy the restore stage consulted.
    pub backup: &'a Path,
    /// The data file as it looked before any repair ran.
    pub corrupt: &'a Path,
    /// The data file as it looks now (after execute).
    pub data: &'a Path,
}

/// Write a human-readable comparison to `diag_path` for every block
/// whose final instruction (restore over repair) disagrees with the
/// original.
pub fn diagnose(inputs: &DiagnoseInputs<'_>, diag_path: &Path) -> Result<TaskReport> {
    let (geometry, repairs) = summaries(inputs.repair)?;
    let (_, restores) = summaries(inputs.restore)?;

    let mut original = BlockFile::open_read(inputs.original)?;
    let mut backup = BlockFile::open_read(inputs.backup)?;
    let mut corrupt = BlockFile::open_read(inputs.corrupt)?;
    let mut data = BlockFile::open_read(inputs.data)?;
    let mut out = BufWriter::new(File::create(diag_path)?);
    let mut report = TaskReport::default();

    let mut blocks: Vec<BlockIndex> = repairs.keys().chain(restores.keys()).copied().collect();
    blocks.sort_unstable();
    blocks.dedup();
    for index in blocks {
        let repair_rec = repairs.get(&index);
        let restore_rec = restores.get(&index);
        let Some(final_rec) = restore_rec.or(repair_rec) else {
            continue;
        };

        let truth = original.read_block(geometry, index)?;
        if final_rec.data == truth {
            report.add_ok();
            continue;
        }
        if final_rec.kind == RecordKind::HitAmbiguous {
            report.add_ambiguous();
        } else {
            report.add_failed();
        }

        let corrupt_block = corrupt.read_block(geometry, index)?;
        let backup_block = backup.read_block(geometry, index)?;
        let data_block = data.read_block(geometry, index)?;

        writeln!(out, "block {index}")?;
        if let Some(rec) = repair_rec {
            writeln!(
                out,
                "  repair  {:<8} dist {} ambival {}",
                rec.kind, rec.distance, rec.ambival
            )?;
        }
        if let Some(rec) = restore_rec {
            writeln!(
                out,
                "  restore {:<8} dist {} ambival {}",
                rec.kind, rec.distance, rec.ambival
            )?;
        }
        compare(&mut out, geometry, "original<->corrupt", &truth, &corrupt_block)?;
        if let Some(rec) = repair_rec {
            compare(&mut out, geometry, "corrupt<->repair", &corrupt_block, &rec.data)?;
        }
        if let (Some(rep), Some(rst)) = (repair_rec, restore_rec) {
            compare(&mut out, geometry, "repair<->restore", &rep.data, &rst.data)?;
        }
        compare(&mut out, geometry, "original<->backup", &truth, &backup_block)?;
        compare(&mut out, geometry, "original<->data", &truth, &data_block)?;
    }
    out.flush()?;

    info!(target: "bmd::diagnose", summary = %report, "diagnose finished");
    Ok(report)
}

/// Read the per-block summary records (everything except per-candidate
/// `HIT` lines) from an instruction sidecar. Later summaries for the
/// same block win, matching append order.
fn summaries(path: &Path) -> Result<(Geometry, BTreeMap<BlockIndex, InstructionRecord>)> {
    let mut reader = BufReader::new(File::open(path)?);
    let decoded = SidecarHeader::read_from(&mut reader)?;
    let geometry = decoded.header.geometry;
    let mut map = BTreeMap::new();
    let records = InstructionReader::new(
        reader,
        geometry.method.digest_bytes(),
        geometry.block_bytes() as u64,
    );
    for record in records {
        let record = record?;
        if record.kind.is_summary() {
            map.insert(record.block, record);
        }
    }
    Ok((geometry, map))
}

fn compare(
    out: &mut impl Write,
    geometry: Geometry,
    label: &str,
    a: &[u8],
    b: &[u8],
) -> Result<()> {
    if a.len() != b.len() {
        writeln!(out, "  {label:<20} lengths differ: {} vs {}", a.len(), b.len())
            .map_err(BmdError::Io)?;
        return Ok(());
    }
    let block_bits = bit_distance(a, b);
    let digest_bits = bit_distance(
        &compute(geometry.method, a),
        &compute(geometry.method, b),
    );
    writeln!(out, "  {label:<20} block {block_bits} checksum {digest_bits}")
        .map_err(BmdError::Io)?;
    Ok(())
}
