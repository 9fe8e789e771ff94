//! Apply instruction records to the data file.

use crate::device::BlockFile;
use crate::report::TaskReport;
use bmd_error::Result;
use bmd_sidecar::{InstructionReader, SidecarHeader};
use bmd_types::RecordKind;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

/// Overwrite each instructed block in place.
///
/// Only `HIT!` and `HIT?` records are applied; everything else in the
/// file is informational. A record whose target range cannot be seeked
/// is skipped, never rolled back. Applying the same instruction file
/// twice is idempotent.
pub fn execute(data_path: &Path, instruction_path: &Path) -> Result<TaskReport> {
    let mut instructions = BufReader::new(File::open(instruction_path)?);
    let decoded = SidecarHeader::read_from(&mut instructions)?;
    let geometry = decoded.header.geometry;
    let block_bytes = geometry.block_bytes() as u64;

    let mut data = BlockFile::open_rw(data_path)?;
    let mut report = TaskReport::default();

    let reader = InstructionReader::new(
        instructions,
        geometry.method.digest_bytes(),
        block_bytes,
    );
    for record in reader {
        let record = record?;
        if !record.kind.is_applied() {
            continue;
        }
        let offset = record.block.0 * block_bytes;
        match data.write_at(offset, &record.data) {
            Ok(()) => {
                if record.kind == RecordKind::HitAmbiguous {
                    report.add_ambiguous();
                } else {
                    report.add_ok();
                }
            }
            Err(err) => {
                warn!(
                    target: "bmd::execute",
                    block = %record.block,
                    error = %err,
                    "instruction skipped"
                );
                report.add_io_error();
            }
        }
    }

    info!(target: "bmd::execute", summary = %report, "instructions applied");
    Ok(report)
}
