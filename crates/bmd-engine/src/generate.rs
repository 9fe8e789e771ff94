//! Checksum sidecar generation.

use crate::device::BlockFile;
use crate::report::TaskReport;
use bmd_digest::compute;
use bmd_error::Result;
use bmd_sidecar::SidecarHeader;
use bmd_types::{BlockIndex, Geometry};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Scan `data_path` in `B`-byte blocks and write the checksum sidecar:
/// a 32-byte header followed by one digest per block.
///
/// Deterministic: identical input bytes and geometry produce an
/// identical sidecar. Fails only on I/O errors.
pub fn generate(data_path: &Path, checksum_path: &Path, geometry: Geometry) -> Result<TaskReport> {
    let mut data = BlockFile::open_read(data_path)?;
    let mut sidecar = BufWriter::new(File::create(checksum_path)?);
    SidecarHeader::new(geometry).write_to(&mut sidecar)?;

    let mut report = TaskReport::default();
    for index in 0..data.block_count(geometry) {
        let block = data.read_block(geometry, BlockIndex(index))?;
        sidecar.write_all(&compute(geometry.method, &block))?;
        report.add_ok();
    }
    sidecar.flush()?;

    info!(
        target: "bmd::generate",
        blocks = report.total,
        method = %geometry.method,
        block_bytes = geometry.block_bytes(),
        "checksum sidecar written"
    );
    Ok(report)
}
