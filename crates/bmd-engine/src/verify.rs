//! Block-by-block verification against a checksum sidecar.

use crate::device::BlockFile;
use crate::report::TaskReport;
use crate::sink::RecordSink;
use bmd_digest::compute;
use bmd_error::{BmdError, Result};
use bmd_sidecar::{MismatchRecord, SidecarHeader};
use bmd_types::{BlockIndex, HEADER_LEN};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// Recompute every block digest and compare it to the stored one,
/// appending a mismatch record (and a text-twin line) per disagreement.
///
/// The data file is never modified. The sidecar header is read
/// tolerantly: a single corrupted header field is reconciled with a
/// warning. A sidecar whose body does not hold exactly one digest per
/// block is malformed.
pub fn verify(data_path: &Path, checksum_path: &Path, error_path: &Path) -> Result<TaskReport> {
    let mut sidecar = BufReader::new(File::open(checksum_path)?);
    let decoded = SidecarHeader::read_from(&mut sidecar)?;
    let geometry = decoded.header.geometry;

    let mut data = BlockFile::open_read(data_path)?;
    let blocks = data.block_count(geometry);
    let digest_bytes = geometry.method.digest_bytes();

    let body = std::fs::metadata(checksum_path)?.len() - HEADER_LEN as u64;
    if body != blocks * digest_bytes as u64 {
        return Err(BmdError::Format(format!(
            "checksum sidecar holds {body} body bytes, expected {} for {blocks} blocks",
            blocks * digest_bytes as u64
        )));
    }

    let mut sink = RecordSink::create(error_path, &decoded.header)?;
    let mut report = TaskReport::default();
    let mut stored = vec![0u8; digest_bytes];

    for index in 0..blocks {
        sidecar.read_exact(&mut stored)?;
        let block = match data.read_block(geometry, BlockIndex(index)) {
            Ok(block) => block,
            Err(BmdError::Io(err)) => {
                warn!(target: "bmd::verify", block = index, error = %err, "block unreadable");
                report.add_io_error();
                continue;
            }
            Err(err) => return Err(err),
        };
        let computed = compute(geometry.method, &block);
        if computed == stored {
            report.add_ok();
        } else {
            debug!(target: "bmd::verify", block = index, "digest mismatch");
            sink.mismatch(&MismatchRecord {
                block: BlockIndex(index),
                given: stored.clone(),
                computed,
            })?;
            report.add_failed();
        }
    }
    sink.finish()?;

    info!(
        target: "bmd::verify",
        blocks = report.total,
        mismatches = report.failed - report.io_errors,
        repaired_header_fields = decoded.repaired.len(),
        "verify pass finished"
    );
    Ok(report)
}
