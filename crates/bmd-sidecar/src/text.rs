//! Advisory text twins of the binary sidecars.
//!
//! One line per record, never parsed back. Digests print as lowercase
//! hex; candidate blocks print in full so a twin is a usable visual diff
//! of what the engines decided.

use crate::records::{InstructionRecord, MismatchRecord};
use std::fmt::Write as _;

#[must_use]
pub fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[must_use]
pub fn mismatch_line(rec: &MismatchRecord) -> String {
    format!(
        "block {} given={} computed={}",
        rec.block,
        hex(&rec.given),
        hex(&rec.computed)
    )
}

#[must_use]
pub fn instruction_line(rec: &InstructionRecord) -> String {
    format!(
        "{:<8} block {} len {} dist {} ambival {} digest={} data={}",
        rec.kind,
        rec.block,
        rec.data.len(),
        rec.distance,
        rec.ambival,
        hex(&rec.digest),
        hex(&rec.data)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bmd_types::{BlockIndex, RecordKind};

    #[test]
    fn lines_are_single_line_and_hex() {
        let line = mismatch_line(&MismatchRecord {
            block: BlockIndex(5),
            given: vec![0xDE, 0xAD],
            computed: vec![0xBE, 0xEF],
        });
        assert_eq!(line, "block 5 given=dead computed=beef");

        let line = instruction_line(&InstructionRecord {
            kind: RecordKind::HitAmbiguous,
            block: BlockIndex(2),
            distance: 33,
            ambival: 13,
            digest: vec![0x01],
            data: vec![0xFF, 0x00],
        });
        assert!(line.starts_with("HIT?"));
        assert!(line.contains("dist 33"));
        assert!(!line.contains('\n'));
    }
}
