//! Paired binary + text-twin output files.
//!
//! Every record a task emits goes to the binary sidecar and, as one
//! line, to the advisory `<path>.txt` twin.

use bmd_error::Result;
use bmd_sidecar::text;
use bmd_sidecar::{InstructionRecord, MismatchRecord, SidecarHeader};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub(crate) struct RecordSink {
    binary: BufWriter<File>,
    twin: BufWriter<File>,
}

impl RecordSink {
    /// Create `path` and `path.txt`, writing `header` to the binary side.
    pub(crate) fn create(path: &Path, header: &SidecarHeader) -> Result<Self> {
        let mut binary = BufWriter::new(File::create(path)?);
        header.write_to(&mut binary)?;
        let twin = BufWriter::new(File::create(twin_path(path))?);
        Ok(Self { binary, twin })
    }

    pub(crate) fn mismatch(&mut self, record: &MismatchRecord) -> Result<()> {
        record.write_to(&mut self.binary)?;
        writeln!(self.twin, "{}", text::mismatch_line(record))?;
        Ok(())
    }

    pub(crate) fn instruction(&mut self, record: &InstructionRecord) -> Result<()> {
        record.write_to(&mut self.binary)?;
        writeln!(self.twin, "{}", text::instruction_line(record))?;
        Ok(())
    }

    pub(crate) fn finish(mut self) -> Result<()> {
        self.binary.flush()?;
        self.twin.flush()?;
        Ok(())
    }
}

pub(crate) fn twin_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".txt");
    PathBuf::from(name)
}
