//! Block-granular file access.
//!
//! A thin wrapper over `std::fs::File` that reads and writes whole blocks
//! by index, honoring the short final block. Handles are owned by the
//! task that opened them and close on drop, error or not.

use bmd_error::{BmdError, Result};
use bmd_types::{BlockIndex, Geometry};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

#[derive(Debug)]
pub struct BlockFile {
    file: File,
    len: u64,
}

impl BlockFile {
    pub fn open_read(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }

    /// Open for in-place read/write, as execute requires.
    pub fn open_rw(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }

    #[must_use]
    pub fn len_bytes(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub fn block_count(&self, geometry: Geometry) -> u64 {
        geometry.block_count(self.len)
    }

    /// Read block `index`; the final block may be short.
    pub fn read_block(&mut self, geometry: Geometry, index: BlockIndex) -> Result<Vec<u8>> {
        let block_bytes = geometry.block_bytes() as u64;
        let start = index.0 * block_bytes;
        if start >= self.len {
            return Err(BmdError::Format(format!(
                "block {index} starts past end of file ({} bytes)",
                self.len
            )));
        }
        let len = geometry.block_len_at(index, self.len);
        let mut buf = vec![0u8; len];
        self.file.seek(SeekFrom::Start(start))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Overwrite `data.len()` bytes at `offset`, strictly within the
    /// current file length.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(data.len() as u64)
            .ok_or_else(|| BmdError::Format("write range overflows u64".to_owned()))?;
        if end > self.len {
            return Err(BmdError::Format(format!(
                "write of {} bytes at {offset} exceeds file length {}",
                data.len(),
                self.len
            )));
        }
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }
}
