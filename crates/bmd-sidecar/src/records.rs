//! Binary record codecs for sidecar bodies.
//!
//! All integers are little-endian. Record streams follow the 32-byte
//! header and are strictly ascending by block index; readers surface
//! truncation as a format error rather than a silent stop.

use bmd_error::{BmdError, Result};
use bmd_types::{BlockIndex, RecordKind, HEADER_LEN, INSTRUCTION_HEAD_LEN};
use std::io::{Read, Seek, SeekFrom, Write};

/// One verify mismatch: `block_index:u64`, given digest, computed digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MismatchRecord {
    pub block: BlockIndex,
    pub given: Vec<u8>,
    pub computed: Vec<u8>,
}

impl MismatchRecord {
    pub fn write_to(&self, writer: &mut impl Write) -> Result<()> {
        writer.write_all(&self.block.0.to_le_bytes())?;
        writer.write_all(&self.given)?;
        writer.write_all(&self.computed)?;
        Ok(())
    }
}

/// Streaming reader over mismatch records of a known digest width.
#[derive(Debug)]
pub struct MismatchReader<R> {
    inner: R,
    digest_bytes: usize,
}

impl<R: Read> MismatchReader<R> {
    #[must_use]
    pub fn new(inner: R, digest_bytes: usize) -> Self {
        Self {
            inner,
            digest_bytes,
        }
    }
}

impl<R: Read> Iterator for MismatchReader<R> {
    type Item = Result<MismatchRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut index = [0u8; 8];
        match fill_or_eof(&mut self.inner, &mut index) {
            Ok(false) => return None,
            Ok(true) => {}
            Err(e) => return Some(Err(e)),
        }
        let mut given = vec![0u8; self.digest_bytes];
        let mut computed = vec![0u8; self.digest_bytes];
        let rest = read_all(&mut self.inner, &mut given)
            .and_then(|()| read_all(&mut self.inner, &mut computed));
        if let Err(e) = rest {
            return Some(Err(e));
        }
        Some(Ok(MismatchRecord {
            block: BlockIndex(u64::from_le_bytes(index)),
            given,
            computed,
        }))
    }
}

/// One repair/restore instruction: a fixed 40-byte head (8-byte ASCII
/// kind tag, block index, block length, distance, ambivalence) followed
/// by the digest and the candidate block bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionRecord {
    pub kind: RecordKind,
    pub block: BlockIndex,
    pub distance: u64,
    pub ambival: u64,
    pub digest: Vec<u8>,
    pub data: Vec<u8>,
}

impl InstructionRecord {
    pub fn write_to(&self, writer: &mut impl Write) -> Result<()> {
        let mut head = [0u8; INSTRUCTION_HEAD_LEN];
        let tag = self.kind.tag().as_bytes();
        head[..tag.len()].copy_from_slice(tag);
        head[8..16].copy_from_slice(&self.block.0.to_le_bytes());
        head[16..24].copy_from_slice(&(self.data.len() as u64).to_le_bytes());
        head[24..32].copy_from_slice(&self.distance.to_le_bytes());
        head[32..40].copy_from_slice(&self.ambival.to_le_bytes());
        writer.write_all(&head)?;
        writer.write_all(&self.digest)?;
        writer.write_all(&self.data)?;
        Ok(())
    }
}

/// Streaming reader over instruction records.
///
/// `max_block_len` bounds the variable tail so a corrupt length field
/// cannot provoke an unbounded allocation.
#[derive(Debug)]
pub struct InstructionReader<R> {
    inner: R,
    digest_bytes: usize,
    max_block_len: u64,
}

impl<R: Read> InstructionReader<R> {
    #[must_use]
    pub fn new(inner: R, digest_bytes: usize, max_block_len: u64) -> Self {
        Self {
            inner,
            digest_bytes,
            max_block_len,
        }
    }
}

impl<R: Read> Iterator for InstructionReader<R> {
    type Item = Result<InstructionRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut head = [0u8; INSTRUCTION_HEAD_LEN];
        match fill_or_eof(&mut self.inner, &mut head) {
            Ok(false) => return None,
            Ok(true) => {}
            Err(e) => return Some(Err(e)),
        }
        Some(self.parse_tail(&head))
    }
}

impl<R: Read> InstructionReader<R> {
    fn parse_tail(&mut self, head: &[u8; INSTRUCTION_HEAD_LEN]) -> Result<InstructionRecord> {
        let tag_end = head[..8].iter().position(|&b| b == 0).unwrap_or(8);
        let tag = std::str::from_utf8(&head[..tag_end])
            .map_err(|_| BmdError::Format("instruction tag is not ASCII".to_owned()))?;
        let kind = RecordKind::from_tag(tag)?;
        let block = le_u64(head, 8);
        let block_len = le_u64(head, 16);
        let distance = le_u64(head, 24);
        let ambival = le_u64(head, 32);
        if block_len > self.max_block_len {
            return Err(BmdError::Format(format!(
                "instruction block length {block_len} exceeds block size {}",
                self.max_block_len
            )));
        }
        let mut digest = vec![0u8; self.digest_bytes];
        read_all(&mut self.inner, &mut digest)?;
        let mut data = vec![0u8; block_len as usize];
        read_all(&mut self.inner, &mut data)?;
        Ok(InstructionRecord {
            kind,
            block: BlockIndex(block),
            distance,
            ambival,
            digest,
            data,
        })
    }
}

/// Fetch the stored digest for one block from a checksum sidecar.
pub fn read_digest_at(
    file: &mut (impl Read + Seek),
    digest_bytes: usize,
    block: BlockIndex,
) -> Result<Vec<u8>> {
    let offset = HEADER_LEN as u64 + block.0 * digest_bytes as u64;
    file.seek(SeekFrom::Start(offset))?;
    let mut digest = vec![0u8; digest_bytes];
    file.read_exact(&mut digest).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            BmdError::Format(format!("checksum sidecar has no digest for block {block}"))
        } else {
            BmdError::Io(e)
        }
    })?;
    Ok(digest)
}

/// Fill `buf` completely, or report a clean end-of-stream when no bytes
/// remain at all. A partial record is a format error.
fn fill_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(BmdError::Format(
                "sidecar ends in the middle of a record".to_owned(),
            ));
        }
        filled += n;
    }
    Ok(true)
}

fn read_all(reader: &mut impl Read, buf: &mut [u8]) -> Result<()> {
    if fill_or_eof(reader, buf)? {
        Ok(())
    } else {
        Err(BmdError::Format(
            "sidecar ends in the middle of a record".to_owned(),
        ))
    }
}

fn le_u64(raw: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&raw[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn mismatch_record_round_trips() {
        let rec = MismatchRecord {
            block: BlockIndex(17),
            given: vec![1, 2, 3, 4],
            computed: vec![5, 6, 7, 8],
        };
        let mut buf = Vec::new();
        rec.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), 8 + 4 + 4);

        let mut reader = MismatchReader::new(Cursor::new(buf), 4);
        assert_eq!(reader.next().unwrap().unwrap(), rec);
        assert!(reader.next().is_none());
    }

    #[test]
    fn instruction_record_round_trips() {
        let rec = InstructionRecord {
            kind: RecordKind::HitUnique,
            block: BlockIndex(3),
            distance: 9,
            ambival: 0,
            digest: vec![0xAA; 4],
            data: vec![0x55; 128],
        };
        let mut buf = Vec::new();
        rec.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), 40 + 4 + 128);

        let mut reader = InstructionReader::new(Cursor::new(buf), 4, 128);
        assert_eq!(reader.next().unwrap().unwrap(), rec);
        assert!(reader.next().is_none());
    }

    #[test]
    fn short_final_block_keeps_its_length() {
        let rec = InstructionRecord {
            kind: RecordKind::NoHits,
            block: BlockIndex(23),
            distance: 0,
            ambival: 0,
            digest: vec![0; 4],
            data: vec![7; 56],
        };
        let mut buf = Vec::new();
        rec.write_to(&mut buf).unwrap();
        let got = InstructionReader::new(Cursor::new(buf), 4, 128)
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(got.data.len(), 56);
    }

    #[test]
    fn truncated_record_is_a_format_error() {
        let rec = MismatchRecord {
            block: BlockIndex(0),
            given: vec![0; 4],
            computed: vec![0; 4],
        };
        let mut buf = Vec::new();
        rec.write_to(&mut buf).unwrap();
        buf.truncate(10);
        let mut reader = MismatchReader::new(Cursor::new(buf), 4);
        assert!(reader.next().unwrap().is_err());
    }

    #[test]
    fn oversized_length_field_is_rejected() {
        let rec = InstructionRecord {
            kind: RecordKind::Hit,
            block: BlockIndex(0),
            distance: 0,
            ambival: 0,
            digest: vec![0; 4],
            data: vec![0; 64],
        };
        let mut buf = Vec::new();
        rec.write_to(&mut buf).unwrap();
        let mut reader = InstructionReader::new(Cursor::new(buf), 4, 32);
        assert!(reader.next().unwrap().is_err());
    }

    #[test]
    fn digest_lookup_by_block_index() {
        let mut body = vec![0u8; HEADER_LEN];
        for i in 0u8..5 {
            body.extend_from_slice(&[i; 4]);
        }
        let mut cursor = Cursor::new(body);
        assert_eq!(read_digest_at(&mut cursor, 4, BlockIndex(3)).unwrap(), vec![3; 4]);
        assert!(read_digest_at(&mut cursor, 4, BlockIndex(9)).is_err());
    }
}
