//! The 32-byte self-redundant sidecar header.
//!
//! Layout (all integers little-endian):
//!
//! | offset | size | field           |
//! |-------:|-----:|-----------------|
//! | 0      | 8    | method_name_A   |
//! | 8      | 8    | method_name_B   |
//! | 16     | 4    | checksum_bits_A |
//! | 20     | 4    | checksum_bits_B |
//! | 24     | 4    | block_bytes_A   |
//! | 28     | 4    | block_bytes_B   |
//!
//! The duplication is the survival mechanism: a reader reconciles the
//! method name by validity then equality, and each numeric field by
//! preferring the copy that is a power of two. A reconciled field is
//! reported as repaired and the read continues; disagreement between two
//! plausible copies aborts the read.

use bmd_error::{BmdError, Result};
use bmd_types::{ChecksumMethod, Geometry, HEADER_LEN};
use std::io::{Read, Write};
use tracing::warn;

/// Parsed sidecar header: the task geometry, self-described.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SidecarHeader {
    pub geometry: Geometry,
}

/// Result of a tolerant header read.
#[derive(Debug, Clone)]
pub struct DecodedHeader {
    pub header: SidecarHeader,
    /// Names of fields reconciled from their twin, empty for a clean read.
    pub repaired: Vec<&'static str>,
}

impl SidecarHeader {
    #[must_use]
    pub fn new(geometry: Geometry) -> Self {
        Self { geometry }
    }

    /// Serialize with every field duplicated.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut raw = [0u8; HEADER_LEN];
        let name = self.geometry.method.name().as_bytes();
        raw[..name.len()].copy_from_slice(name);
        raw[8..8 + name.len()].copy_from_slice(name);
        let bits = self.geometry.method.digest_bits().to_le_bytes();
        raw[16..20].copy_from_slice(&bits);
        raw[20..24].copy_from_slice(&bits);
        let block = (self.geometry.block_bytes() as u32).to_le_bytes();
        raw[24..28].copy_from_slice(&block);
        raw[28..32].copy_from_slice(&block);
        raw
    }

    /// Reconcile the duplicated fields of a possibly damaged header.
    pub fn decode(raw: &[u8; HEADER_LEN]) -> Result<DecodedHeader> {
        let mut repaired = Vec::new();

        let (method, bad_name) = resolve_method(&raw[..8], &raw[8..16])?;
        if let Some(field) = bad_name {
            repaired.push(field);
        }

        let checksum_bits = resolve_pow2(
            le_u32(raw, 16),
            le_u32(raw, 20),
            ("checksum_bits_A", "checksum_bits_B"),
            &mut repaired,
        )?;
        let block_bytes = resolve_pow2(
            le_u32(raw, 24),
            le_u32(raw, 28),
            ("block_bytes_A", "block_bytes_B"),
            &mut repaired,
        )?;

        if checksum_bits != method.digest_bits() {
            return Err(BmdError::Header(format!(
                "checksum_bits {} does not match method {} ({} bits)",
                checksum_bits,
                method,
                method.digest_bits()
            )));
        }
        let geometry = Geometry::from_header_fields(method, block_bytes)
            .map_err(|e| BmdError::Header(e.to_string()))?;

        for field in &repaired {
            warn!(target: "bmd::sidecar", field, "header field reconciled from its twin");
        }
        Ok(DecodedHeader {
            header: Self::new(geometry),
            repaired,
        })
    }

    /// Read and reconcile a header from the start of a sidecar stream.
    pub fn read_from(reader: &mut impl Read) -> Result<DecodedHeader> {
        let mut raw = [0u8; HEADER_LEN];
        reader.read_exact(&mut raw)?;
        Self::decode(&raw)
    }

    pub fn write_to(&self, writer: &mut impl Write) -> Result<()> {
        writer.write_all(&self.encode())?;
        Ok(())
    }
}

fn le_u32(raw: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([raw[offset], raw[offset + 1], raw[offset + 2], raw[offset + 3]])
}

/// Parse one 8-byte name slot; valid means it names a known method.
fn parse_name(slot: &[u8]) -> Option<ChecksumMethod> {
    let text = std::str::from_utf8(slot).ok()?;
    ChecksumMethod::from_name(text.trim_end_matches('\0')).ok()
}

fn resolve_method(
    a: &[u8],
    b: &[u8],
) -> Result<(ChecksumMethod, Option<&'static str>)> {
    match (parse_name(a), parse_name(b)) {
        (Some(ma), Some(mb)) if ma == mb => Ok((ma, None)),
        (Some(_), Some(_)) => Err(BmdError::Header(
            "method name copies disagree and both are plausible".to_owned(),
        )),
        (Some(ma), None) => Ok((ma, Some("method_name_B"))),
        (None, Some(mb)) => Ok((mb, Some("method_name_A"))),
        (None, None) => Err(BmdError::Header(
            "neither method name copy is recognizable".to_owned(),
        )),
    }
}

fn resolve_pow2(
    a: u32,
    b: u32,
    fields: (&'static str, &'static str),
    repaired: &mut Vec<&'static str>,
) -> Result<u32> {
    match (a.is_power_of_two(), b.is_power_of_two()) {
        (true, true) if a == b => Ok(a),
        (true, true) => Err(BmdError::Header(format!(
            "{} = {a} and {} = {b} are both plausible but disagree",
            fields.0, fields.1
        ))),
        (true, false) => {
            repaired.push(fields.1);
            Ok(a)
        }
        (false, true) => {
            repaired.push(fields.0);
            Ok(b)
        }
        (false, false) => Err(BmdError::Header(format!(
            "neither copy of {}/{} is a power of two",
            fields.0, fields.1
        ))),
    }
}
