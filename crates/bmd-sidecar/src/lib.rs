#![forbid(unsafe_code)]
//! Sidecar file formats.
//!
//! Every non-data sidecar (checksum, error, instruction) starts with a
//! 32-byte header that carries each logical field twice, so any single
//! corrupted field can be reconciled from its twin. Bodies are dense
//! binary records in strictly ascending block order, with advisory text
//! twins written alongside.

pub mod header;
pub mod records;
pub mod text;

pub use header::{DecodedHeader, SidecarHeader};
pub use records::{
    read_digest_at, InstructionReader, InstructionRecord, MismatchReader, MismatchRecord,
};
