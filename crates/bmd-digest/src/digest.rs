//! Uniform checksum computation over in-memory bytes.
//!
//! One entry point, [`compute`], selected by [`ChecksumMethod`]. The
//! truncated MD5 variants take fixed byte positions from the full 16-byte
//! MD5 output; the CRC-32 value is packed little-endian. These layouts are
//! part of the sidecar format.

use bmd_types::ChecksumMethod;
use md4::Md4;
use md5::{Digest, Md5};
use sha2::Sha256;

/// Byte positions selected from the full MD5 for the 16-bit tag.
const MD5_16_PICK: [usize; 2] = [6, 13];
/// Byte positions selected from the full MD5 for the 32-bit tag.
const MD5_32_PICK: [usize; 4] = [2, 6, 10, 14];
/// Byte positions selected from the full MD5 for the 64-bit tag.
const MD5_64_PICK: [usize; 8] = [2, 3, 6, 9, 10, 12, 13, 15];

/// Compute the digest of `data` under `method`.
///
/// Deterministic and infallible; the returned vector is always
/// `method.digest_bytes()` long.
#[must_use]
pub fn compute(method: ChecksumMethod, data: &[u8]) -> Vec<u8> {
    match method {
        ChecksumMethod::Md4 => Md4::digest(data).to_vec(),
        ChecksumMethod::Md5 => Md5::digest(data).to_vec(),
        ChecksumMethod::Sha256 => Sha256::digest(data).to_vec(),
        ChecksumMethod::Crc32 => crc32fast::hash(data).to_le_bytes().to_vec(),
        ChecksumMethod::Md5_16 => pick_md5(data, &MD5_16_PICK),
        ChecksumMethod::Md5_32 => pick_md5(data, &MD5_32_PICK),
        ChecksumMethod::Md5_64 => pick_md5(data, &MD5_64_PICK),
    }
}

fn pick_md5(data: &[u8], positions: &[usize]) -> Vec<u8> {
    let full = Md5::digest(data);
    positions.iter().map(|&i| full[i]).collect()
}
