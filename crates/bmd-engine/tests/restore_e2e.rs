//! End-to-end restore scenarios: damage split across data and backup.

use bmd_engine::{
    diagnose, execute, generate, repair, restore, verify, Budgets, DiagnoseInputs, RestoreInputs,
    RestoreMode, SearchOptions,
};
use bmd_sidecar::{InstructionReader, SidecarHeader};
use bmd_types::{ChecksumMethod, Geometry, RecordKind, Redundancy};
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, bytes).unwrap();
    path
}

fn read_instructions(path: &Path) -> Vec<bmd_sidecar::InstructionRecord> {
    let mut reader = BufReader::new(fs::File::open(path).unwrap());
    let decoded = SidecarHeader::read_from(&mut reader).unwrap();
    let geometry = decoded.header.geometry;
    InstructionReader::new(
        reader,
        geometry.method.digest_bytes(),
        geometry.block_bytes() as u64,
    )
    .map(|r| r.unwrap())
    .collect()
}

/// Zero-budget repair leaves a NOHITS instruction for restore to chew on.
fn failed_repair(
    dir: &TempDir,
    data: &Path,
    sidecar: &Path,
) -> (PathBuf, PathBuf) {
    let errors = dir.path().join("data.err");
    let repairs = dir.path().join("data.rep");
    verify(data, sidecar, &errors).unwrap();
    let opts = SearchOptions {
        budgets: Budgets {
            repair: 0,
            restore: 0,
        },
        ..SearchOptions::default()
    };
    repair(data, &errors, &repairs, &opts).unwrap();
    (errors, repairs)
}

#[test]
fn burst_split_between_copies_restores_the_original() {
    // Data lost the low nibble of byte 17, the backup lost the high
    // nibble; both sidecars still describe the common original.
    let dir = TempDir::new().unwrap();
    let geometry = Geometry::new(ChecksumMethod::Md5, Redundancy::new(32).unwrap());
    let original: Vec<u8> = (0..512u32).map(|i| (i * 3 % 256) as u8).collect();

    let mut corrupt = original.clone();
    corrupt[17] ^= 0b0000_1111;
    let mut backup_bytes = original.clone();
    backup_bytes[17] ^= 0b1111_0000;

    let data = write_file(&dir, "data.bin", &original);
    let sidecar = dir.path().join("data.chk");
    generate(&data, &sidecar, geometry).unwrap();
    fs::write(&data, &corrupt).unwrap();

    let backup = write_file(&dir, "backup.bin", &original);
    let backup_sidecar = dir.path().join("backup.chk");
    generate(&backup, &backup_sidecar, geometry).unwrap();
    fs::write(&backup, &backup_bytes).unwrap();

    let (_errors, repairs) = failed_repair(&dir, &data, &sidecar);
    assert_eq!(read_instructions(&repairs)[0].kind, RecordKind::NoHits);

    let restores = dir.path().join("data.rst");
    let opts = SearchOptions {
        budgets: Budgets {
            repair: 1_000,
            restore: 1_000,
        },
        ..SearchOptions::default()
    };
    let report = restore(
        &RestoreInputs {
            repair: &repairs,
            data: &data,
            backup: &backup,
            backup_checksum: &backup_sidecar,
        },
        &restores,
        RestoreMode::All,
        &opts,
    )
    .unwrap();
    assert_eq!(report.ok, 1);

    let records = read_instructions(&restores);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, RecordKind::HitUnique);
    assert_eq!(records[0].data, original);

    execute(&data, &restores).unwrap();
    assert_eq!(fs::read(&data).unwrap(), original);
}

#[test]
fn legitimately_diverged_backup_yields_an_ambiguous_restore() {
    // The backup was taken from a sibling version differing in one bit,
    // so its sidecar vouches for that sibling while the data sidecar
    // vouches for the original. Both survive the search: ambiguity.
    let dir = TempDir::new().unwrap();
    let geometry = Geometry::new(ChecksumMethod::Md5, Redundancy::new(2).unwrap());
    let original: Vec<u8> = (0..32u32).map(|i| (i * 11 % 256) as u8).collect();

    // Sibling differs at bit 2 of byte 20; the data copy then lost bit
    // 5 of byte 3.
    let mut sibling = original.clone();
    sibling[20] ^= 1 << 2;
    let mut corrupt = original.clone();
    corrupt[3] ^= 1 << 5;

    let data = write_file(&dir, "data.bin", &original);
    let sidecar = dir.path().join("data.chk");
    generate(&data, &sidecar, geometry).unwrap();
    fs::write(&data, &corrupt).unwrap();

    let backup = write_file(&dir, "backup.bin", &sibling);
    let backup_sidecar = dir.path().join("backup.chk");
    generate(&backup, &backup_sidecar, geometry).unwrap();

    let (_errors, repairs) = failed_repair(&dir, &data, &sidecar);

    let restores = dir.path().join("data.rst");
    let report = restore(
        &RestoreInputs {
            repair: &repairs,
            data: &data,
            backup: &backup,
            backup_checksum: &backup_sidecar,
        },
        &restores,
        RestoreMode::All,
        &SearchOptions::default(),
    )
    .unwrap();
    assert_eq!(report.ambiguous, 1);

    let records = read_instructions(&restores);
    let hits: Vec<_> = records
        .iter()
        .filter(|r| r.kind == RecordKind::Hit)
        .collect();
    assert_eq!(hits.len(), 2);
    let summary = records.last().unwrap();
    assert_eq!(summary.kind, RecordKind::HitAmbiguous);
    assert!(summary.ambival > 0);
    // The original is closer to the observed pair than the sibling.
    assert_eq!(summary.data, original);

    // Execute applies the ambiguous choice; diagnose then agrees with
    // the original and reports the block clean.
    execute(&data, &restores).unwrap();
    assert_eq!(fs::read(&data).unwrap(), original);

    let orig_file = write_file(&dir, "orig.bin", &original);
    let corrupt_file = write_file(&dir, "corrupt.bin", &corrupt);
    let diag = dir.path().join("diag.txt");
    let report = diagnose(
        &DiagnoseInputs {
            repair: &repairs,
            restore: &restores,
            original: &orig_file,
            backup: &backup,
            corrupt: &corrupt_file,
            data: &data,
        },
        &diag,
    )
    .unwrap();
    assert_eq!(report.ok, 1);
    assert_eq!(report.failed, 0);
}

#[test]
fn agreeing_copies_short_circuit_the_search() {
    // Backup and data are bit-identical; the stored digest is simply
    // stale. A single computation decides the block.
    let dir = TempDir::new().unwrap();
    let geometry = Geometry::new(ChecksumMethod::Md5, Redundancy::new(32).unwrap());
    let original: Vec<u8> = vec![0x5Au8; 512];

    let data = write_file(&dir, "data.bin", &original);
    let sidecar = dir.path().join("data.chk");
    generate(&data, &sidecar, geometry).unwrap();

    // Corrupt one digit of the stored digest instead of the data.
    let mut raw = fs::read(&sidecar).unwrap();
    raw[40] ^= 0x01;
    fs::write(&sidecar, &raw).unwrap();

    let (_errors, repairs) = failed_repair(&dir, &data, &sidecar);

    let backup = write_file(&dir, "backup.bin", &original);
    let backup_sidecar = dir.path().join("backup.chk");
    generate(&backup, &backup_sidecar, geometry).unwrap();

    let restores = dir.path().join("data.rst");
    let report = restore(
        &RestoreInputs {
            repair: &repairs,
            data: &data,
            backup: &backup,
            backup_checksum: &backup_sidecar,
        },
        &restores,
        RestoreMode::All,
        &SearchOptions::default(),
    )
    .unwrap();
    assert_eq!(report.ok, 1);
    let records = read_instructions(&restores);
    assert_eq!(records[0].kind, RecordKind::HitUnique);
    assert_eq!(records[0].data, original);
}

#[test]
fn truncated_backup_is_a_block_length_mismatch() {
    let dir = TempDir::new().unwrap();
    let geometry = Geometry::new(ChecksumMethod::Md5, Redundancy::new(32).unwrap());
    let original: Vec<u8> = (0..512u32).map(|i| (i % 256) as u8).collect();

    let data = write_file(&dir, "data.bin", &original);
    let sidecar = dir.path().join("data.chk");
    generate(&data, &sidecar, geometry).unwrap();
    let mut corrupt = original.clone();
    corrupt[9] ^= 0xFF;
    fs::write(&data, &corrupt).unwrap();

    // Backup lost its tail: only 100 bytes survive.
    let backup = write_file(&dir, "backup.bin", &original[..100]);
    let backup_sidecar = dir.path().join("backup.chk");
    generate(&backup, &backup_sidecar, geometry).unwrap();

    let (_errors, repairs) = failed_repair(&dir, &data, &sidecar);
    let restores = dir.path().join("data.rst");
    let report = restore(
        &RestoreInputs {
            repair: &repairs,
            data: &data,
            backup: &backup,
            backup_checksum: &backup_sidecar,
        },
        &restores,
        RestoreMode::All,
        &SearchOptions::default(),
    )
    .unwrap();
    assert_eq!(report.failed, 1);
    let records = read_instructions(&restores);
    assert_eq!(records[0].kind, RecordKind::BlockLengthMismatch);
}

#[test]
fn backup_under_a_different_method_is_a_checksum_length_mismatch() {
    let dir = TempDir::new().unwrap();
    let geometry = Geometry::new(ChecksumMethod::Md5, Redundancy::new(32).unwrap());
    let original: Vec<u8> = (0..512u32).map(|i| (i % 256) as u8).collect();

    let data = write_file(&dir, "data.bin", &original);
    let sidecar = dir.path().join("data.chk");
    generate(&data, &sidecar, geometry).unwrap();
    let mut corrupt = original.clone();
    corrupt[9] ^= 0xFF;
    fs::write(&data, &corrupt).unwrap();

    let backup = write_file(&dir, "backup.bin", &original);
    let backup_sidecar = dir.path().join("backup.chk");
    let backup_geometry = Geometry::new(ChecksumMethod::Sha256, Redundancy::new(16).unwrap());
    generate(&backup, &backup_sidecar, backup_geometry).unwrap();

    let (_errors, repairs) = failed_repair(&dir, &data, &sidecar);
    let restores = dir.path().join("data.rst");
    let report = restore(
        &RestoreInputs {
            repair: &repairs,
            data: &data,
            backup: &backup,
            backup_checksum: &backup_sidecar,
        },
        &restores,
        RestoreMode::All,
        &SearchOptions::default(),
    )
    .unwrap();
    assert_eq!(report.failed, 1);
    let records = read_instructions(&restores);
    assert_eq!(records[0].kind, RecordKind::ChecksumLengthMismatch);
}

#[test]
fn ambi_only_mode_skips_failed_blocks() {
    let dir = TempDir::new().unwrap();
    let geometry = Geometry::new(ChecksumMethod::Md5, Redundancy::new(32).unwrap());
    let original: Vec<u8> = (0..512u32).map(|i| (i % 256) as u8).collect();

    let data = write_file(&dir, "data.bin", &original);
    let sidecar = dir.path().join("data.chk");
    generate(&data, &sidecar, geometry).unwrap();
    let mut corrupt = original.clone();
    corrupt[400] ^= 0x02;
    fs::write(&data, &corrupt).unwrap();

    let backup = write_file(&dir, "backup.bin", &original);
    let backup_sidecar = dir.path().join("backup.chk");
    generate(&backup, &backup_sidecar, geometry).unwrap();

    let (_errors, repairs) = failed_repair(&dir, &data, &sidecar);
    let restores = dir.path().join("data.rst");
    let report = restore(
        &RestoreInputs {
            repair: &repairs,
            data: &data,
            backup: &backup,
            backup_checksum: &backup_sidecar,
        },
        &restores,
        RestoreMode::AmbiOnly,
        &SearchOptions::default(),
    )
    .unwrap();
    // The only record is NOHITS, which ambi-only ignores.
    assert_eq!(report.total, 0);
    assert!(read_instructions(&restores).is_empty());
}
