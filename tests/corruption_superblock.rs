//! Corruption detection tests
//!
//! Damaged superblocks, truncated files and misplaced records must be
//! rejected on open or read.

use rawblock::{Store, StoreError, HEADER_SIZE};
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::TempDir;

fn formatted(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("corrupt.hmv");
    let mut store = Store::format(&path, 4096, 8).unwrap();
    store.write(b"payload").unwrap();
    store.close().unwrap();
    path
}

fn overwrite(path: &Path, offset: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(bytes).unwrap();
}

#[test]
fn test_corrupted_magic_is_format_mismatch() {
    let dir = TempDir::new().unwrap();
    let path = formatted(&dir);
    let before = std::fs::read(&path).unwrap();

    overwrite(&path, 0, b"XMVFS");

    let result = Store::open(&path);
    assert!(matches!(result, Err(StoreError::FormatMismatch)));

    // Only the bytes we damaged differ; open wrote nothing
    let after = std::fs::read(&path).unwrap();
    assert_eq!(before.len(), after.len());
    assert_eq!(&before[5..], &after[5..]);
}

#[test]
fn test_inconsistent_offsets_rejected() {
    let dir = TempDir::new().unwrap();
    let path = formatted(&dir);

    // bitmap_offset lives at bytes 24..32
    overwrite(&path, 24, &12345u64.to_le_bytes());

    let result = Store::open(&path);
    assert!(matches!(result, Err(StoreError::CorruptSuperblock(_))));
}

#[test]
fn test_non_power_of_two_block_count_rejected() {
    let dir = TempDir::new().unwrap();
    let path = formatted(&dir);

    // block_count lives at bytes 16..24
    overwrite(&path, 16, &9u64.to_le_bytes());

    let result = Store::open(&path);
    assert!(matches!(result, Err(StoreError::CorruptSuperblock(_))));
}

#[test]
fn test_truncated_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let path = formatted(&dir);

    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(HEADER_SIZE + 100).unwrap();

    let result = Store::open(&path);
    assert!(matches!(result, Err(StoreError::Io(_))));
}

#[test]
fn test_empty_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.hmv");
    std::fs::write(&path, b"").unwrap();

    assert!(matches!(Store::open(&path), Err(StoreError::Io(_))));
}

#[test]
fn test_misplaced_record_detected() {
    let dir = TempDir::new().unwrap();
    let path = formatted(&dir);

    // Slot 3 claims to be block 5
    let record_size = 16 + 4096;
    overwrite(&path, HEADER_SIZE + 3 * record_size + 8, &5u64.to_le_bytes());

    let mut store = Store::open(&path).unwrap();
    assert!(matches!(
        store.block(3),
        Err(StoreError::CorruptBlock { slot: 3, stored: 5 })
    ));
}

#[test]
fn test_chain_cycle_detected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cycle.hmv");

    let mut store = Store::format(&path, 4096, 8).unwrap();
    let first = store.write(&vec![1u8; 2 * 4096]).unwrap();
    store.close().unwrap();

    // Point the second record back at the first
    let record_size = 16 + 4096;
    overwrite(&path, HEADER_SIZE + record_size, &first.to_le_bytes());

    let mut store = Store::open(&path).unwrap();
    assert!(matches!(
        store.chain(first),
        Err(StoreError::CorruptChain(0))
    ));
}
