//! Chain integrity tests
//!
//! Covers chain layout, termination and byte accounting, before and after
//! the records reach disk.

use rawblock::{BlockAllocator, ChainLink, Store, StoreError};
use std::collections::HashSet;
use tempfile::TempDir;

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn test_format_scenario() {
    let dir = TempDir::new().unwrap();
    let store = Store::format(dir.path().join("x"), 100, 3).unwrap();

    assert_eq!(store.block_size(), 4096);
    assert_eq!(store.block_count(), 8);
    assert_eq!(store.bitmap().count_free(), 8);
    assert_eq!(store.free_block_count(), 8);
}

#[test]
fn test_five_byte_payload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("five.hmv");
    let mut store = Store::format(&path, 4096, 8).unwrap();

    let first = store.write(b"hello").unwrap();
    assert_eq!(store.chain(first).unwrap(), vec![first]);
    store.close().unwrap();

    let mut store = Store::open(&path).unwrap();
    let record = store.block(first).unwrap();
    assert_eq!(record.index, first);
    assert_eq!(record.link, ChainLink::Terminal);
    assert_eq!(&record.data[0..5], b"hello");
    assert!(record.data[5..].iter().all(|&b| b == 0));
}

#[test]
fn test_chain_bytes_match_payload_after_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bytes.hmv");
    let payload = pattern(5 * 4096 + 123);

    let mut store = Store::format(&path, 4096, 8).unwrap();
    let first = store.write(&payload).unwrap();
    store.close().unwrap();

    let mut store = Store::open(&path).unwrap();
    let chain = store.chain(first).unwrap();
    assert_eq!(chain.len(), 6);

    let mut remaining = payload.len();
    let mut rebuilt = Vec::new();
    for index in chain {
        let record = store.block(index).unwrap();
        let take = remaining.min(4096);
        rebuilt.extend_from_slice(&record.data[..take]);
        remaining -= take;
    }
    assert_eq!(rebuilt, payload);
}

#[test]
fn test_staged_chain_byte_accounting() {
    let dir = TempDir::new().unwrap();
    let mut store = Store::format(dir.path().join("acct.hmv"), 4096, 8).unwrap();

    for len in [1usize, 4095, 4096, 4097, 3 * 4096, 3 * 4096 + 1] {
        let payload = pattern(len);
        let first = store.write(&payload).unwrap();

        let mut remaining = len;
        let mut rebuilt = Vec::new();
        for index in store.chain(first).unwrap() {
            let record = store.block(index).unwrap();
            let take = remaining.min(4096);
            rebuilt.extend_from_slice(&record.data[..take]);
            assert!(record.data[take..].iter().all(|&b| b == 0));
            remaining -= take;
        }
        assert_eq!(remaining, 0, "chain too short for {} bytes", len);
        assert_eq!(rebuilt, payload, "byte accounting failed for {} bytes", len);
    }
}

#[test]
fn test_chains_never_share_blocks() {
    let dir = TempDir::new().unwrap();
    let mut store = Store::format(dir.path().join("share.hmv"), 4096, 8).unwrap();

    let firsts: Vec<u64> = (0..20)
        .map(|i| store.write(&vec![i as u8; (i % 4 + 1) * 3000]).unwrap())
        .collect();

    let mut allocated = HashSet::new();
    for first in firsts {
        for index in store.chain(first).unwrap() {
            assert!(allocated.insert(index), "Block {} allocated twice!", index);
            assert!(!store.bitmap().is_free(index));
        }
    }

    assert_eq!(allocated.len() as u64, store.stats().used_blocks);
}

#[test]
fn test_freed_blocks_are_reused_lowest_first() {
    let dir = TempDir::new().unwrap();
    let mut store = Store::format(dir.path().join("reuse.hmv"), 4096, 8).unwrap();

    let a = store.write(&vec![1; 2 * 4096]).unwrap();
    let b = store.write(b"keep").unwrap();
    assert_eq!((a, b), (0, 2));

    store.free_chain(a).unwrap();
    let c = store.write(&vec![3; 3 * 4096]).unwrap();

    assert_eq!(store.chain(c).unwrap(), vec![0, 1, 3]);
    assert_eq!(store.chain(b).unwrap(), vec![2]);
}

#[test]
fn test_zero_free_without_growth() {
    let dir = TempDir::new().unwrap();
    let mut store = rawblock::StoreBuilder::new()
        .path(dir.path().join("full.hmv"))
        .without_auto_grow()
        .format()
        .unwrap();

    store.write(&vec![0; 8 * 4096]).unwrap();
    let before = store.free_block_count();

    let result = store.write(b"one more");
    assert!(matches!(result, Err(StoreError::OutOfSpace { .. })));
    assert_eq!(store.free_block_count(), before);
    assert_eq!(store.bitmap().count_free(), 0);
}

#[test]
fn test_operations_after_close_and_reopen_continue_allocating() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("continue.hmv");

    let mut store = Store::format(&path, 4096, 8).unwrap();
    store.write(b"one").unwrap();
    store.write(b"two").unwrap();
    store.close().unwrap();

    let mut store = Store::open(&path).unwrap();
    assert_eq!(store.write(b"three").unwrap(), 2);
}
