//! Read-only inspection of a store
//!
//! Produces a snapshot of the superblock and the bitmap for diagnostics.

use crate::allocator::BlockAllocator;
use crate::error::Result;
use crate::header::BITMAP_WORD_BITS;
use crate::store::Store;
use serde::Serialize;
use std::fmt;

/// Snapshot of store metadata and free-list state
#[derive(Debug, Clone, Serialize)]
pub struct StoreReport {
    pub block_size: u64,
    pub block_count: u64,
    pub bitmap_offset: u64,
    pub string_table_offset: u64,
    pub used_blocks: u64,
    pub free_blocks: u64,
    pub pending_blocks: usize,

    /// One row per bitmap word, lowest block first ('1' = free)
    pub bitmap: Vec<String>,
}

impl StoreReport {
    pub fn from_store(store: &Store) -> Self {
        let superblock = store.superblock();
        let bitmap = store.bitmap();
        let total = bitmap.total_blocks();

        let rows = bitmap
            .words()
            .iter()
            .enumerate()
            .map(|(word_idx, &word)| {
                let start = word_idx as u64 * BITMAP_WORD_BITS;
                let bits = (total - start).min(BITMAP_WORD_BITS);
                (0..bits)
                    .map(|bit| if word & (1u64 << bit) != 0 { '1' } else { '0' })
                    .collect()
            })
            .collect();

        StoreReport {
            block_size: superblock.block_size,
            block_count: superblock.block_count,
            bitmap_offset: superblock.bitmap_offset,
            string_table_offset: superblock.string_table_offset,
            used_blocks: total - bitmap.free_blocks(),
            free_blocks: bitmap.free_blocks(),
            pending_blocks: store.pending_blocks(),
            bitmap: rows,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for StoreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "blocksize:    {}", self.block_size)?;
        writeln!(f, "bitmap table: {}", self.bitmap_offset)?;
        writeln!(f, "string table: {}", self.string_table_offset)?;
        writeln!(f, "blocks:       {}", self.block_count)?;
        writeln!(f, "blocks used:  {}", self.used_blocks)?;
        writeln!(f, "blocks left:  {}", self.free_blocks)?;
        writeln!(f, "bitmap:")?;
        for row in &self.bitmap {
            writeln!(f, "  {}", row)?;
        }
        Ok(())
    }
}
