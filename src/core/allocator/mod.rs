//! Block allocation for the store arena
//!
//! A single bitmap allocator tracks which block slots are free. Allocation is
//! lowest-index-first, so a freshly formatted store hands out 0, 1, 2, ...

pub mod bitmap;

use crate::error::Result;

/// Block allocator trait
///
/// Defines the interface the chain writer and growth manager use to claim,
/// release and extend block slots.
pub trait BlockAllocator {
    /// Lowest free block index, or `None` when the arena is full
    fn find_free(&self) -> Option<u64>;

    /// Claim a free block
    fn mark_used(&mut self, index: u64) -> Result<()>;

    /// Return a block to the free pool
    fn mark_free(&mut self, index: u64) -> Result<()>;

    /// Whether a block is currently free
    fn is_free(&self, index: u64) -> bool;

    /// Track more blocks; new blocks start free and existing state is kept
    fn extend_capacity(&mut self, new_total_blocks: u64) -> Result<()>;

    /// Get total number of blocks managed
    fn total_blocks(&self) -> u64;

    /// Get number of free blocks available
    fn free_blocks(&self) -> u64;
}
