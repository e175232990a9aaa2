//! Block chain writer
//!
//! Splits a payload into block-sized segments, claims one block per segment
//! and links each segment to the next. Admission and growth happen in the
//! store before the writer runs; the writer only consumes free bits.

use crate::allocator::BlockAllocator;
use crate::block::{BlockRecord, ChainLink};
use crate::error::{Result, StoreError};
use crate::flush::WriteQueue;

/// Blocks needed to hold `len` bytes (at least one)
pub fn blocks_needed(len: u64, block_size: u64) -> u64 {
    let full = len / block_size;
    let partial = u64::from(len % block_size != 0);
    (full + partial).max(1)
}

/// Writes one payload as a chain of block records
pub struct ChainWriter<'a, A: BlockAllocator> {
    allocator: &'a mut A,
    queue: &'a mut WriteQueue,
    block_size: u64,
}

impl<'a, A: BlockAllocator> ChainWriter<'a, A> {
    pub fn new(allocator: &'a mut A, queue: &'a mut WriteQueue, block_size: u64) -> Self {
        ChainWriter {
            allocator,
            queue,
            block_size,
        }
    }

    /// Write `payload` and return the index of the chain's first block
    ///
    /// Records are staged in the write queue, not yet durable. If a block
    /// cannot be claimed part-way through, every block claimed by this call is
    /// released before the error is returned.
    pub fn write(&mut self, payload: &[u8]) -> Result<u64> {
        if payload.is_empty() {
            return Err(StoreError::EmptyPayload);
        }

        let needed = blocks_needed(payload.len() as u64, self.block_size);
        let mut records: Vec<BlockRecord> = Vec::with_capacity(needed as usize);

        let mut offset = 0;
        let mut remaining = payload.len();

        while remaining > 0 {
            let index = match self.claim() {
                Ok(index) => index,
                Err(e) => {
                    self.release(&records);
                    return Err(e);
                }
            };

            // The previous segment learns its successor only now
            if let Some(prev) = records.last_mut() {
                prev.link = ChainLink::Linked(index);
            }

            let chunk_size = remaining.min(self.block_size as usize);
            let chunk = payload[offset..offset + chunk_size].to_vec();
            records.push(BlockRecord::new(index, ChainLink::Terminal, chunk));

            offset += chunk_size;
            remaining -= chunk_size;
        }

        debug_assert_eq!(records.len() as u64, needed);

        let first = records[0].index;
        tracing::debug!(
            "Wrote {} bytes as a {}-block chain starting at block {}",
            payload.len(),
            records.len(),
            first
        );

        for record in records {
            self.queue.stage(record);
        }
        self.queue.mark_bitmap_dirty();

        Ok(first)
    }

    /// Find the lowest free block and mark it used in one step
    fn claim(&mut self) -> Result<u64> {
        let index = self
            .allocator
            .find_free()
            .ok_or(StoreError::AllocationExhausted)?;
        self.allocator.mark_used(index)?;
        Ok(index)
    }

    fn release(&mut self, records: &[BlockRecord]) {
        for record in records {
            if let Err(e) = self.allocator.mark_free(record.index) {
                tracing::warn!("Failed to release block {}: {}", record.index, e);
            }
        }
    }
}
