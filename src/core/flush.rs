//! Write staging and flush
//!
//! Chain writes only stage their records here. Nothing is durable until
//! [`WriteQueue::flush`] runs.

use crate::allocator::bitmap::BitmapAllocator;
use crate::block::BlockRecord;
use crate::error::Result;
use crate::header::Superblock;
use crate::io::StoreFile;
use std::collections::BTreeMap;

/// Outcome of a flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub blocks_written: usize,
    pub bitmap_written: bool,
}

/// Dirty block records and bitmap awaiting persistence
#[derive(Debug, Default)]
pub struct WriteQueue {
    /// Staged records keyed by slot; a restaged slot replaces the older copy
    pending: BTreeMap<u64, BlockRecord>,

    bitmap_dirty: bool,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a record for the next flush
    pub fn stage(&mut self, record: BlockRecord) {
        self.pending.insert(record.index, record);
    }

    pub fn mark_bitmap_dirty(&mut self) {
        self.bitmap_dirty = true;
    }

    /// Staged copy of a record, if any
    pub fn get(&self, index: u64) -> Option<&BlockRecord> {
        self.pending.get(&index)
    }

    pub fn pending_blocks(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && !self.bitmap_dirty
    }

    /// Persist staged records, then the bitmap, then the superblock
    ///
    /// The queue is only cleared once every write has succeeded, so a failed
    /// flush can be retried.
    pub fn flush(
        &mut self,
        file: &mut StoreFile,
        superblock: &Superblock,
        bitmap: &BitmapAllocator,
        sync: bool,
    ) -> Result<FlushStats> {
        for record in self.pending.values() {
            file.write_block(superblock, record)?;
        }

        let bitmap_written = self.bitmap_dirty;
        if self.bitmap_dirty {
            file.write_bitmap(superblock, &bitmap.to_bytes())?;
        }

        file.write_superblock(superblock)?;

        if sync {
            file.sync()?;
        }

        let stats = FlushStats {
            blocks_written: self.pending.len(),
            bitmap_written,
        };

        self.pending.clear();
        self.bitmap_dirty = false;

        tracing::debug!(
            "Flushed {} blocks (bitmap: {})",
            stats.blocks_written,
            stats.bitmap_written
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::ChainLink;
    use tempfile::NamedTempFile;

    #[test]
    fn test_restaging_replaces_record() {
        let mut queue = WriteQueue::new();
        queue.stage(BlockRecord::new(1, ChainLink::Terminal, b"old".to_vec()));
        queue.stage(BlockRecord::new(1, ChainLink::Terminal, b"new".to_vec()));

        assert_eq!(queue.pending_blocks(), 1);
        assert_eq!(queue.get(1).unwrap().data, b"new");
    }

    #[test]
    fn test_flush_persists_and_clears() {
        let temp = NamedTempFile::new().unwrap();
        let superblock = Superblock::format(4096, 8).unwrap();
        let bitmap = BitmapAllocator::new(8);

        let mut file = StoreFile::create(temp.path()).unwrap();
        file.write_blank_blocks(&superblock, 0, 8).unwrap();

        let mut queue = WriteQueue::new();
        queue.stage(BlockRecord::new(2, ChainLink::Terminal, b"data".to_vec()));
        queue.mark_bitmap_dirty();

        let stats = queue.flush(&mut file, &superblock, &bitmap, true).unwrap();
        assert_eq!(
            stats,
            FlushStats {
                blocks_written: 1,
                bitmap_written: true
            }
        );
        assert!(queue.is_empty());

        let record = file.read_block(&superblock, 2).unwrap();
        assert_eq!(&record.data[..4], b"data");
        assert_eq!(file.read_superblock().unwrap(), superblock);
    }
}
