//! Store handle
//!
//! Owns the backing file together with the in-memory superblock, bitmap and
//! write queue. All allocation, growth and flushing goes through here.

use crate::allocator::{bitmap::BitmapAllocator, BlockAllocator};
use crate::block::{BlockRecord, ChainLink};
use crate::chain::{blocks_needed, ChainWriter};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::flush::{FlushStats, WriteQueue};
use crate::growth::{self, GrowthReport};
use crate::header::Superblock;
use crate::io::StoreFile;
use std::path::Path;

/// An open block store
pub struct Store {
    /// Backing file
    file: StoreFile,

    /// In-memory copy of the superblock
    superblock: Superblock,

    /// Free-list; its free count is the store's `free_block_count`
    bitmap: BitmapAllocator,

    /// Records and bitmap awaiting flush
    queue: WriteQueue,

    config: StoreConfig,

    /// Set after a failed growth or an allocator invariant violation
    poisoned: bool,
}

impl Store {
    /// Format a new store at `path` with default settings
    ///
    /// Any existing file at `path` is truncated.
    pub fn format<P: AsRef<Path>>(path: P, block_size: u64, block_count: u64) -> Result<Self> {
        let config = StoreConfig {
            block_size,
            initial_blocks: block_count,
            ..StoreConfig::default()
        };
        Self::format_with_config(path, config)
    }

    /// Format a new store at `path`
    ///
    /// Writes the superblock, an arena of blank records and an all-free bitmap.
    pub fn format_with_config<P: AsRef<Path>>(path: P, config: StoreConfig) -> Result<Self> {
        let superblock = Superblock::format(config.block_size, config.initial_blocks)?;
        let bitmap = BitmapAllocator::new(superblock.block_count);

        let mut file = StoreFile::create(&path)?;
        file.write_superblock(&superblock)?;
        file.write_blank_blocks(&superblock, 0, superblock.block_count)?;
        file.write_bitmap(&superblock, &bitmap.to_bytes())?;
        if config.sync_on_flush {
            file.sync()?;
        }

        tracing::info!(
            "Formatted store {:?}: {} blocks of {} bytes",
            path.as_ref(),
            superblock.block_count,
            superblock.block_size
        );

        Ok(Store {
            file,
            superblock,
            bitmap,
            queue: WriteQueue::new(),
            config,
            poisoned: false,
        })
    }

    /// Open an existing store with default settings
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Open an existing store
    ///
    /// Geometry comes from the superblock; only the runtime settings of
    /// `config` (auto-grow, limit, sync) apply.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: StoreConfig) -> Result<Self> {
        let mut file = StoreFile::open(&path)?;
        let superblock = file.read_superblock()?;
        let raw_bitmap = file.read_bitmap(&superblock)?;
        let bitmap = BitmapAllocator::from_bytes(&raw_bitmap, superblock.block_count)?;

        tracing::info!(
            "Opened store {:?}: {} blocks, {} free",
            path.as_ref(),
            superblock.block_count,
            bitmap.free_blocks()
        );

        Ok(Store {
            file,
            superblock,
            bitmap,
            queue: WriteQueue::new(),
            config,
            poisoned: false,
        })
    }

    /// Write a payload as a block chain and return its first block index
    ///
    /// Grows the arena first when fewer blocks are free than the payload
    /// needs. The records are staged; call [`Store::flush`] to persist them.
    pub fn write(&mut self, payload: &[u8]) -> Result<u64> {
        self.ensure_usable()?;

        if payload.is_empty() {
            return Err(StoreError::EmptyPayload);
        }

        let needed = blocks_needed(payload.len() as u64, self.superblock.block_size);
        self.ensure_capacity(needed)?;

        let result =
            ChainWriter::new(&mut self.bitmap, &mut self.queue, self.superblock.block_size)
                .write(payload);

        if let Err(StoreError::AllocationExhausted) = result {
            tracing::error!(
                "Bitmap exhausted after admitting {} blocks; store marked unusable",
                needed
            );
            self.poisoned = true;
        }

        result
    }

    /// Ensure sufficient free blocks, growing if allowed
    fn ensure_capacity(&mut self, needed: u64) -> Result<()> {
        let free = self.bitmap.free_blocks();
        if needed <= free {
            return Ok(());
        }

        if !self.config.auto_grow {
            return Err(StoreError::OutOfSpace {
                needed,
                free,
                source: None,
            });
        }

        // Room for the whole request when the limit allows, else the shortfall
        let shortfall = needed - free;
        let additional = match growth::target_block_count(self.superblock.block_count, needed) {
            Ok(target) if target <= self.config.max_blocks => needed,
            _ => shortfall,
        };

        match self.grow(additional) {
            Ok(_) => Ok(()),
            Err(StoreError::OutOfSpace { source, .. }) => Err(StoreError::OutOfSpace {
                needed,
                free,
                source,
            }),
            Err(e) => Err(e),
        }
    }

    /// Grow the arena by at least `additional` blocks
    ///
    /// An I/O failure part-way through leaves the file in an unknown state and
    /// the handle refuses every later operation.
    pub fn grow(&mut self, additional: u64) -> Result<GrowthReport> {
        self.ensure_usable()?;

        let result = growth::grow(
            &mut self.file,
            &mut self.superblock,
            &mut self.bitmap,
            additional,
            self.config.max_blocks,
        );

        if let Err(StoreError::OutOfSpace {
            source: Some(_), ..
        }) = &result
        {
            self.poisoned = true;
        }

        result
    }

    /// Release every block of the chain starting at `first`
    ///
    /// Returns the number of blocks returned to the free pool.
    pub fn free_chain(&mut self, first: u64) -> Result<u64> {
        self.ensure_usable()?;

        let indices = self.chain(first)?;
        for &index in &indices {
            self.bitmap.mark_free(index)?;
        }
        self.queue.mark_bitmap_dirty();

        tracing::debug!("Freed {}-block chain starting at {}", indices.len(), first);

        Ok(indices.len() as u64)
    }

    /// Ordered block indices of the chain starting at `first`
    pub fn chain(&mut self, first: u64) -> Result<Vec<u64>> {
        let mut indices = Vec::new();
        let mut current = first;

        loop {
            if indices.len() as u64 >= self.superblock.block_count {
                return Err(StoreError::CorruptChain(first));
            }

            let record = self.block(current)?;
            indices.push(current);

            match record.link {
                ChainLink::Terminal => return Ok(indices),
                ChainLink::Linked(next) => current = next,
            }
        }
    }

    /// Read a block record
    ///
    /// `data` is always `block_size` bytes, zero-padded past the written
    /// bytes, whether the record is still staged or already on disk.
    pub fn block(&mut self, index: u64) -> Result<BlockRecord> {
        if index >= self.superblock.block_count {
            return Err(StoreError::InvalidBlockIndex {
                index,
                block_count: self.superblock.block_count,
            });
        }

        if let Some(record) = self.queue.get(index) {
            let mut record = record.clone();
            record.data.resize(self.superblock.block_size as usize, 0);
            return Ok(record);
        }

        self.file.read_block(&self.superblock, index)
    }

    /// Persist staged records, the bitmap and the superblock
    pub fn flush(&mut self) -> Result<FlushStats> {
        self.ensure_usable()?;
        self.queue.flush(
            &mut self.file,
            &self.superblock,
            &self.bitmap,
            self.config.sync_on_flush,
        )
    }

    /// Flush and release the store
    pub fn close(mut self) -> Result<()> {
        let result = self.flush();
        // Nothing left for Drop to retry
        self.queue = WriteQueue::new();
        result.map(|_| ())
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.poisoned {
            return Err(StoreError::Unusable);
        }
        Ok(())
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    pub fn bitmap(&self) -> &BitmapAllocator {
        &self.bitmap
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn block_size(&self) -> u64 {
        self.superblock.block_size
    }

    pub fn block_count(&self) -> u64 {
        self.superblock.block_count
    }

    /// Blocks left in the bitmap
    pub fn free_block_count(&self) -> u64 {
        self.bitmap.free_blocks()
    }

    /// Records staged but not yet flushed
    pub fn pending_blocks(&self) -> usize {
        self.queue.pending_blocks()
    }

    pub fn is_usable(&self) -> bool {
        !self.poisoned
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Get store statistics
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            total_blocks: self.superblock.block_count,
            free_blocks: self.bitmap.free_blocks(),
            used_blocks: self.superblock.block_count - self.bitmap.free_blocks(),
            pending_blocks: self.queue.pending_blocks(),
        }
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if self.poisoned || self.queue.is_empty() {
            return;
        }

        if let Err(e) = self.queue.flush(
            &mut self.file,
            &self.superblock,
            &self.bitmap,
            self.config.sync_on_flush,
        ) {
            tracing::warn!("Failed to flush store {:?} on drop: {}", self.file.path(), e);
        }
    }
}

/// Store statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub total_blocks: u64,
    pub free_blocks: u64,
    pub used_blocks: u64,
    pub pending_blocks: usize,
}
