//! Bitmap free-list
//!
//! One bit per block, packed into 64-bit words. Bits beyond `total_blocks`
//! in the last word are kept clear so they are never handed out.

use crate::allocator::BlockAllocator;
use crate::error::{Result, StoreError};
use crate::header::{bitmap_words, BITMAP_WORD_BITS};
use serde::{Deserialize, Serialize};

/// Bitmap allocator for block slots
///
/// Represents free/allocated state with bits:
/// - 1 = free block
/// - 0 = allocated block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitmapAllocator {
    /// Bitmap words (each word = 64 bits = 64 blocks)
    bitmap: Vec<u64>,

    /// Total number of blocks tracked
    total_blocks: u64,

    /// Number of free blocks available
    free_blocks: u64,
}

/// Mask of the valid bits in word `word_idx` for a bitmap of `total_blocks`
fn valid_mask(word_idx: usize, total_blocks: u64) -> u64 {
    let start = word_idx as u64 * BITMAP_WORD_BITS;
    let valid = total_blocks.saturating_sub(start);
    if valid >= BITMAP_WORD_BITS {
        u64::MAX
    } else {
        (1u64 << valid) - 1
    }
}

impl BitmapAllocator {
    /// Create a bitmap with every block free
    pub fn new(total_blocks: u64) -> Self {
        let num_words = bitmap_words(total_blocks) as usize;
        let bitmap = (0..num_words)
            .map(|word_idx| valid_mask(word_idx, total_blocks))
            .collect();

        BitmapAllocator {
            bitmap,
            total_blocks,
            free_blocks: total_blocks,
        }
    }

    /// Rebuild a bitmap from its on-disk words
    ///
    /// Stray bits past `total_blocks` are dropped and the free count is
    /// recomputed from the remaining set bits.
    pub fn from_bytes(bytes: &[u8], total_blocks: u64) -> Result<Self> {
        let num_words = bitmap_words(total_blocks) as usize;
        if bytes.len() < num_words * 8 {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Insufficient bytes for bitmap",
            )));
        }

        let bitmap: Vec<u64> = bytes
            .chunks_exact(8)
            .take(num_words)
            .enumerate()
            .map(|(word_idx, chunk)| {
                let mut word = [0u8; 8];
                word.copy_from_slice(chunk);
                u64::from_le_bytes(word) & valid_mask(word_idx, total_blocks)
            })
            .collect();

        let free_blocks = bitmap.iter().map(|w| w.count_ones() as u64).sum();

        Ok(BitmapAllocator {
            bitmap,
            total_blocks,
            free_blocks,
        })
    }

    /// Serialize bitmap words (little-endian)
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bitmap.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    /// Raw bitmap words
    pub fn words(&self) -> &[u64] {
        &self.bitmap
    }

    /// Count set bits by scanning every word
    ///
    /// Independent of the cached free count; used to check the two agree.
    pub fn count_free(&self) -> u64 {
        self.bitmap.iter().map(|w| w.count_ones() as u64).sum()
    }

    /// Overwrite the cached free count without touching the bits
    #[cfg(test)]
    pub(crate) fn force_free_count(&mut self, free_blocks: u64) {
        self.free_blocks = free_blocks;
    }

    fn locate(&self, index: u64) -> Result<(usize, u64)> {
        if index >= self.total_blocks {
            return Err(StoreError::InvalidBlockIndex {
                index,
                block_count: self.total_blocks,
            });
        }
        let word_idx = (index / BITMAP_WORD_BITS) as usize;
        let bit = 1u64 << (index % BITMAP_WORD_BITS);
        Ok((word_idx, bit))
    }
}

impl BlockAllocator for BitmapAllocator {
    fn find_free(&self) -> Option<u64> {
        self.bitmap
            .iter()
            .enumerate()
            .find(|(_, word)| **word != 0)
            .map(|(word_idx, word)| {
                word_idx as u64 * BITMAP_WORD_BITS + word.trailing_zeros() as u64
            })
    }

    fn mark_used(&mut self, index: u64) -> Result<()> {
        let (word_idx, bit) = self.locate(index)?;

        if self.bitmap[word_idx] & bit == 0 {
            return Err(StoreError::BlockAlreadyAllocated(index));
        }

        self.bitmap[word_idx] &= !bit;
        self.free_blocks -= 1;
        Ok(())
    }

    fn mark_free(&mut self, index: u64) -> Result<()> {
        let (word_idx, bit) = self.locate(index)?;

        if self.bitmap[word_idx] & bit != 0 {
            // Already free - this is a double-free bug
            tracing::warn!("Double-free detected for block {}", index);
            return Ok(());
        }

        self.bitmap[word_idx] |= bit;
        self.free_blocks += 1;
        Ok(())
    }

    fn is_free(&self, index: u64) -> bool {
        match self.locate(index) {
            Ok((word_idx, bit)) => self.bitmap[word_idx] & bit != 0,
            Err(_) => false,
        }
    }

    fn extend_capacity(&mut self, new_total_blocks: u64) -> Result<()> {
        if new_total_blocks <= self.total_blocks {
            return Ok(()); // No need to extend
        }

        let new_num_words = bitmap_words(new_total_blocks) as usize;
        self.bitmap.resize(new_num_words, 0);

        // Existing words keep their bits; only the newly valid positions are set
        for (word_idx, word) in self.bitmap.iter_mut().enumerate() {
            let added = valid_mask(word_idx, new_total_blocks)
                & !valid_mask(word_idx, self.total_blocks);
            *word |= added;
        }

        self.free_blocks += new_total_blocks - self.total_blocks;
        self.total_blocks = new_total_blocks;

        Ok(())
    }

    fn total_blocks(&self) -> u64 {
        self.total_blocks
    }

    fn free_blocks(&self) -> u64 {
        self.free_blocks
    }
}
