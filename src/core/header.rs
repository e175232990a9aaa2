use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};

pub const MAGIC: [u8; 8] = *b"HMVFS\x00\x00\x00";

/// Size of the encoded superblock: magic plus four `u64` fields.
pub const HEADER_SIZE: u64 = 40;

/// Size of the `next` + `index` prefix carried by every block record.
pub const RECORD_HEADER_SIZE: u64 = 16;

pub const MIN_BLOCK_SIZE: u64 = 4096;
pub const MIN_BLOCK_COUNT: u64 = 8;

/// Bits per bitmap word
pub const BITMAP_WORD_BITS: u64 = 64;

/// Round up to the next power of two
///
/// Fails only when the result would not fit in a `u64`.
pub fn round_up_pow2(value: u64) -> Result<u64> {
    value.max(1).checked_next_power_of_two().ok_or_else(|| {
        StoreError::InvalidGeometry(format!("{} cannot be rounded to a power of two", value))
    })
}

/// Number of bitmap words needed to track `block_count` blocks
pub fn bitmap_words(block_count: u64) -> u64 {
    (block_count + BITMAP_WORD_BITS - 1) / BITMAP_WORD_BITS
}

/// Encoded size of the bitmap region in bytes
pub fn bitmap_byte_size(block_count: u64) -> u64 {
    bitmap_words(block_count) * 8
}

/// Byte offsets of the regions that follow the block arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionOffsets {
    pub bitmap_offset: u64,
    pub string_table_offset: u64,
}

/// Derive the bitmap and string-table offsets for a geometry
///
/// This is the only place the layout arithmetic lives; format, growth and
/// validation on open all go through it.
pub fn recompute_offsets(block_size: u64, block_count: u64) -> Result<RegionOffsets> {
    let overflow = || {
        StoreError::InvalidGeometry(format!(
            "{} blocks of {} bytes overflow the addressable file size",
            block_count, block_size
        ))
    };

    let record_size = RECORD_HEADER_SIZE
        .checked_add(block_size)
        .ok_or_else(overflow)?;
    let bitmap_offset = record_size
        .checked_mul(block_count)
        .and_then(|arena| arena.checked_add(HEADER_SIZE))
        .ok_or_else(overflow)?;
    let string_table_offset = bitmap_offset
        .checked_add(bitmap_byte_size(block_count))
        .ok_or_else(overflow)?;

    Ok(RegionOffsets {
        bitmap_offset,
        string_table_offset,
    })
}

/// Store superblock (file offset 0)
///
/// Describes the block geometry and where the bitmap and the reserved
/// string table live. `bitmap_offset` and `string_table_offset` are always
/// derived from `block_size` and `block_count` via [`recompute_offsets`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Superblock {
    /// Magic tag: "HMVFS" zero-padded to 8 bytes
    pub magic: [u8; 8],

    /// Payload bytes per block (power of two, immutable after format)
    pub block_size: u64,

    /// Number of block slots in the arena (power of two, only grows)
    pub block_count: u64,

    /// Byte offset of the bitmap region
    pub bitmap_offset: u64,

    /// Byte offset of the reserved string table
    pub string_table_offset: u64,
}

impl Superblock {
    /// Build the superblock for a fresh store
    ///
    /// Both inputs are raised to their minima and rounded up to a power of two.
    pub fn format(block_size: u64, block_count: u64) -> Result<Self> {
        let block_size = round_up_pow2(block_size.max(MIN_BLOCK_SIZE))?;
        let block_count = round_up_pow2(block_count.max(MIN_BLOCK_COUNT))?;
        let offsets = recompute_offsets(block_size, block_count)?;

        Ok(Superblock {
            magic: MAGIC,
            block_size,
            block_count,
            bitmap_offset: offsets.bitmap_offset,
            string_table_offset: offsets.string_table_offset,
        })
    }

    /// Check a magic tag read from disk
    pub fn validate_magic(magic: &[u8; 8]) -> Result<()> {
        if *magic != MAGIC {
            return Err(StoreError::FormatMismatch);
        }
        Ok(())
    }

    /// Validate magic, geometry and derived offsets
    pub fn validate(&self) -> Result<()> {
        Self::validate_magic(&self.magic)?;

        if self.block_size < MIN_BLOCK_SIZE || !self.block_size.is_power_of_two() {
            return Err(StoreError::CorruptSuperblock(format!(
                "block size {} is not a power of two >= {}",
                self.block_size, MIN_BLOCK_SIZE
            )));
        }

        if self.block_count < MIN_BLOCK_COUNT || !self.block_count.is_power_of_two() {
            return Err(StoreError::CorruptSuperblock(format!(
                "block count {} is not a power of two >= {}",
                self.block_count, MIN_BLOCK_COUNT
            )));
        }

        let expected = recompute_offsets(self.block_size, self.block_count)
            .map_err(|e| StoreError::CorruptSuperblock(e.to_string()))?;
        if expected != self.offsets() {
            return Err(StoreError::CorruptSuperblock(format!(
                "offsets ({}, {}) do not match {} blocks (expected ({}, {}))",
                self.bitmap_offset,
                self.string_table_offset,
                self.block_count,
                expected.bitmap_offset,
                expected.string_table_offset
            )));
        }

        Ok(())
    }

    /// Current region offsets
    pub fn offsets(&self) -> RegionOffsets {
        RegionOffsets {
            bitmap_offset: self.bitmap_offset,
            string_table_offset: self.string_table_offset,
        }
    }

    /// Set a new block count and re-derive both offsets in one step
    pub(crate) fn resize(&mut self, block_count: u64) -> Result<()> {
        let offsets = recompute_offsets(self.block_size, block_count)?;
        self.block_count = block_count;
        self.bitmap_offset = offsets.bitmap_offset;
        self.string_table_offset = offsets.string_table_offset;
        Ok(())
    }

    /// On-disk size of one block record
    pub fn record_size(&self) -> u64 {
        RECORD_HEADER_SIZE + self.block_size
    }

    /// File offset of the record in slot `index`
    pub fn record_offset(&self, index: u64) -> u64 {
        HEADER_SIZE + index * self.record_size()
    }

    /// Serialize superblock to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE as usize);

        bytes.extend_from_slice(&self.magic);
        bytes.extend_from_slice(&self.block_size.to_le_bytes());
        bytes.extend_from_slice(&self.block_count.to_le_bytes());
        bytes.extend_from_slice(&self.bitmap_offset.to_le_bytes());
        bytes.extend_from_slice(&self.string_table_offset.to_le_bytes());

        bytes
    }

    /// Deserialize and validate a superblock
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE as usize {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Insufficient bytes for superblock",
            )));
        }

        let mut magic = [0u8; 8];
        magic.copy_from_slice(&bytes[0..8]);
        Self::validate_magic(&magic)?;

        let field = |offset: usize| {
            let mut word = [0u8; 8];
            word.copy_from_slice(&bytes[offset..offset + 8]);
            u64::from_le_bytes(word)
        };

        let superblock = Superblock {
            magic,
            block_size: field(8),
            block_count: field(16),
            bitmap_offset: field(24),
            string_table_offset: field(32),
        };

        superblock.validate()?;

        Ok(superblock)
    }
}
