//! Arena growth
//!
//! Growth rounds the new block count up to a power of two, appends blank
//! records, writes the extended bitmap at its new offset and only then
//! rewrites the superblock. The on-disk block count therefore never describes
//! slots that have not been initialized.

use crate::allocator::{bitmap::BitmapAllocator, BlockAllocator};
use crate::error::{Result, StoreError};
use crate::header::{round_up_pow2, Superblock};
use crate::io::StoreFile;

/// Upper bound on the arena size (64 GiB at the minimum block size)
pub const DEFAULT_MAX_BLOCKS: u64 = 1 << 24;

/// Result of a growth event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowthReport {
    pub old_count: u64,
    pub new_count: u64,
}

impl GrowthReport {
    /// Blocks added by this growth
    pub fn added(&self) -> u64 {
        self.new_count - self.old_count
    }
}

/// Block count after adding `additional` blocks to `old_count`
pub fn target_block_count(old_count: u64, additional: u64) -> Result<u64> {
    let wanted = old_count.checked_add(additional).ok_or_else(|| {
        StoreError::InvalidGeometry(format!(
            "{} + {} blocks overflows the block count",
            old_count, additional
        ))
    })?;
    round_up_pow2(wanted)
}

/// Grow the arena by at least `additional` blocks
///
/// In-memory state is replaced only after every write succeeded. Refusals
/// (limit exceeded, overflow) happen before any I/O and leave the store
/// untouched; an I/O failure is reported as `OutOfSpace` carrying the cause.
pub(crate) fn grow(
    file: &mut StoreFile,
    superblock: &mut Superblock,
    bitmap: &mut BitmapAllocator,
    additional: u64,
    max_blocks: u64,
) -> Result<GrowthReport> {
    let old_count = superblock.block_count;
    let refuse = |source| StoreError::OutOfSpace {
        needed: additional,
        free: bitmap.free_blocks(),
        source,
    };

    let new_count = match target_block_count(old_count, additional) {
        Ok(count) if count <= max_blocks => count,
        Ok(count) => {
            tracing::warn!(
                "Refusing growth to {} blocks (limit {})",
                count,
                max_blocks
            );
            return Err(refuse(None));
        }
        Err(_) => return Err(refuse(None)),
    };

    if new_count == old_count {
        return Ok(GrowthReport {
            old_count,
            new_count,
        });
    }

    let mut next = *superblock;
    next.resize(new_count).map_err(|_| refuse(None))?;

    let mut extended = bitmap.clone();
    extended.extend_capacity(new_count)?;

    let persisted = file
        .write_blank_blocks(&next, old_count, new_count - old_count)
        .and_then(|_| file.write_bitmap(&next, &extended.to_bytes()))
        .and_then(|_| file.write_superblock(&next));

    if let Err(e) = persisted {
        tracing::error!("Growth {} -> {} blocks failed: {}", old_count, new_count, e);
        let source = match e {
            StoreError::Io(io) => io,
            other => std::io::Error::new(std::io::ErrorKind::Other, other.to_string()),
        };
        return Err(refuse(Some(source)));
    }

    *superblock = next;
    *bitmap = extended;

    tracing::info!("Growing store: {} -> {} blocks", old_count, new_count);

    Ok(GrowthReport {
        old_count,
        new_count,
    })
}
