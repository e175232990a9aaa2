use crate::growth::DEFAULT_MAX_BLOCKS;
use crate::header::{MIN_BLOCK_COUNT, MIN_BLOCK_SIZE};

/// Settings for formatting and operating a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Requested payload bytes per block (rounded up at format time)
    pub block_size: u64,

    /// Requested initial block count (rounded up at format time)
    pub initial_blocks: u64,

    /// Grow the arena when a write needs more blocks than are free
    pub auto_grow: bool,

    /// Maximum blocks allowed (prevents runaway growth)
    pub max_blocks: u64,

    /// fsync the backing file at the end of every flush
    pub sync_on_flush: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            block_size: MIN_BLOCK_SIZE,
            initial_blocks: MIN_BLOCK_COUNT,
            auto_grow: true,
            max_blocks: DEFAULT_MAX_BLOCKS,
            sync_on_flush: true,
        }
    }
}
