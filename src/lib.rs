//! # rawblock - Raw Block-Storage Engine
//!
//! `rawblock` turns a flat file into a self-describing block container:
//!
//! - **Superblock** at offset 0 with the block geometry and region offsets
//! - **Block arena** of fixed-size records, each linking to the next block of
//!   its chain
//! - **Bitmap free-list** (1 = free) scanned lowest-index-first
//! - **On-demand growth**: the arena doubles up to the next power of two when
//!   a write needs more blocks than are free
//!
//! ## Layout
//!
//! ```text
//! [0 .. 40)                               superblock
//! [40 .. bitmap_offset)                   block_count x (16-byte header + block_size)
//! [bitmap_offset .. string_table_offset)  bitmap words
//! [string_table_offset .. )               reserved
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rawblock::{Result, Store};
//!
//! # fn main() -> Result<()> {
//! // 4 KiB blocks, 8 blocks to start with
//! let mut store = Store::format("data.hmv", 4096, 8)?;
//!
//! // Returns the first block of the chain
//! let first = store.write(b"hello")?;
//! assert_eq!(store.chain(first)?.len(), 1);
//!
//! store.close()?;
//! # Ok(())
//! # }
//! ```

pub mod core;

#[allow(unused_imports)]
pub(crate) use crate::core::{
    allocator, block, chain, config, error, flush, growth, header, inspect, io, shared, store,
};

pub use crate::core::{
    allocator::{bitmap::BitmapAllocator, BlockAllocator},
    block::{BlockRecord, ChainLink},
    config::StoreConfig,
    error::{Result, StoreError},
    flush::FlushStats,
    growth::{GrowthReport, DEFAULT_MAX_BLOCKS},
    header::{Superblock, HEADER_SIZE, MAGIC, MIN_BLOCK_COUNT, MIN_BLOCK_SIZE, RECORD_HEADER_SIZE},
    inspect::StoreReport,
    shared::SharedStore,
    store::{Store, StoreStats},
};

use std::path::PathBuf;
use tracing::debug;

/// Builder for customizing store creation
///
/// # Examples
///
/// ```rust,no_run
/// use rawblock::StoreBuilder;
///
/// # fn main() -> rawblock::Result<()> {
/// let store = StoreBuilder::new()
///     .path("/data/blocks.hmv")
///     .block_size(8192)
///     .initial_blocks(64)
///     .max_blocks(1 << 20)
///     .format()?;
/// # Ok(())
/// # }
/// ```
pub struct StoreBuilder {
    path: Option<PathBuf>,
    config: StoreConfig,
}

impl StoreBuilder {
    /// Create a new StoreBuilder with default settings
    pub fn new() -> Self {
        StoreBuilder {
            path: None,
            config: StoreConfig::default(),
        }
    }

    /// Set the backing file path
    pub fn path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the requested block size (rounded up to a power of two >= 4096)
    pub fn block_size(mut self, block_size: u64) -> Self {
        self.config.block_size = block_size;
        self
    }

    /// Set the requested initial block count (rounded up to a power of two >= 8)
    pub fn initial_blocks(mut self, blocks: u64) -> Self {
        self.config.initial_blocks = blocks;
        self
    }

    /// Disable automatic growth; writes that do not fit fail with `OutOfSpace`
    pub fn without_auto_grow(mut self) -> Self {
        self.config.auto_grow = false;
        self
    }

    /// Set the maximum block count growth may reach
    pub fn max_blocks(mut self, max_blocks: u64) -> Self {
        self.config.max_blocks = max_blocks;
        self
    }

    /// Skip fsync at the end of each flush
    pub fn without_sync(mut self) -> Self {
        self.config.sync_on_flush = false;
        self
    }

    /// Format a new store at the configured path
    pub fn format(self) -> Result<Store> {
        let path = self.require_path()?;
        debug!("Formatting store at {:?} with {:?}", path, self.config);
        Store::format_with_config(path, self.config)
    }

    /// Open an existing store at the configured path
    pub fn open(self) -> Result<Store> {
        let path = self.require_path()?;
        debug!("Opening store at {:?} with {:?}", path, self.config);
        Store::open_with_config(path, self.config)
    }

    fn require_path(&self) -> Result<PathBuf> {
        self.path.clone().ok_or_else(|| {
            StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "path must be set",
            ))
        })
    }
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Current version of rawblock
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builder_formats_with_config() {
        let dir = TempDir::new().unwrap();
        let store = StoreBuilder::new()
            .path(dir.path().join("b.hmv"))
            .block_size(5000)
            .initial_blocks(20)
            .without_sync()
            .format()
            .unwrap();

        assert_eq!(store.block_size(), 8192);
        assert_eq!(store.block_count(), 32);
        assert!(!store.config().sync_on_flush);
    }

    #[test]
    fn test_builder_requires_path() {
        let result = StoreBuilder::new().format();
        assert!(matches!(result, Err(StoreError::Io(_))));
    }

    #[test]
    fn test_builder_open_applies_runtime_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("b.hmv");
        Store::format(&path, 4096, 8).unwrap().close().unwrap();

        let mut store = StoreBuilder::new()
            .path(&path)
            .without_auto_grow()
            .open()
            .unwrap();

        let result = store.write(&vec![0u8; 9 * 4096]);
        assert!(matches!(result, Err(StoreError::OutOfSpace { .. })));
    }
}
