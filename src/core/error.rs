use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid magic tag in superblock")]
    FormatMismatch,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Allocation exhausted: bitmap has no free block after admission")]
    AllocationExhausted,

    #[error("Out of space: {needed} blocks needed, {free} free")]
    OutOfSpace {
        needed: u64,
        free: u64,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Empty payload: writes must carry at least one byte")]
    EmptyPayload,

    #[error("Invalid block index: {index} (block count {block_count})")]
    InvalidBlockIndex { index: u64, block_count: u64 },

    #[error("Block already allocated: {0}")]
    BlockAlreadyAllocated(u64),

    #[error("Corrupt superblock: {0}")]
    CorruptSuperblock(String),

    #[error("Corrupt block record in slot {slot}: stored index {stored}")]
    CorruptBlock { slot: u64, stored: u64 },

    #[error("Chain starting at block {0} does not terminate")]
    CorruptChain(u64),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Store handle is unusable after a failed growth")]
    Unusable,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
