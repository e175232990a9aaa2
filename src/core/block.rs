use crate::error::{Result, StoreError};
use crate::header::RECORD_HEADER_SIZE;

/// Link from a block record to the rest of its chain
///
/// On disk the terminal record stores its own index in `next`; in memory the
/// two cases are kept apart so a forward link can never be mistaken for the
/// end of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainLink {
    /// Last record of the chain
    Terminal,
    /// Next record of the chain
    Linked(u64),
}

impl ChainLink {
    /// Decode the raw `next` field of the record in slot `index`
    pub fn from_raw(index: u64, next: u64) -> Self {
        if next == index {
            ChainLink::Terminal
        } else {
            ChainLink::Linked(next)
        }
    }

    /// Encode for the record in slot `index`
    pub fn to_raw(self, index: u64) -> u64 {
        match self {
            ChainLink::Terminal => index,
            ChainLink::Linked(next) => next,
        }
    }
}

/// A single block record in the arena
///
/// Structure on disk: `[next: u64][index: u64][data: block_size bytes]`.
/// `data` holds only the bytes that were written; encoding pads it with zeros.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub index: u64,
    pub link: ChainLink,
    pub data: Vec<u8>,
}

impl BlockRecord {
    pub fn new(index: u64, link: ChainLink, data: Vec<u8>) -> Self {
        BlockRecord { index, link, data }
    }

    pub fn is_terminal(&self) -> bool {
        self.link == ChainLink::Terminal
    }

    /// Encode to exactly `RECORD_HEADER_SIZE + block_size` bytes
    pub fn to_bytes(&self, block_size: u64) -> Result<Vec<u8>> {
        if self.data.len() as u64 > block_size {
            return Err(StoreError::InvalidGeometry(format!(
                "Block data too large: {} bytes (max: {})",
                self.data.len(),
                block_size
            )));
        }

        let mut bytes = Vec::with_capacity((RECORD_HEADER_SIZE + block_size) as usize);
        bytes.extend_from_slice(&self.link.to_raw(self.index).to_le_bytes());
        bytes.extend_from_slice(&self.index.to_le_bytes());
        bytes.extend_from_slice(&self.data);
        bytes.resize((RECORD_HEADER_SIZE + block_size) as usize, 0);

        Ok(bytes)
    }

    /// Decode the record stored in slot `slot`
    ///
    /// The stored index must equal the slot it was read from. `data` comes back
    /// at its full `block_size` length since the valid length is not stored.
    pub fn from_bytes(bytes: &[u8], slot: u64, block_size: u64) -> Result<Self> {
        let expected = (RECORD_HEADER_SIZE + block_size) as usize;
        if bytes.len() < expected {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Insufficient bytes for block record",
            )));
        }

        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes[0..8]);
        let next = u64::from_le_bytes(word);
        word.copy_from_slice(&bytes[8..16]);
        let index = u64::from_le_bytes(word);

        if index != slot {
            return Err(StoreError::CorruptBlock {
                slot,
                stored: index,
            });
        }

        Ok(BlockRecord {
            index,
            link: ChainLink::from_raw(index, next),
            data: bytes[RECORD_HEADER_SIZE as usize..expected].to_vec(),
        })
    }
}
