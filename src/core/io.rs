//! Disk I/O for the backing store file

use crate::block::BlockRecord;
use crate::error::Result;
use crate::header::{Superblock, HEADER_SIZE};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Blank records written per call when extending the arena
const BLANK_FILL_BATCH: u64 = 64;

/// Disk-backed store file
pub struct StoreFile {
    file: File,
    path: PathBuf,
}

impl StoreFile {
    /// Create (or truncate) a store file
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        Ok(StoreFile {
            file,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Open an existing store file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        Ok(StoreFile {
            file,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Open without write access, so every write fails
    #[cfg(test)]
    pub(crate) fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).open(&path)?;

        Ok(StoreFile {
            file,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Read and validate the superblock
    pub fn read_superblock(&mut self) -> Result<Superblock> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut buffer = vec![0u8; HEADER_SIZE as usize];
        self.file.read_exact(&mut buffer)?;
        Superblock::from_bytes(&buffer)
    }

    /// Overwrite the superblock in place
    pub fn write_superblock(&mut self, superblock: &Superblock) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&superblock.to_bytes())?;
        self.file.flush()?;
        Ok(())
    }

    /// Read the record in slot `index`
    pub fn read_block(&mut self, superblock: &Superblock, index: u64) -> Result<BlockRecord> {
        self.file
            .seek(SeekFrom::Start(superblock.record_offset(index)))?;

        let mut buffer = vec![0u8; superblock.record_size() as usize];
        self.file.read_exact(&mut buffer)?;

        BlockRecord::from_bytes(&buffer, index, superblock.block_size)
    }

    /// Write a record into its own slot
    pub fn write_block(&mut self, superblock: &Superblock, record: &BlockRecord) -> Result<()> {
        let bytes = record.to_bytes(superblock.block_size)?;
        self.file
            .seek(SeekFrom::Start(superblock.record_offset(record.index)))?;
        self.file.write_all(&bytes)?;
        Ok(())
    }

    /// Initialize `count` slots starting at slot `first` as blank records
    ///
    /// A blank record is terminal (linked to itself) with zeroed data, so every
    /// slot decodes cleanly before it is first written.
    pub fn write_blank_blocks(
        &mut self,
        superblock: &Superblock,
        first: u64,
        count: u64,
    ) -> Result<()> {
        let record_size = superblock.record_size() as usize;
        let mut buffer = vec![0u8; record_size * count.min(BLANK_FILL_BATCH) as usize];

        self.file
            .seek(SeekFrom::Start(superblock.record_offset(first)))?;

        let mut slot = first;
        let end = first + count;
        while slot < end {
            let batch = (end - slot).min(BLANK_FILL_BATCH);
            for (i, record) in buffer
                .chunks_exact_mut(record_size)
                .take(batch as usize)
                .enumerate()
            {
                let index = (slot + i as u64).to_le_bytes();
                record[0..8].copy_from_slice(&index);
                record[8..16].copy_from_slice(&index);
            }
            self.file.write_all(&buffer[..batch as usize * record_size])?;
            slot += batch;
        }

        self.file.flush()?;
        Ok(())
    }

    /// Read the raw bitmap region described by `superblock`
    pub fn read_bitmap(&mut self, superblock: &Superblock) -> Result<Vec<u8>> {
        let len = superblock.string_table_offset - superblock.bitmap_offset;
        self.file.seek(SeekFrom::Start(superblock.bitmap_offset))?;

        let mut buffer = vec![0u8; len as usize];
        self.file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    /// Write the encoded bitmap at `bitmap_offset`
    pub fn write_bitmap(&mut self, superblock: &Superblock, bitmap: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(superblock.bitmap_offset))?;
        self.file.write_all(bitmap)?;
        self.file.flush()?;
        Ok(())
    }

    /// Current length of the backing file
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Get file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sync all writes to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
