//! Disk I/O for the backing file

use crate::error::{HeapError, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Disk-backed heap storage
///
/// Keeps the current length cached; the length only changes through
/// [`append_zeroed`](BackingFile::append_zeroed) and
/// [`truncate`](BackingFile::truncate).
pub struct BackingFile {
    file: File,
    path: PathBuf,
    len: u64,
}

impl BackingFile {
    /// Open a backing file for read/write, creating it if `create` is set
    pub fn open<P: AsRef<Path>>(path: P, create: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .open(&path)?;

        let len = file.metadata()?.len();

        Ok(BackingFile {
            file,
            path: path.as_ref().to_path_buf(),
            len,
        })
    }

    /// Current length in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fill `buf` from `offset`
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    /// Write `data` at `offset`
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.len = self.len.max(offset + data.len() as u64);
        Ok(())
    }

    /// Append `size` zero bytes, returning the offset of the new region
    ///
    /// On failure the file is cut back to its previous length, so no
    /// untracked bytes are left behind.
    pub fn append_zeroed(&mut self, size: u64) -> Result<u64> {
        let offset = self.len;
        let new_len = offset.checked_add(size).ok_or(HeapError::SizeOverflow)?;

        if let Err(e) = self.file.set_len(new_len) {
            if let Err(rollback) = self.file.set_len(offset) {
                tracing::warn!("Failed to roll back {:?} to {} bytes: {}", self.path, offset, rollback);
            }
            return Err(e.into());
        }

        self.len = new_len;
        Ok(offset)
    }

    /// Cut the file down to `len` bytes
    pub fn truncate(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        self.len = len;
        Ok(())
    }

    /// Flush buffered writes
    pub fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }

    /// Sync all writes to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Get file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}
