//! Sidecar header: persisted block directory
//!
//! # Layout
//!
//! ```text
//! i32 count
//! count x {
//!     i64 offset
//!     i64 size
//!     u8  freed (0 or 1)
//!     i64 id
//! }
//! ```
//!
//! All integers are little-endian. The whole file is rewritten on every save
//! and read in full on every load. Decoding is strict: a short file, a
//! negative count, a freed byte other than 0/1, an invalid handle or trailing
//! bytes all fail instead of producing a partial directory.

use crate::directory::BlockDirectory;
use crate::error::{HeapError, Result};
use crate::handle::Handle;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Size of the leading entry count
pub const COUNT_SIZE: usize = 4;

/// Size of one persisted entry
pub const RECORD_SIZE: usize = 8 + 8 + 1 + 8;

/// Reads and writes the sidecar header of one heap file
#[derive(Debug, Clone)]
pub struct HeaderStore {
    path: PathBuf,
}

impl HeaderStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        HeaderStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load the persisted directory, or `None` when no sidecar exists
    pub fn load(&self) -> Result<Option<BlockDirectory>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let directory = Self::decode(&bytes)?;
        tracing::debug!(
            "Loaded {} blocks from header {:?}",
            directory.len(),
            self.path
        );

        Ok(Some(directory))
    }

    /// Overwrite the sidecar with `directory`
    pub fn save(&self, directory: &BlockDirectory) -> Result<()> {
        let bytes = Self::encode(directory)?;

        let mut file = File::create(&self.path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;

        tracing::debug!("Saved {} blocks to header {:?}", directory.len(), self.path);
        Ok(())
    }

    /// Serialize a directory
    pub fn encode(directory: &BlockDirectory) -> Result<Vec<u8>> {
        let count = i32::try_from(directory.len()).map_err(|_| {
            HeapError::CorruptHeader(format!(
                "{} blocks exceed the header count range",
                directory.len()
            ))
        })?;

        let mut bytes = Vec::with_capacity(COUNT_SIZE + directory.len() * RECORD_SIZE);
        bytes.extend_from_slice(&count.to_le_bytes());

        for handle in directory {
            bytes.extend_from_slice(&handle.offset().to_le_bytes());
            bytes.extend_from_slice(&handle.size().to_le_bytes());
            bytes.push(handle.is_freed() as u8);
            bytes.extend_from_slice(&handle.id().to_le_bytes());
        }

        Ok(bytes)
    }

    /// Deserialize a directory
    pub fn decode(bytes: &[u8]) -> Result<BlockDirectory> {
        if bytes.len() < COUNT_SIZE {
            return Err(HeapError::HeaderTruncated {
                expected: COUNT_SIZE,
                actual: bytes.len(),
            });
        }

        let count = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if count < 0 {
            return Err(HeapError::CorruptHeader(format!(
                "negative block count {}",
                count
            )));
        }

        let count = count as usize;
        let expected = count
            .checked_mul(RECORD_SIZE)
            .and_then(|body| body.checked_add(COUNT_SIZE))
            .ok_or_else(|| HeapError::CorruptHeader(format!("block count {} too large", count)))?;

        if bytes.len() < expected {
            return Err(HeapError::HeaderTruncated {
                expected,
                actual: bytes.len(),
            });
        }

        if bytes.len() > expected {
            return Err(HeapError::CorruptHeader(format!(
                "{} trailing bytes after {} blocks",
                bytes.len() - expected,
                count
            )));
        }

        let mut handles = Vec::with_capacity(count);
        for record in bytes[COUNT_SIZE..].chunks_exact(RECORD_SIZE) {
            handles.push(Self::decode_record(record)?);
        }

        Ok(BlockDirectory::from_handles(handles))
    }

    fn decode_record(record: &[u8]) -> Result<Handle> {
        let read_i64 = |at: usize| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&record[at..at + 8]);
            i64::from_le_bytes(buf)
        };

        let offset = read_i64(0);
        let size = read_i64(8);
        let freed = match record[16] {
            0 => false,
            1 => true,
            other => {
                return Err(HeapError::CorruptHeader(format!(
                    "freed flag must be 0 or 1, got {}",
                    other
                )))
            }
        };
        let id = read_i64(17);

        let handle = Handle::new(offset, size, id).map_err(|e| {
            HeapError::CorruptHeader(format!("invalid block at offset {}: {}", offset, e))
        })?;

        Ok(handle.with_freed(freed))
    }
}
