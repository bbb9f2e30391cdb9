//! Main heap file API
//!
//! [`HeapFile`] owns the backing file and the block directory between
//! [`open`](HeapFile::open) and [`close`](HeapFile::close). Every operation
//! takes `&mut self`, so a heap can only be used from one place at a time,
//! and `close` consumes it. Dropping a heap without closing it persists the
//! directory as a best-effort backstop.

use crate::codec::{Primitive, PrimitiveKind, Value, MAX_WIDTH};
use crate::directory::BlockDirectory;
use crate::error::{HeapError, Result};
use crate::handle::Handle;
use crate::header::HeaderStore;
use crate::io::BackingFile;
use crate::validation;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Options for opening a heap file
#[derive(Debug, Clone)]
pub struct HeapOptions {
    /// Backing file path
    pub path: PathBuf,

    /// Sidecar header path (default: file name + `.header`)
    pub header_path: Option<PathBuf>,

    /// Create the backing file when missing (default: true)
    pub create: bool,

    /// Call `sync_all` on every flush (default: false)
    pub sync_on_flush: bool,
}

impl HeapOptions {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        HeapOptions {
            path: path.as_ref().to_path_buf(),
            header_path: None,
            create: true,
            sync_on_flush: false,
        }
    }
}

/// A heap of typed byte ranges in a single file
pub struct HeapFile {
    /// Backing storage
    file: BackingFile,

    /// Allocated and freed blocks
    directory: BlockDirectory,

    /// Sidecar persistence
    header: HeaderStore,

    sync_on_flush: bool,

    /// Set once the directory has been handed to the header store for good
    closed: bool,
}

impl HeapFile {
    /// Open or create a heap file with default options
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(HeapOptions::new(path))
    }

    /// Open a heap file
    ///
    /// Loads the sidecar header if present. Every recovered block must lie
    /// inside the backing file and no two may overlap.
    pub fn open_with(options: HeapOptions) -> Result<Self> {
        let header_path = options
            .header_path
            .unwrap_or_else(|| validation::header_path_for(&options.path));
        let header = HeaderStore::new(header_path);

        let file = BackingFile::open(&options.path, options.create)?;

        let directory = match header.load()? {
            Some(directory) => {
                directory.validate(file.len() as i64)?;
                directory
            }
            None => BlockDirectory::new(),
        };

        tracing::info!(
            "Opened heap {:?} ({} bytes, {} blocks recovered)",
            options.path,
            file.len(),
            directory.len()
        );

        Ok(HeapFile {
            file,
            directory,
            header,
            sync_on_flush: options.sync_on_flush,
            closed: false,
        })
    }

    /// Current length of the backing file in bytes
    pub fn len(&self) -> i64 {
        self.file.len() as i64
    }

    pub fn is_empty(&self) -> bool {
        self.file.is_empty()
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn header_path(&self) -> &Path {
        self.header.path()
    }

    pub fn directory(&self) -> &BlockDirectory {
        &self.directory
    }

    /// Iterate over every tracked block, live or freed
    pub fn handles(&self) -> impl Iterator<Item = &Handle> {
        self.directory.iter()
    }

    /// Recover a live handle by the id it was allocated with
    pub fn find_by_id(&self, id: i64) -> Option<Handle> {
        self.directory.find_by_id(id)
    }

    /// Live handles grouped by id
    pub fn id_index(&self) -> BTreeMap<i64, Vec<Handle>> {
        self.directory.id_index()
    }

    /// Whether `handle` still names a live block
    pub fn is_live(&self, handle: &Handle) -> bool {
        self.directory.is_live(handle)
    }

    /// Allocate `size` bytes
    ///
    /// Reuses the first freed block that is large enough, splitting off any
    /// excess as a new freed block. Otherwise grows the file by `size` zero
    /// bytes.
    pub fn allocate(&mut self, size: i64, id: i64) -> Result<Handle> {
        if size < 1 {
            return Err(HeapError::NullPointer { size });
        }

        if let Some(handle) = self.directory.take_first_fit(size, id)? {
            tracing::debug!(
                offset = handle.offset(),
                size,
                id,
                "Reused freed block"
            );
            return Ok(handle);
        }

        // Validate before touching the file
        Handle::new(self.len(), size, id)?;

        let offset = self.file.append_zeroed(size as u64)? as i64;
        let handle = Handle::new(offset, size, id)?;
        self.directory.push(handle);

        tracing::debug!(offset, size, id, "Grew heap for new block");
        Ok(handle)
    }

    /// Allocate room for one `T`
    pub fn allocate_typed<T: Primitive>(&mut self, id: i64) -> Result<Handle> {
        self.allocate_kind(T::KIND, 1, id)
    }

    /// Allocate room for `count` consecutive `T`s
    pub fn allocate_array<T: Primitive>(&mut self, count: usize, id: i64) -> Result<Handle> {
        self.allocate_kind(T::KIND, count, id)
    }

    /// Allocate room for `count` values of a runtime-selected kind
    pub fn allocate_kind(&mut self, kind: PrimitiveKind, count: usize, id: i64) -> Result<Handle> {
        self.allocate(array_size(kind.width(), count)?, id)
    }

    /// Read a `T` from the start of `handle`
    pub fn read<T: Primitive>(&mut self, handle: &Handle) -> Result<T> {
        let mut buf = [0u8; MAX_WIDTH];
        let bytes = &mut buf[..T::WIDTH];
        self.read_raw(handle, bytes)?;
        T::decode(bytes)
    }

    /// Write `value` at the start of `handle`
    pub fn write<T: Primitive>(&mut self, handle: &Handle, value: T) -> Result<()> {
        let mut buf = [0u8; MAX_WIDTH];
        let bytes = &mut buf[..T::WIDTH];
        value.encode_into(bytes);
        self.write_raw(handle, bytes)
    }

    /// Read a value of a runtime-selected kind
    pub fn read_value(&mut self, kind: PrimitiveKind, handle: &Handle) -> Result<Value> {
        let mut buf = [0u8; MAX_WIDTH];
        let bytes = &mut buf[..kind.width()];
        self.read_raw(handle, bytes)?;
        kind.decode(bytes)
    }

    /// Write a dynamically typed value
    pub fn write_value(&mut self, handle: &Handle, value: Value) -> Result<()> {
        let mut buf = [0u8; MAX_WIDTH];
        let bytes = &mut buf[..value.kind().width()];
        value.encode_into(bytes);
        self.write_raw(handle, bytes)
    }

    /// Read `count` consecutive `T`s, element `i` at `handle + i * width`
    pub fn read_array<T: Primitive>(&mut self, handle: &Handle, count: usize) -> Result<Vec<T>> {
        let mut values = Vec::with_capacity(count);
        for i in 0..count {
            let element = self.pointer_offset(handle, element_delta(T::WIDTH, i)?)?;
            values.push(self.read::<T>(&element)?);
        }
        Ok(values)
    }

    /// Write `values` consecutively, in ascending index order
    pub fn write_array<T: Primitive>(&mut self, handle: &Handle, values: &[T]) -> Result<()> {
        for (i, value) in values.iter().enumerate() {
            let element = self.pointer_offset(handle, element_delta(T::WIDTH, i)?)?;
            self.write(&element, *value)?;
        }
        Ok(())
    }

    /// Read `count` values of a runtime-selected kind
    pub fn read_values(
        &mut self,
        kind: PrimitiveKind,
        handle: &Handle,
        count: usize,
    ) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(count);
        for i in 0..count {
            let element = self.pointer_offset(handle, element_delta(kind.width(), i)?)?;
            values.push(self.read_value(kind, &element)?);
        }
        Ok(values)
    }

    /// Write dynamically typed values consecutively
    pub fn write_values(&mut self, handle: &Handle, values: &[Value]) -> Result<()> {
        let mut delta = 0i64;
        for value in values {
            let element = self.pointer_offset(handle, delta)?;
            self.write_value(&element, *value)?;
            delta += value.kind().width() as i64;
        }
        Ok(())
    }

    /// Derive the sub-window `[offset + delta, offset + size)` of `handle`
    ///
    /// Fails with `OutOfBounds` if the derived offset is negative or past the
    /// end of the file, if the derived size is below 1, or if the derived
    /// window runs past the end of the file. Nothing is registered in the
    /// directory.
    pub fn pointer_offset(&self, handle: &Handle, delta: i64) -> Result<Handle> {
        let file_len = self.len();
        let offset = handle.offset().checked_add(delta);
        let size = handle.size().checked_sub(delta);

        let out_of_bounds = || HeapError::OutOfBounds {
            offset: offset.unwrap_or(i64::MAX),
            size: size.unwrap_or(0),
            file_len,
        };

        let (offset, size) = match (offset, size) {
            (Some(offset), Some(size)) => (offset, size),
            _ => return Err(out_of_bounds()),
        };

        if offset < 0 || offset > file_len || size < 1 || size > file_len - offset {
            return Err(out_of_bounds());
        }

        Handle::new(offset, size, handle.id())
    }

    /// Mark the directory entry for `handle` as freed
    ///
    /// The bytes stay in place. They are reused by a later allocation that
    /// fits, or reclaimed by [`shrink`](HeapFile::shrink) once they trail the
    /// file.
    pub fn free(&mut self, handle: &Handle) -> Result<()> {
        self.directory.mark_freed(handle)?;
        tracing::debug!(
            offset = handle.offset(),
            size = handle.size(),
            "Freed block"
        );
        Ok(())
    }

    /// Truncate trailing freed blocks off the end of the file
    ///
    /// Repeats until the freed block with the greatest offset no longer ends
    /// at the end of the file. Interior freed blocks are left alone. Returns
    /// the number of bytes reclaimed.
    pub fn shrink(&mut self) -> Result<i64> {
        let before = self.len();

        while let Some(index) = self.directory.trailing_freed(self.len()) {
            let offset = match self.directory.get(index) {
                Some(block) => block.offset(),
                None => break,
            };
            self.file.truncate(offset as u64)?;
            self.directory.remove(index);
        }

        let reclaimed = before - self.len();
        if reclaimed > 0 {
            tracing::info!("Shrunk heap: {} -> {} bytes", before, self.len());
        }

        Ok(reclaimed)
    }

    /// Flush buffered writes to the backing file
    pub fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        if self.sync_on_flush {
            self.file.sync()?;
        }
        Ok(())
    }

    /// Persist the block directory without closing
    pub fn checkpoint(&mut self) -> Result<()> {
        self.flush()?;
        self.header.save(&self.directory)
    }

    /// Persist the block directory, flush and release the file
    ///
    /// If persisting fails the heap is dropped unclosed, so the drop path
    /// tries to save the header once more.
    pub fn close(mut self) -> Result<()> {
        self.persist()?;
        tracing::debug!("Closed heap {:?}", self.file.path());
        Ok(())
    }

    fn persist(&mut self) -> Result<()> {
        self.header.save(&self.directory)?;
        self.file.flush()?;
        self.file.sync()?;
        self.closed = true;
        Ok(())
    }

    fn check_window(&self, handle: &Handle, width: usize) -> Result<()> {
        let width = width as i64;
        if width > handle.size() {
            return Err(HeapError::OversizedValue {
                size: width,
                capacity: handle.size(),
            });
        }

        if handle.end() > self.len() {
            return Err(HeapError::OutOfBounds {
                offset: handle.offset(),
                size: handle.size(),
                file_len: self.len(),
            });
        }

        Ok(())
    }

    fn read_raw(&mut self, handle: &Handle, buf: &mut [u8]) -> Result<()> {
        self.check_window(handle, buf.len())?;
        self.file.read_at(handle.offset() as u64, buf)
    }

    fn write_raw(&mut self, handle: &Handle, bytes: &[u8]) -> Result<()> {
        self.check_window(handle, bytes.len())?;
        self.file.write_at(handle.offset() as u64, bytes)
    }
}

impl Drop for HeapFile {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        tracing::warn!(
            "Heap {:?} dropped without close, persisting block directory",
            self.file.path()
        );

        if let Err(e) = self
            .file
            .flush()
            .and_then(|_| self.header.save(&self.directory))
        {
            tracing::warn!("Failed to persist heap header on drop: {}", e);
        }
    }
}

fn array_size(width: usize, count: usize) -> Result<i64> {
    width
        .checked_mul(count)
        .and_then(|size| i64::try_from(size).ok())
        .ok_or(HeapError::SizeOverflow)
}

fn element_delta(width: usize, index: usize) -> Result<i64> {
    array_size(width, index)
}
