//! # heapfile - A Heap in a File
//!
//! `heapfile-rs` carves persistent, typed byte ranges ("handles") out of a
//! single backing file:
//!
//! - **First-fit allocation** over freed blocks, with splitting of oversized blocks
//! - **Typed reads and writes** for a closed set of fixed-width primitives
//! - **Bounds-checked sub-handles** for indexing into arrays
//! - **Trailing reclamation**: shrink cuts freed blocks off the end of the file
//! - **Restart recovery**: block layout persists in a `.header` sidecar and
//!   handles are found again by the id they were allocated with
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use heapfile_rs::{HeapFile, Result};
//!
//! # fn main() -> Result<()> {
//! let mut heap = HeapFile::open("store.hpf")?;
//!
//! let counter = heap.allocate_typed::<i32>(1)?;
//! heap.write(&counter, 100i32)?;
//! assert_eq!(heap.read::<i32>(&counter)?, 100);
//!
//! heap.close()?;
//!
//! // Later, in another process
//! let mut heap = HeapFile::open("store.hpf")?;
//! let counter = heap.find_by_id(1).expect("allocated above");
//! assert_eq!(heap.read::<i32>(&counter)?, 100);
//! heap.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Strings and timestamps
//!
//! ```rust,no_run
//! use heapfile_rs::{HeapFile, HeapFileExt, Result};
//!
//! # fn main() -> Result<()> {
//! let mut heap = HeapFile::open("store.hpf")?;
//!
//! let name = heap.allocate_string("Hello", 2)?;
//! heap.write_string(&name, "Hello")?;
//! assert_eq!(heap.read_string(&name)?, "Hello");
//!
//! heap.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency
//!
//! A [`HeapFile`] is single-threaded and exclusively owns its file. Sharing
//! one backing file between processes is not supported.

pub mod core;

pub use crate::core::{
    codec, directory, error, extensions, handle, header, heap, io, validation,
};

pub use crate::core::{
    codec::{Primitive, PrimitiveKind, Value},
    directory::{BlockDirectory, DirectoryStats},
    error::{HeapError, Result},
    extensions::HeapFileExt,
    handle::Handle,
    header::HeaderStore,
    heap::{HeapFile, HeapOptions},
    validation::{header_path_for, FILE_EXTENSION, HEADER_SUFFIX},
};

use std::path::{Path, PathBuf};
use tracing::debug;

/// Builder for customizing how a heap file is opened
///
/// # Examples
///
/// ```rust,no_run
/// use heapfile_rs::HeapFileBuilder;
///
/// # fn main() -> heapfile_rs::Result<()> {
/// let heap = HeapFileBuilder::new("data/store.hpf")
///     .header_path("data/meta/store.header")
///     .create(false)
///     .sync_on_flush(true)
///     .open()?;
/// heap.close()?;
/// # Ok(())
/// # }
/// ```
pub struct HeapFileBuilder {
    options: HeapOptions,
}

impl HeapFileBuilder {
    /// Create a builder with default settings
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        HeapFileBuilder {
            options: HeapOptions::new(path),
        }
    }

    /// Use a custom sidecar header location
    pub fn header_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.header_path = Some(path.into());
        self
    }

    /// Create the backing file if it does not exist (default: true)
    pub fn create(mut self, create: bool) -> Self {
        self.options.create = create;
        self
    }

    /// Sync file contents to disk on every flush (default: false)
    pub fn sync_on_flush(mut self, sync: bool) -> Self {
        self.options.sync_on_flush = sync;
        self
    }

    /// Options collected so far
    pub fn options(&self) -> &HeapOptions {
        &self.options
    }

    /// Open the heap file
    pub fn open(self) -> Result<HeapFile> {
        debug!("Opening heap with {:?}", self.options);
        HeapFile::open_with(self.options)
    }
}
