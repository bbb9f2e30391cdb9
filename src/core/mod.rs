//! Allocation engine
//!
//! - [`handle`] - validated byte-range descriptors
//! - [`directory`] - allocation map and free list
//! - [`codec`] - fixed-width encodings of the supported primitive types
//! - [`io`] - backing file access
//! - [`header`] - sidecar persistence of the block directory
//! - [`heap`] - the allocator itself
//! - [`extensions`] - string and timestamp helpers
//! - [`validation`] - path conventions

pub mod codec;
pub mod directory;
pub mod error;
pub mod extensions;
pub mod handle;
pub mod header;
pub mod heap;
pub mod io;
pub mod validation;
