//! Handles: descriptors of byte ranges inside the backing file
//!
//! A handle is a plain value. Constructing one validates it but never
//! registers it anywhere; the allocator decides when a handle enters the
//! block directory.

use crate::error::{HeapError, Result};
use serde::{Deserialize, Serialize};

/// A byte range `[offset, offset + size)` in the backing file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawHandle")]
pub struct Handle {
    offset: i64,
    size: i64,
    id: i64,
    freed: bool,
}

/// Unchecked wire form, only ever turned into a [`Handle`] through `Handle::new`
#[derive(Deserialize)]
struct RawHandle {
    offset: i64,
    size: i64,
    id: i64,
    #[serde(default)]
    freed: bool,
}

impl TryFrom<RawHandle> for Handle {
    type Error = HeapError;

    fn try_from(raw: RawHandle) -> Result<Self> {
        Ok(Handle::new(raw.offset, raw.size, raw.id)?.with_freed(raw.freed))
    }
}

impl Handle {
    /// Create a validated handle
    ///
    /// # Errors
    ///
    /// - `InvalidPointer` if `offset` is negative or `offset + size` overflows
    /// - `NullPointer` if `size` is less than 1
    pub fn new(offset: i64, size: i64, id: i64) -> Result<Self> {
        if offset < 0 {
            return Err(HeapError::InvalidPointer { offset });
        }

        if size < 1 {
            return Err(HeapError::NullPointer { size });
        }

        if offset.checked_add(size).is_none() {
            return Err(HeapError::InvalidPointer { offset });
        }

        Ok(Handle {
            offset,
            size,
            id,
            freed: false,
        })
    }

    /// Start of the range
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Length of the range in bytes
    pub fn size(&self) -> i64 {
        self.size
    }

    /// One past the last byte of the range
    pub fn end(&self) -> i64 {
        self.offset + self.size
    }

    /// Caller-chosen correlation token
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Whether this copy was taken from a freed directory entry
    pub fn is_freed(&self) -> bool {
        self.freed
    }

    /// Check if two ranges share at least one byte
    pub fn overlaps(&self, other: &Handle) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }

    /// Same range, regardless of id and freed flag
    pub fn same_range(&self, other: &Handle) -> bool {
        self.offset == other.offset && self.size == other.size
    }

    pub(crate) fn with_freed(mut self, freed: bool) -> Self {
        self.freed = freed;
        self
    }

    pub(crate) fn set_freed(&mut self, freed: bool) {
        self.freed = freed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_creation() {
        let handle = Handle::new(10, 20, 7).unwrap();
        assert_eq!(handle.offset(), 10);
        assert_eq!(handle.size(), 20);
        assert_eq!(handle.end(), 30);
        assert_eq!(handle.id(), 7);
        assert!(!handle.is_freed());
    }

    #[test]
    fn test_negative_offset_rejected() {
        assert!(matches!(
            Handle::new(-1, 4, 0),
            Err(HeapError::InvalidPointer { offset: -1 })
        ));
    }

    #[test]
    fn test_zero_and_negative_size_rejected() {
        assert!(matches!(
            Handle::new(0, 0, 0),
            Err(HeapError::NullPointer { size: 0 })
        ));
        assert!(matches!(
            Handle::new(0, -8, 0),
            Err(HeapError::NullPointer { size: -8 })
        ));
    }

    #[test]
    fn test_end_overflow_rejected() {
        assert!(matches!(
            Handle::new(i64::MAX, 2, 0),
            Err(HeapError::InvalidPointer { .. })
        ));
    }

    #[test]
    fn test_deserialize_validates() {
        let handle: Handle =
            serde_json::from_str(r#"{"offset":8,"size":4,"id":3,"freed":true}"#).unwrap();
        assert_eq!((handle.offset(), handle.size(), handle.id()), (8, 4, 3));
        assert!(handle.is_freed());

        let err = serde_json::from_str::<Handle>(r#"{"offset":-5,"size":0,"id":0,"freed":false}"#)
            .unwrap_err();
        assert!(err.to_string().contains("-5"));

        assert!(serde_json::from_str::<Handle>(r#"{"offset":0,"size":0,"id":0}"#).is_err());
        assert!(
            serde_json::from_str::<Handle>(&format!(r#"{{"offset":{},"size":2,"id":0}}"#, i64::MAX))
                .is_err()
        );
    }

    #[test]
    fn test_serialize_roundtrip() {
        let handle = Handle::new(16, 8, 42).unwrap().with_freed(true);
        let json = serde_json::to_string(&handle).unwrap();
        assert_eq!(serde_json::from_str::<Handle>(&json).unwrap(), handle);
    }

    #[test]
    fn test_handle_overlap() {
        let a = Handle::new(0, 10, 0).unwrap();
        let b = Handle::new(10, 10, 0).unwrap();
        let c = Handle::new(5, 10, 0).unwrap();

        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(b.overlaps(&c));
    }

    #[test]
    fn test_same_range_ignores_id_and_flag() {
        let a = Handle::new(4, 4, 1).unwrap();
        let b = Handle::new(4, 4, 2).unwrap().with_freed(true);
        assert!(a.same_range(&b));
        assert_ne!(a, b);
    }
}
