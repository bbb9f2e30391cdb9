//! Block directory: allocation map and free list in one
//!
//! Every handle produced during a session lives here, live or freed, in
//! insertion order. Searching is first-fit over that order, so allocation is
//! O(entries); that linear scan is the scalability ceiling of the design.
//! Freed neighbours are never coalesced.

use crate::error::{HeapError, Result};
use crate::handle::Handle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Summary of the directory contents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryStats {
    /// Total tracked entries
    pub blocks: usize,
    /// Entries currently allocated
    pub live: usize,
    /// Entries freed but still tracked
    pub freed: usize,
    /// Bytes covered by live entries
    pub live_bytes: i64,
    /// Bytes covered by freed entries
    pub freed_bytes: i64,
}

/// Insertion-ordered set of handles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlockDirectory {
    entries: Vec<Handle>,
}

impl BlockDirectory {
    pub fn new() -> Self {
        BlockDirectory {
            entries: Vec::new(),
        }
    }

    /// Rebuild a directory from persisted entries, keeping their order
    pub fn from_handles(entries: Vec<Handle>) -> Self {
        BlockDirectory { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Handle> {
        self.entries.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Handle> {
        self.entries.get(index)
    }

    pub(crate) fn push(&mut self, handle: Handle) {
        self.entries.push(handle);
    }

    pub(crate) fn remove(&mut self, index: usize) -> Handle {
        self.entries.remove(index)
    }

    /// Index of the first freed entry of at least `size` bytes
    pub fn first_fit(&self, size: i64) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.is_freed() && entry.size() >= size)
    }

    /// Reuse a freed entry for an allocation of `size` bytes
    ///
    /// The chosen entry is removed. A larger entry is split: the tail
    /// `[offset + size, end)` goes back as a new freed entry, then the
    /// allocated head is appended. Returns `None` when nothing fits.
    pub fn take_first_fit(&mut self, size: i64, id: i64) -> Result<Option<Handle>> {
        let index = match self.first_fit(size) {
            Some(index) => index,
            None => return Ok(None),
        };

        let block = self.entries[index];
        let handle = Handle::new(block.offset(), size, id)?;
        let remainder = if block.size() > size {
            Some(Handle::new(block.offset() + size, block.size() - size, 0)?.with_freed(true))
        } else {
            None
        };

        self.entries.remove(index);
        self.entries.extend(remainder);
        self.entries.push(handle);

        Ok(Some(handle))
    }

    /// Flip the live entry covering exactly `handle`'s range to freed
    pub fn mark_freed(&mut self, handle: &Handle) -> Result<()> {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| !entry.is_freed() && entry.same_range(handle))
        {
            entry.set_freed(true);
            return Ok(());
        }

        if self.entries.iter().any(|entry| entry.same_range(handle)) {
            return Err(HeapError::DoubleFree {
                offset: handle.offset(),
                size: handle.size(),
            });
        }

        Err(HeapError::UnknownHandle {
            offset: handle.offset(),
            size: handle.size(),
        })
    }

    /// Whether a live entry covers exactly `handle`'s range
    pub fn is_live(&self, handle: &Handle) -> bool {
        self.entries
            .iter()
            .any(|entry| !entry.is_freed() && entry.same_range(handle))
    }

    /// Index of the freed entry with the greatest offset, if it ends at `file_len`
    pub fn trailing_freed(&self, file_len: i64) -> Option<usize> {
        let (index, last) = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_freed())
            .max_by_key(|(_, entry)| entry.offset())?;

        if last.end() == file_len {
            Some(index)
        } else {
            None
        }
    }

    /// First live handle carrying `id`, in directory order
    pub fn find_by_id(&self, id: i64) -> Option<Handle> {
        self.entries
            .iter()
            .find(|entry| !entry.is_freed() && entry.id() == id)
            .copied()
    }

    /// Live handles grouped by id
    pub fn id_index(&self) -> BTreeMap<i64, Vec<Handle>> {
        let mut index: BTreeMap<i64, Vec<Handle>> = BTreeMap::new();
        for entry in self.entries.iter().filter(|entry| !entry.is_freed()) {
            index.entry(entry.id()).or_default().push(*entry);
        }
        index
    }

    pub fn stats(&self) -> DirectoryStats {
        let mut stats = DirectoryStats {
            blocks: self.entries.len(),
            ..DirectoryStats::default()
        };

        for entry in &self.entries {
            if entry.is_freed() {
                stats.freed += 1;
                stats.freed_bytes += entry.size();
            } else {
                stats.live += 1;
                stats.live_bytes += entry.size();
            }
        }

        stats
    }

    /// Check that every entry lies inside the file and no two entries overlap
    pub fn validate(&self, file_len: i64) -> Result<()> {
        for entry in &self.entries {
            if entry.end() > file_len {
                return Err(HeapError::CorruptHeader(format!(
                    "block [{}, {}) extends past end of file ({})",
                    entry.offset(),
                    entry.end(),
                    file_len
                )));
            }
        }

        let mut sorted: Vec<&Handle> = self.entries.iter().collect();
        sorted.sort_unstable_by_key(|entry| entry.offset());

        for pair in sorted.windows(2) {
            if pair[0].overlaps(pair[1]) {
                return Err(HeapError::CorruptHeader(format!(
                    "blocks at {} and {} overlap",
                    pair[0].offset(),
                    pair[1].offset()
                )));
            }
        }

        Ok(())
    }
}

impl<'a> IntoIterator for &'a BlockDirectory {
    type Item = &'a Handle;
    type IntoIter = std::slice::Iter<'a, Handle>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(offset: i64, size: i64, id: i64) -> Handle {
        Handle::new(offset, size, id).unwrap()
    }

    fn freed(offset: i64, size: i64) -> Handle {
        Handle::new(offset, size, 0).unwrap().with_freed(true)
    }

    #[test]
    fn test_empty_directory() {
        let dir = BlockDirectory::new();
        assert!(dir.is_empty());
        assert_eq!(dir.first_fit(1), None);
        assert_eq!(dir.trailing_freed(0), None);
        assert_eq!(dir.stats(), DirectoryStats::default());
    }

    #[test]
    fn test_first_fit_skips_live_and_small() {
        let dir = BlockDirectory::from_handles(vec![
            live(0, 16, 1),
            freed(16, 4),
            freed(20, 32),
            freed(52, 64),
        ]);

        assert_eq!(dir.first_fit(4), Some(1));
        assert_eq!(dir.first_fit(8), Some(2));
        assert_eq!(dir.first_fit(33), Some(3));
        assert_eq!(dir.first_fit(65), None);
    }

    #[test]
    fn test_exact_fit_reuse() {
        let mut dir = BlockDirectory::from_handles(vec![freed(0, 4)]);

        let handle = dir.take_first_fit(4, 9).unwrap().unwrap();
        assert_eq!((handle.offset(), handle.size(), handle.id()), (0, 4, 9));
        assert_eq!(dir.len(), 1);
        assert!(dir.is_live(&handle));
    }

    #[test]
    fn test_split_leaves_one_remainder() {
        let mut dir = BlockDirectory::from_handles(vec![live(0, 8, 1), freed(8, 32)]);

        let handle = dir.take_first_fit(12, 2).unwrap().unwrap();
        assert_eq!(handle.offset(), 8);
        assert_eq!(handle.size(), 12);

        let remainders: Vec<&Handle> = dir.iter().filter(|e| e.is_freed()).collect();
        assert_eq!(remainders.len(), 1);
        assert_eq!(remainders[0].offset(), 20);
        assert_eq!(remainders[0].size(), 20);
        assert_eq!(dir.len(), 3);
    }

    #[test]
    fn test_no_fit_returns_none() {
        let mut dir = BlockDirectory::from_handles(vec![freed(0, 2)]);
        assert!(dir.take_first_fit(3, 0).unwrap().is_none());
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn test_mark_freed_and_double_free() {
        let handle = live(0, 4, 0);
        let mut dir = BlockDirectory::from_handles(vec![handle]);

        dir.mark_freed(&handle).unwrap();
        assert!(!dir.is_live(&handle));
        assert!(dir.get(0).unwrap().is_freed());

        assert!(matches!(
            dir.mark_freed(&handle),
            Err(HeapError::DoubleFree { .. })
        ));
    }

    #[test]
    fn test_mark_freed_unknown() {
        let mut dir = BlockDirectory::from_handles(vec![live(0, 4, 0)]);
        let stranger = live(0, 2, 0);
        assert!(matches!(
            dir.mark_freed(&stranger),
            Err(HeapError::UnknownHandle { offset: 0, size: 2 })
        ));
    }

    #[test]
    fn test_trailing_freed_requires_end_of_file() {
        let dir = BlockDirectory::from_handles(vec![freed(0, 4), live(4, 4, 0), freed(8, 4)]);
        assert_eq!(dir.trailing_freed(12), Some(2));
        assert_eq!(dir.trailing_freed(16), None);
    }

    #[test]
    fn test_trailing_freed_ignores_live_tail() {
        let dir = BlockDirectory::from_handles(vec![live(8, 4, 0), freed(0, 8)]);
        assert_eq!(dir.trailing_freed(12), None);
    }

    #[test]
    fn test_find_by_id_skips_freed() {
        let dir = BlockDirectory::from_handles(vec![
            Handle::new(0, 4, 5).unwrap().with_freed(true),
            live(4, 4, 5),
            live(8, 4, 6),
        ]);

        assert_eq!(dir.find_by_id(5).unwrap().offset(), 4);
        assert_eq!(dir.find_by_id(6).unwrap().offset(), 8);
        assert!(dir.find_by_id(7).is_none());

        let index = dir.id_index();
        assert_eq!(index.len(), 2);
        assert_eq!(index[&5].len(), 1);
    }

    #[test]
    fn test_stats() {
        let dir = BlockDirectory::from_handles(vec![live(0, 4, 0), freed(4, 10), live(14, 2, 1)]);
        let stats = dir.stats();
        assert_eq!(stats.blocks, 3);
        assert_eq!(stats.live, 2);
        assert_eq!(stats.freed, 1);
        assert_eq!(stats.live_bytes, 6);
        assert_eq!(stats.freed_bytes, 10);
    }

    #[test]
    fn test_validate() {
        let ok = BlockDirectory::from_handles(vec![live(4, 4, 0), freed(0, 4)]);
        assert!(ok.validate(8).is_ok());
        assert!(matches!(ok.validate(7), Err(HeapError::CorruptHeader(_))));

        let overlapping = BlockDirectory::from_handles(vec![live(0, 6, 0), freed(4, 4)]);
        assert!(matches!(
            overlapping.validate(8),
            Err(HeapError::CorruptHeader(_))
        ));
    }
}
