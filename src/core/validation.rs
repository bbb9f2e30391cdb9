//! Path conventions for heap files
//!
//! A heap lives in a `.hpf` file; its block directory is persisted next to it
//! in a sidecar named after the full file name plus `.header`
//! (`data.hpf` -> `data.hpf.header`).

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Recommended file extension for heap files, without the leading dot
pub const FILE_EXTENSION: &str = "hpf";

/// Suffix appended to the heap file name to name its sidecar header
pub const HEADER_SUFFIX: &str = ".header";

/// Derive the sidecar header path for a heap file
///
/// # Examples
///
/// ```
/// use heapfile_rs::validation::header_path_for;
/// use std::path::Path;
///
/// assert_eq!(
///     header_path_for(Path::new("/tmp/store.hpf")),
///     Path::new("/tmp/store.hpf.header")
/// );
/// ```
pub fn header_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_os_string();
    name.push(HEADER_SUFFIX);
    PathBuf::from(name)
}

/// Add the `.hpf` extension to a path that has none
///
/// Paths that already carry any extension are returned unchanged.
pub fn with_default_extension(path: &Path) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(FILE_EXTENSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_path_appends_suffix() {
        assert_eq!(
            header_path_for(Path::new("store.hpf")),
            PathBuf::from("store.hpf.header")
        );
        assert_eq!(
            header_path_for(Path::new("dir/noext")),
            PathBuf::from("dir/noext.header")
        );
    }

    #[test]
    fn test_default_extension_then_header() {
        let file = with_default_extension(Path::new("data/store"));
        assert_eq!(file, PathBuf::from("data/store.hpf"));
        assert_eq!(header_path_for(&file), PathBuf::from("data/store.hpf.header"));
    }

    #[test]
    fn test_default_extension() {
        assert_eq!(
            with_default_extension(Path::new("store")),
            PathBuf::from("store.hpf")
        );
        assert_eq!(
            with_default_extension(Path::new("store.bin")),
            PathBuf::from("store.bin")
        );
    }
}
