//! Directory tree enumeration.
//!
//! Two flavours of walk are provided:
//! - `enumerate`/`scan` build a full `FileInventory` (count, sizes, paths)
//! - `count_files` only counts, for the progress monitor's cheap tick
//!
//! Symlinks, junctions and other reparse points are never followed and never
//! counted. Entries that cannot be stat'ed are skipped.

use std::fs;
use std::io;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

use crate::error::EngineError;
use crate::model::FileInventory;

#[cfg(windows)]
const FILE_ATTRIBUTE_REPARSE_POINT: u32 = 0x400;

/// True for entries the walker must treat as opaque.
fn is_reparse_point(entry: &DirEntry) -> bool {
    if entry.path_is_symlink() || entry.file_type().is_symlink() {
        return true;
    }
    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;
        if let Ok(metadata) = entry.metadata() {
            return metadata.file_attributes() & FILE_ATTRIBUTE_REPARSE_POINT != 0;
        }
    }
    false
}

fn walker(root: &Path) -> impl Iterator<Item = walkdir::Result<DirEntry>> {
    WalkDir::new(root)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_reparse_point(entry))
}

/// Enumerate all regular files under `root`.
///
/// A nonexistent or empty root yields an empty inventory. Unreadable entries
/// (permission errors, files deleted mid-walk) are left out of both the count
/// and the byte total.
pub fn enumerate(root: &Path) -> FileInventory {
    let mut inventory = FileInventory::new();

    for entry in walker(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::trace!("skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(_) => continue,
        };
        if let Ok(relative) = entry.path().strip_prefix(root) {
            inventory.insert(relative.to_path_buf(), size);
        }
    }

    inventory
}

/// Like [`enumerate`], but a root that exists and cannot be listed is an error.
///
/// A missing root is still an empty inventory.
pub fn scan(root: &Path) -> Result<FileInventory, EngineError> {
    match fs::metadata(root) {
        Ok(metadata) if metadata.is_dir() => {}
        Ok(_) => {
            return Err(EngineError::VerificationIo {
                path: root.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
            })
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(FileInventory::new()),
        Err(e) => {
            return Err(EngineError::VerificationIo {
                path: root.to_path_buf(),
                source: e,
            })
        }
    }

    fs::read_dir(root).map_err(|e| EngineError::VerificationIo {
        path: root.to_path_buf(),
        source: e,
    })?;

    Ok(enumerate(root))
}

/// Count regular files under `root` without summing sizes.
///
/// Unlike [`enumerate`], the first traversal error fails the whole count, so
/// callers can tell a transient failure apart from a real count.
pub fn count_files(root: &Path) -> io::Result<u64> {
    fs::read_dir(root)?;

    let mut count = 0u64;
    for entry in walker(root) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            count += 1;
        }
    }
    Ok(count)
}
