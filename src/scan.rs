// src/scan.rs

//! Workspace tree scanning
//!
//! Computes the installed size recorded in `.PKGINFO`. Only regular files
//! count; directories and symlinks contribute nothing. The tarball writer
//! applies the same policy when deciding which entries carry payload bytes,
//! so the recorded size always matches the archived content.

use crate::error::{Error, Result};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Sum of the sizes of all regular files below `root`
///
/// Symlinks are not followed. Any traversal error, including a missing
/// root, aborts the scan.
pub fn scan_installed_size(root: &Path) -> Result<u64> {
    let mut total = 0u64;
    let mut files = 0usize;

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|source| Error::Traversal {
            path: root.to_path_buf(),
            source,
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let metadata = entry.metadata().map_err(|source| Error::Traversal {
            path: entry.path().to_path_buf(),
            source,
        })?;
        total += metadata.len();
        files += 1;
    }

    debug!("Scanned {}: {} files, {} bytes", root.display(), files, total);
    Ok(total)
}
