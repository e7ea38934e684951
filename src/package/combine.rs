// src/package/combine.rs

//! Member concatenation and atomic publish

use crate::error::{Error, Result};
use std::fs;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Concatenate `inputs` byte for byte into `out`
///
/// Returns the number of bytes copied.
pub fn combine<W: Write>(out: &mut W, inputs: &mut [&mut dyn Read]) -> io::Result<u64> {
    let mut total = 0;
    for input in inputs.iter_mut() {
        total += io::copy(input, out)?;
    }
    out.flush()?;
    Ok(total)
}

/// Write the concatenation of `inputs` to `dest`
///
/// The bytes go to a temporary file in the destination directory which is
/// renamed over `dest` only after everything was written, so `dest` either
/// holds a complete package or does not exist.
pub fn publish(dest: &Path, inputs: &mut [&mut dyn Read]) -> Result<u64> {
    let dir = dest
        .parent()
        .ok_or_else(|| Error::IoError(format!("{} has no parent directory", dest.display())))?;
    fs::create_dir_all(dir)
        .map_err(|e| Error::IoError(format!("Failed to create {}: {}", dir.display(), e)))?;

    let staging = NamedTempFile::new_in(dir)?;
    let mut writer = BufWriter::new(staging);
    let written = combine(&mut writer, inputs)?;
    let staging = writer.into_inner().map_err(|e| e.into_error())?;
    staging.as_file().sync_all()?;

    staging
        .persist(dest)
        .map_err(|e| Error::IoError(format!("Failed to write {}: {}", dest.display(), e.error)))?;

    debug!("published {} ({} bytes)", dest.display(), written);
    Ok(written)
}
