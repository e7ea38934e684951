// src/tarball.rs

//! Deterministic tar+gzip member writer
//!
//! Every member of an APK is an independent gzip stream wrapping a tar
//! stream. The writer normalizes everything that would make output depend
//! on the build host: entry order is sorted, mtimes are replaced by the
//! source date epoch, ownership can be forced (root:root by convention) and
//! the gzip header carries no timestamp or file name.
//!
//! Members that are followed by another member in the final package must not
//! end with the two zero blocks that mark the end of a tar archive, otherwise
//! readers stop before reaching the following members. [`TarballOptions::with_finalize`]
//! selects between the two modes; the gzip stream itself is always completed.

use crate::error::{Error, Result};
use crate::hash::{hash_bytes, hash_reader, HashAlgorithm};
use flate2::{Compression, GzBuilder};
use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tar::{Builder, EntryType, Header};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// PAX record apk-tools reads per-file checksums from
pub const APK_CHECKSUM_PAX_KEY: &str = "APK-TOOLS.checksum.SHA1";

/// Options controlling how a member is written
#[derive(Debug, Clone)]
pub struct TarballOptions {
    /// Timestamp written as every entry mtime
    pub source_date_epoch: u64,
    /// Forced (uid, gid) for every entry
    pub override_uid_gid: Option<(u64, u64)>,
    /// Forced owner name for every entry
    pub override_uname: Option<String>,
    /// Forced group name for every entry
    pub override_gname: Option<String>,
    /// Emit `APK-TOOLS.checksum.SHA1` PAX records for files and symlinks
    pub use_checksums: bool,
    /// Write the end-of-archive marker; disable when more members follow
    pub finalize: bool,
}

impl Default for TarballOptions {
    fn default() -> Self {
        Self {
            source_date_epoch: 0,
            override_uid_gid: None,
            override_uname: None,
            override_gname: None,
            use_checksums: false,
            finalize: true,
        }
    }
}

impl TarballOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source_date_epoch(mut self, epoch: u64) -> Self {
        self.source_date_epoch = epoch;
        self
    }

    pub fn with_override_uid_gid(mut self, uid: u64, gid: u64) -> Self {
        self.override_uid_gid = Some((uid, gid));
        self
    }

    pub fn with_override_uname(mut self, uname: &str) -> Self {
        self.override_uname = Some(uname.to_string());
        self
    }

    pub fn with_override_gname(mut self, gname: &str) -> Self {
        self.override_gname = Some(gname.to_string());
        self
    }

    pub fn with_use_checksums(mut self, enabled: bool) -> Self {
        self.use_checksums = enabled;
        self
    }

    /// Whether the member ends the tar stream
    ///
    /// `false` is the "more data follows" mode used for the signature and
    /// control members.
    pub fn with_finalize(mut self, finalize: bool) -> Self {
        self.finalize = finalize;
        self
    }

    /// root:root ownership at the given epoch, the layout every APK member uses
    pub fn reproducible(epoch: u64) -> Self {
        Self::new()
            .with_source_date_epoch(epoch)
            .with_override_uid_gid(0, 0)
            .with_override_uname("root")
            .with_override_gname("root")
    }
}

/// A file held in memory rather than on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryFile {
    /// Archive path, relative, `/`-separated
    pub path: String,
    /// Permission bits
    pub mode: u32,
    pub contents: Vec<u8>,
}

/// The tree a member is built from
#[derive(Debug, Clone)]
pub enum SourceTree {
    /// A directory on disk, archived recursively (root itself excluded)
    Directory(PathBuf),
    /// Files held in memory, archived in the given order
    Memory(Vec<MemoryFile>),
}

impl SourceTree {
    /// A tree holding exactly one in-memory file
    pub fn single_file(path: &str, mode: u32, contents: Vec<u8>) -> Self {
        Self::Memory(vec![MemoryFile {
            path: path.to_string(),
            mode,
            contents,
        }])
    }
}

/// What a finished member contains
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Number of entries written
    pub entries: usize,
    /// Sum of regular file payload sizes
    pub payload_bytes: u64,
}

/// Writer for one compressed tar member
pub struct TarballWriter {
    options: TarballOptions,
}

impl TarballWriter {
    pub fn new(options: TarballOptions) -> Self {
        Self { options }
    }

    /// Write `tree` as one complete gzip member into `out`
    ///
    /// Returns the sink once the gzip trailer has been written, so callers
    /// wrapping `out` (for example in a hashing writer) only see a finished
    /// stream on success.
    pub fn write_archive<W: Write>(&self, out: W, tree: &SourceTree) -> Result<(W, ArchiveSummary)> {
        let encoder = GzBuilder::new().mtime(0).write(out, Compression::default());
        let mut builder = Builder::new(TrailerGate::new(encoder));
        let mut summary = ArchiveSummary::default();

        match tree {
            SourceTree::Directory(root) => self.append_directory(&mut builder, root, &mut summary)?,
            SourceTree::Memory(files) => {
                for file in files {
                    self.append_memory_file(&mut builder, file)?;
                    summary.entries += 1;
                    summary.payload_bytes += file.contents.len() as u64;
                }
            }
        }

        if !self.options.finalize {
            builder.get_mut().close();
        }
        let gate = builder.into_inner()?;
        let out = gate.into_inner().finish()?;

        Ok((out, summary))
    }

    fn append_directory<W: Write>(
        &self,
        builder: &mut Builder<W>,
        root: &Path,
        summary: &mut ArchiveSummary,
    ) -> Result<()> {
        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|source| Error::Traversal {
                path: root.to_path_buf(),
                source,
            })?;
            if entry.depth() == 0 {
                continue;
            }

            let path = entry.path();
            let rel_path = path
                .strip_prefix(root)
                .map_err(|_| Error::IoError(format!("{} is not under {}", path.display(), root.display())))?;
            let metadata = fs::symlink_metadata(path)?;
            let file_type = metadata.file_type();

            let mut header = self.new_header(&metadata)?;

            if file_type.is_dir() {
                header.set_entry_type(EntryType::Directory);
                header.set_size(0);
                builder.append_data(&mut header, rel_path, io::empty())?;
            } else if file_type.is_file() {
                let mut file = File::open(path)?;
                if self.options.use_checksums {
                    let digest = hash_reader(HashAlgorithm::Sha1, &mut file)?;
                    builder.append_pax_extensions([(APK_CHECKSUM_PAX_KEY, digest.as_str().as_bytes())])?;
                    file.seek(SeekFrom::Start(0))?;
                }
                header.set_entry_type(EntryType::Regular);
                header.set_size(metadata.len());
                builder.append_data(&mut header, rel_path, file)?;
                summary.payload_bytes += metadata.len();
            } else if file_type.is_symlink() {
                let target = fs::read_link(path)?;
                if self.options.use_checksums {
                    let digest = hash_bytes(HashAlgorithm::Sha1, target.to_string_lossy().as_bytes());
                    builder.append_pax_extensions([(APK_CHECKSUM_PAX_KEY, digest.as_str().as_bytes())])?;
                }
                header.set_entry_type(EntryType::Symlink);
                header.set_size(0);
                builder.append_link(&mut header, rel_path, &target)?;
            } else {
                warn!("Skipping special file {}", path.display());
                continue;
            }

            debug!("archived {}", rel_path.display());
            summary.entries += 1;
        }

        Ok(())
    }

    fn append_memory_file<W: Write>(&self, builder: &mut Builder<W>, file: &MemoryFile) -> Result<()> {
        if self.options.use_checksums {
            let digest = hash_bytes(HashAlgorithm::Sha1, &file.contents);
            builder.append_pax_extensions([(APK_CHECKSUM_PAX_KEY, digest.as_str().as_bytes())])?;
        }

        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_mode(file.mode);
        header.set_size(file.contents.len() as u64);
        header.set_mtime(self.options.source_date_epoch);
        let (uid, gid) = self.options.override_uid_gid.unwrap_or((0, 0));
        header.set_uid(uid);
        header.set_gid(gid);
        self.apply_names(&mut header)?;

        builder.append_data(&mut header, &file.path, file.contents.as_slice())?;
        Ok(())
    }

    fn new_header(&self, metadata: &fs::Metadata) -> io::Result<Header> {
        let mut header = Header::new_gnu();
        header.set_mode(file_mode(metadata));
        header.set_mtime(self.options.source_date_epoch);

        let (uid, gid) = self
            .options
            .override_uid_gid
            .unwrap_or_else(|| owner_ids(metadata));
        header.set_uid(uid);
        header.set_gid(gid);

        self.apply_names(&mut header)?;
        Ok(header)
    }

    fn apply_names(&self, header: &mut Header) -> io::Result<()> {
        if let Some(uname) = &self.options.override_uname {
            header.set_username(uname)?;
        }
        if let Some(gname) = &self.options.override_gname {
            header.set_groupname(gname)?;
        }
        Ok(())
    }
}

/// Pass-through writer that can be closed to drop trailing writes
///
/// `tar::Builder` always appends the end-of-archive blocks when it is
/// consumed. Closing the gate before that point keeps those blocks out of
/// members that have more members after them.
struct TrailerGate<W> {
    inner: W,
    open: bool,
}

impl<W: Write> TrailerGate<W> {
    fn new(inner: W) -> Self {
        Self { inner, open: true }
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for TrailerGate<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.open {
            self.inner.write(buf)
        } else {
            Ok(buf.len())
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    if metadata.is_dir() { 0o755 } else { 0o644 }
}

#[cfg(unix)]
fn owner_ids(metadata: &fs::Metadata) -> (u64, u64) {
    use std::os::unix::fs::MetadataExt;
    (u64::from(metadata.uid()), u64::from(metadata.gid()))
}

#[cfg(not(unix))]
fn owner_ids(_metadata: &fs::Metadata) -> (u64, u64) {
    (0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tar::Archive;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("usr/bin")).unwrap();
        fs::write(dir.path().join("usr/bin/hello"), b"#!/bin/sh\necho hello\n").unwrap();
        fs::write(dir.path().join("a.txt"), b"0123456789").unwrap();
        dir
    }

    fn decompress(bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_directory_entries_are_normalized() {
        let dir = create_test_tree();
        let writer = TarballWriter::new(TarballOptions::reproducible(1_700_000_000));

        let (bytes, summary) = writer
            .write_archive(Vec::new(), &SourceTree::Directory(dir.path().to_path_buf()))
            .unwrap();

        assert_eq!(summary.payload_bytes, 10 + 21);
        let tar_bytes = decompress(&bytes);
        let mut archive = Archive::new(tar_bytes.as_slice());
        let mut paths = Vec::new();
        for entry in archive.entries().unwrap() {
            let entry = entry.unwrap();
            let header = entry.header();
            assert_eq!(header.mtime().unwrap(), 1_700_000_000);
            assert_eq!(header.uid().unwrap(), 0);
            assert_eq!(header.gid().unwrap(), 0);
            assert_eq!(header.username().unwrap(), Some("root"));
            assert_eq!(header.groupname().unwrap(), Some("root"));
            paths.push(entry.path().unwrap().to_string_lossy().trim_end_matches('/').to_string());
        }

        assert_eq!(paths, vec!["a.txt", "usr", "usr/bin", "usr/bin/hello"]);
        assert_eq!(summary.entries, 4);
    }

    #[test]
    fn test_output_is_reproducible() {
        let dir = create_test_tree();
        let writer = TarballWriter::new(TarballOptions::reproducible(0).with_use_checksums(true));
        let tree = SourceTree::Directory(dir.path().to_path_buf());

        let (first, _) = writer.write_archive(Vec::new(), &tree).unwrap();
        let (second, _) = writer.write_archive(Vec::new(), &tree).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_finalized_member_ends_with_zero_blocks() {
        let tree = SourceTree::single_file(".PKGINFO", 0o644, b"pkgname = a\n".to_vec());

        let (finalized, _) = TarballWriter::new(TarballOptions::reproducible(0))
            .write_archive(Vec::new(), &tree)
            .unwrap();
        let (open, _) = TarballWriter::new(TarballOptions::reproducible(0).with_finalize(false))
            .write_archive(Vec::new(), &tree)
            .unwrap();

        let finalized = decompress(&finalized);
        let open = decompress(&open);

        // header + one padded data block
        assert_eq!(open.len(), 1024);
        assert_eq!(finalized.len(), open.len() + 1024);
        assert!(finalized[open.len()..].iter().all(|b| *b == 0));
        assert_eq!(&finalized[..open.len()], open.as_slice());
    }

    #[test]
    fn test_unfinalized_members_concatenate() {
        let first = SourceTree::single_file(".PKGINFO", 0o644, b"control".to_vec());
        let second = SourceTree::single_file("usr/share/doc", 0o644, b"data".to_vec());

        let (mut combined, _) = TarballWriter::new(TarballOptions::reproducible(0).with_finalize(false))
            .write_archive(Vec::new(), &first)
            .unwrap();
        let (tail, _) = TarballWriter::new(TarballOptions::reproducible(0))
            .write_archive(Vec::new(), &second)
            .unwrap();
        combined.extend_from_slice(&tail);

        let mut tar_bytes = Vec::new();
        flate2::read::MultiGzDecoder::new(combined.as_slice())
            .read_to_end(&mut tar_bytes)
            .unwrap();
        let mut archive = Archive::new(tar_bytes.as_slice());
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec![".PKGINFO", "usr/share/doc"]);
    }

    #[test]
    fn test_checksum_pax_records() {
        let tree = SourceTree::single_file("etc/motd", 0o644, b"hello world".to_vec());
        let writer = TarballWriter::new(TarballOptions::reproducible(0).with_use_checksums(true));

        let (bytes, _) = writer.write_archive(Vec::new(), &tree).unwrap();
        let tar_bytes = decompress(&bytes);
        let record = format!("{}=2aae6c35c94fcfb415dbe95f408b9ce91ee846ed\n", APK_CHECKSUM_PAX_KEY);
        assert!(
            tar_bytes
                .windows(record.len())
                .any(|w| w == record.as_bytes())
        );

        // The record describes the file entry that follows it
        let mut archive = Archive::new(tar_bytes.as_slice());
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["etc/motd"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_and_mode_preserved() {
        use std::os::unix::fs::{symlink, PermissionsExt};

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("tool"), b"bin").unwrap();
        fs::set_permissions(dir.path().join("tool"), fs::Permissions::from_mode(0o755)).unwrap();
        symlink("tool", dir.path().join("tool-link")).unwrap();

        let writer = TarballWriter::new(TarballOptions::reproducible(0));
        let (bytes, summary) = writer
            .write_archive(Vec::new(), &SourceTree::Directory(dir.path().to_path_buf()))
            .unwrap();

        assert_eq!(summary.payload_bytes, 3);
        let tar_bytes = decompress(&bytes);
        let mut archive = Archive::new(tar_bytes.as_slice());
        for entry in archive.entries().unwrap() {
            let entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().to_string();
            match path.as_str() {
                "tool" => assert_eq!(entry.header().mode().unwrap(), 0o755),
                "tool-link" => {
                    assert_eq!(entry.header().entry_type(), EntryType::Symlink);
                    assert_eq!(
                        entry.link_name().unwrap().unwrap().to_string_lossy(),
                        "tool"
                    );
                }
                other => panic!("unexpected entry {}", other),
            }
        }
    }

    #[test]
    fn test_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let writer = TarballWriter::new(TarballOptions::reproducible(0));

        let result = writer.write_archive(
            Vec::new(),
            &SourceTree::Directory(dir.path().join("missing")),
        );
        assert!(matches!(result, Err(Error::Traversal { .. })));
    }
}
