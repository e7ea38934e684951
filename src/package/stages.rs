// src/package/stages.rs

//! Individual emit stages and their typed outputs
//!
//! Each stage produces a rewound temporary member file plus whatever the
//! next stage needs from it. Temporary files are deleted when the outputs
//! are dropped, so an aborted job leaves nothing behind.

use super::PackageContext;
use crate::control::{ControlRecord, PKGINFO_NAME};
use crate::error::Result;
use crate::hash::{Hash, HashAlgorithm, HashingWriter};
use crate::signing::Signer;
use crate::tarball::{ArchiveSummary, SourceTree, TarballOptions, TarballWriter};
use std::io::{BufWriter, Seek, SeekFrom};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Mode of the in-memory control and signature entries
const MEMBER_ENTRY_MODE: u32 = 0o644;

/// The compressed data member
pub struct DataMember {
    pub file: NamedTempFile,
    /// SHA-256 of the compressed member
    pub digest: Hash,
    pub summary: ArchiveSummary,
}

/// The compressed control member
pub struct ControlMember {
    pub file: NamedTempFile,
    /// SHA-1 of the compressed member
    pub digest: Hash,
    /// Rendered `.PKGINFO` text
    pub record: String,
}

/// The compressed signature member
pub struct SignatureMember {
    pub file: NamedTempFile,
    /// Entry name, `.SIGN.RSA.<key>.pub`
    pub key_name: String,
}

/// Archive the package tree
///
/// The data member is a complete tar stream: it is the last member of the
/// package, so its end-of-archive blocks terminate the whole file.
pub(super) fn write_data(pkg: &PackageContext, installed_size: u64) -> Result<DataMember> {
    let options = TarballOptions::reproducible(pkg.source_date_epoch)
        .with_use_checksums(true)
        .with_finalize(true);
    let tree = SourceTree::Directory(pkg.workspace_subdir().to_path_buf());

    let (file, digest, summary) = write_member(pkg, "apk-data-", HashAlgorithm::Sha256, options, &tree)?;

    if summary.payload_bytes != installed_size {
        warn!(
            "archived {} payload bytes but scanned {} (tree changed during emit?)",
            summary.payload_bytes, installed_size
        );
    }
    debug!("data member: {} entries", summary.entries);

    Ok(DataMember {
        file,
        digest,
        summary,
    })
}

/// Render `.PKGINFO` and archive it as a non-finalized member
pub(super) fn write_control(
    pkg: &PackageContext,
    installed_size: u64,
    datahash: &Hash,
) -> Result<ControlMember> {
    let record = ControlRecord::new()
        .with_name(pkg.name())
        .with_version(pkg.version(), pkg.epoch())
        .with_arch(pkg.arch().to_apk())
        .with_size(installed_size)
        .with_description(pkg.description())
        .with_licenses(pkg.licenses().iter().cloned())
        .with_depends(pkg.depends().iter().cloned())
        .with_datahash(datahash.as_str())
        .render()?;

    let options = TarballOptions::reproducible(pkg.source_date_epoch).with_finalize(false);
    let tree = SourceTree::single_file(PKGINFO_NAME, MEMBER_ENTRY_MODE, record.clone().into_bytes());

    let (file, digest, _) = write_member(pkg, "apk-control-", HashAlgorithm::Sha1, options, &tree)?;

    Ok(ControlMember {
        file,
        digest,
        record,
    })
}

/// Sign the control digest and archive the signature as a non-finalized member
pub(super) fn write_signature(
    pkg: &PackageContext,
    signer: &dyn Signer,
    control: &ControlMember,
) -> Result<SignatureMember> {
    let signature = signer.sign_digest(control.digest.as_bytes())?;
    let key_name = signer.key_name().to_string();
    debug!("{} signature: {} bytes", signer.algorithm(), signature.len());

    let options = TarballOptions::reproducible(pkg.source_date_epoch).with_finalize(false);
    let tree = SourceTree::single_file(&key_name, MEMBER_ENTRY_MODE, signature);

    let (file, _, _) = write_member(pkg, "apk-signature-", HashAlgorithm::Sha1, options, &tree)?;

    Ok(SignatureMember { file, key_name })
}

/// Write one member to a temporary file, digesting the compressed bytes
fn write_member(
    pkg: &PackageContext,
    prefix: &str,
    algorithm: HashAlgorithm,
    options: TarballOptions,
    tree: &SourceTree,
) -> Result<(NamedTempFile, Hash, ArchiveSummary)> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix).suffix(".tar.gz");
    let file = match pkg.temp_dir() {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };

    let sink = HashingWriter::new(BufWriter::new(file), algorithm);
    let (sink, summary) = TarballWriter::new(options).write_archive(sink, tree)?;
    let (buffered, digest) = sink.finish()?;

    let mut file = buffered.into_inner().map_err(|e| e.into_error())?;
    file.seek(SeekFrom::Start(0))?;

    Ok((file, digest, summary))
}
