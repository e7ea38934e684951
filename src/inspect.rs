// src/inspect.rs

//! APK package inspection
//!
//! Tools for reading and verifying emitted `.apk` files. A package is split
//! into its gzip members by decoding them one at a time and recording the
//! exact compressed byte range each occupies; digests are recomputed over
//! those ranges.

use crate::control::{PKGINFO_NAME, PkgInfo};
use crate::error::{Error, Result};
use crate::hash::{Hash, HashAlgorithm, hash_bytes};
use crate::signing::{SIGNATURE_PREFIX, verify_digest_signature};
use flate2::bufread::GzDecoder;
use std::fs;
use std::io::Read;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::debug;

/// Role of a gzip member inside a package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Signature,
    Control,
    Data,
}

impl MemberKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signature => "signature",
            Self::Control => "control",
            Self::Data => "data",
        }
    }
}

/// One tar entry of a member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberEntry {
    pub path: String,
    pub size: u64,
    pub mode: u32,
    /// Link target for symlinks
    pub link: Option<String>,
}

/// One gzip member
#[derive(Debug, Clone)]
pub struct Member {
    pub kind: MemberKind,
    /// Compressed byte range within the package file
    pub range: Range<usize>,
    pub entries: Vec<MemberEntry>,
}

/// Inspected package data
#[derive(Debug, Clone)]
pub struct InspectedPackage {
    path: PathBuf,
    bytes: Vec<u8>,
    members: Vec<Member>,
    pkginfo: PkgInfo,
    control_text: String,
    signature: Option<(String, Vec<u8>)>,
}

/// How the signature check went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    /// The package carries no signature member
    Unsigned,
    /// Signed, but no public key was supplied
    Unchecked { key_name: String },
    /// Signature verified against the supplied public key
    Verified { key_name: String },
}

/// Outcome of a successful verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    /// SHA-256 of the data member, equal to the recorded `datahash`
    pub data_digest: Hash,
    /// SHA-1 of the control member
    pub control_digest: Hash,
    pub signature: SignatureStatus,
}

impl InspectedPackage {
    /// Load a package from a .apk file
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .map_err(|e| Error::IoError(format!("Failed to read {}: {}", path.display(), e)))?;
        let mut pkg = Self::from_bytes(bytes)?;
        pkg.path = path.to_path_buf();
        Ok(pkg)
    }

    /// Inspect a package held in memory
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let raw = split_members(&bytes)?;
        if raw.len() < 2 || raw.len() > 3 {
            return Err(Error::InvalidPackage(format!(
                "expected 2 or 3 gzip members, found {}",
                raw.len()
            )));
        }

        let mut members = Vec::with_capacity(raw.len());
        let mut pkginfo = None;
        let mut signature = None;
        let last = raw.len() - 1;

        for (index, (range, decoded)) in raw.into_iter().enumerate() {
            let mut entries = Vec::new();
            let mut files = Vec::new();
            read_entries(&decoded, &mut entries, &mut files)?;

            let first = entries.first().map(|e| e.path.as_str()).unwrap_or("");
            let kind = if index == last {
                MemberKind::Data
            } else if index == 0 && last == 2 && first.starts_with(SIGNATURE_PREFIX) {
                MemberKind::Signature
            } else if index == last - 1 && first == PKGINFO_NAME {
                MemberKind::Control
            } else {
                return Err(Error::InvalidPackage(format!(
                    "unexpected member {} starting with '{}'",
                    index, first
                )));
            };

            match kind {
                MemberKind::Signature => signature = files.into_iter().next(),
                MemberKind::Control => {
                    let (_, contents) = files
                        .into_iter()
                        .next()
                        .ok_or_else(|| Error::InvalidPackage("empty control member".to_string()))?;
                    let text = String::from_utf8(contents).map_err(|_| {
                        Error::InvalidPackage(".PKGINFO is not valid UTF-8".to_string())
                    })?;
                    pkginfo = Some((PkgInfo::parse(&text)?, text));
                }
                MemberKind::Data => {}
            }

            debug!("member {}: {} bytes {:?}", kind.as_str(), range.len(), range);
            members.push(Member {
                kind,
                range,
                entries,
            });
        }

        let (pkginfo, control_text) =
            pkginfo.ok_or_else(|| Error::InvalidPackage("no .PKGINFO found".to_string()))?;

        Ok(Self {
            path: PathBuf::new(),
            bytes,
            members,
            pkginfo,
            control_text,
            signature,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Parsed control record
    pub fn pkginfo(&self) -> &PkgInfo {
        &self.pkginfo
    }

    /// Raw `.PKGINFO` text
    pub fn control_text(&self) -> &str {
        &self.control_text
    }

    /// Signature entry name and signature bytes
    pub fn signature(&self) -> Option<(&str, &[u8])> {
        self.signature
            .as_ref()
            .map(|(name, sig)| (name.as_str(), sig.as_slice()))
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Compressed bytes of the member of `kind`
    pub fn member_bytes(&self, kind: MemberKind) -> Option<&[u8]> {
        self.members
            .iter()
            .find(|m| m.kind == kind)
            .map(|m| &self.bytes[m.range.clone()])
    }

    /// Entries of the data member
    pub fn data_entries(&self) -> &[MemberEntry] {
        self.members
            .iter()
            .find(|m| m.kind == MemberKind::Data)
            .map(|m| m.entries.as_slice())
            .unwrap_or(&[])
    }

    /// SHA-1 of the control member
    pub fn control_digest(&self) -> Hash {
        hash_bytes(
            HashAlgorithm::Sha1,
            self.member_bytes(MemberKind::Control).unwrap_or(&[]),
        )
    }

    /// SHA-256 of the data member
    pub fn data_digest(&self) -> Hash {
        hash_bytes(
            HashAlgorithm::Sha256,
            self.member_bytes(MemberKind::Data).unwrap_or(&[]),
        )
    }

    /// Check the recorded data hash and, given a public key, the signature
    pub fn verify(&self, public_key: Option<&Path>) -> Result<VerificationResult> {
        let data_digest = self.data_digest();
        if !data_digest.as_str().eq_ignore_ascii_case(&self.pkginfo.datahash) {
            return Err(Error::ChecksumMismatch {
                what: "datahash",
                expected: self.pkginfo.datahash.clone(),
                actual: data_digest.value,
            });
        }

        let control_digest = self.control_digest();

        let signature = match (&self.signature, public_key) {
            (None, _) => SignatureStatus::Unsigned,
            (Some((key_name, _)), None) => SignatureStatus::Unchecked {
                key_name: key_name.clone(),
            },
            (Some((key_name, sig)), Some(key_path)) => {
                let pem = fs::read_to_string(key_path).map_err(|e| {
                    Error::IoError(format!("Failed to read {}: {}", key_path.display(), e))
                })?;
                verify_digest_signature(&pem, control_digest.as_bytes(), sig)?;
                SignatureStatus::Verified {
                    key_name: key_name.clone(),
                }
            }
        };

        Ok(VerificationResult {
            data_digest,
            control_digest,
            signature,
        })
    }
}

/// Split concatenated gzip members, returning each compressed range and
/// its decompressed contents
fn split_members(bytes: &[u8]) -> Result<Vec<(Range<usize>, Vec<u8>)>> {
    let mut members = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        let mut decoder = GzDecoder::new(&bytes[offset..]);
        let mut decoded = Vec::new();
        decoder.read_to_end(&mut decoded).map_err(|e| {
            Error::InvalidPackage(format!("bad gzip member at offset {}: {}", offset, e))
        })?;

        let remaining = decoder.into_inner().len();
        let end = bytes.len() - remaining;
        if end == offset {
            return Err(Error::InvalidPackage(format!(
                "empty gzip member at offset {}",
                offset
            )));
        }
        members.push((offset..end, decoded));
        offset = end;
    }

    Ok(members)
}

/// Collect entries of one (possibly unterminated) tar stream, keeping the
/// contents of regular files
fn read_entries(
    tar: &[u8],
    entries: &mut Vec<MemberEntry>,
    files: &mut Vec<(String, Vec<u8>)>,
) -> Result<()> {
    let mut archive = Archive::new(tar);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.to_string_lossy().into_owned();
        let header = entry.header();
        let size = header.size()?;
        let mode = header.mode()?;
        let link = entry
            .link_name()?
            .map(|l| l.to_string_lossy().into_owned());
        let is_file = entry.header().entry_type().is_file();

        if is_file {
            let mut contents = Vec::with_capacity(size as usize);
            entry.read_to_end(&mut contents)?;
            files.push((path.clone(), contents));
        }

        entries.push(MemberEntry {
            path,
            size,
            mode,
            link,
        });
    }
    Ok(())
}
