// src/lib.rs

//! apkpack
//!
//! Emits reproducible, optionally signed APK packages from prepared file
//! trees.
//!
//! # Architecture
//!
//! - Tree scanning: installed size of the prepared tree
//! - Data archiving: deterministic `data.tar.gz` member, SHA-256 digest
//! - Control composing: `.PKGINFO` in an open-ended `control.tar.gz`, SHA-1 digest
//! - Signing: RSA signature over the control digest in its own member
//! - Combining: members concatenated and atomically published as
//!   `NAME-VERSION-rEPOCH.apk`

pub mod arch;
pub mod config;
pub mod control;
mod error;
pub mod hash;
pub mod inspect;
pub mod package;
pub mod scan;
pub mod signing;
pub mod tarball;

pub use arch::Arch;
pub use config::{BuildContext, PackageConfig};
pub use control::{ControlRecord, PkgInfo};
pub use error::{Error, Result, Stage};
pub use hash::{Hash, HashAlgorithm, Hasher, HashingWriter};
pub use inspect::{InspectedPackage, SignatureStatus, VerificationResult};
pub use package::{EmittedPackage, PackageContext, emit_all};
pub use signing::{RsaSigner, Signer};
pub use tarball::{SourceTree, TarballOptions, TarballWriter};
