// src/config.rs

//! Build file and build context
//!
//! A build file is a TOML document describing the origin package and any
//! subpackages split out of the same build:
//!
//! ```toml
//! [package]
//! name = "hello"
//! version = "2.12"
//! epoch = 0
//! description = "the GNU hello world program"
//!
//! [[package.copyright]]
//! license = "GPL-3.0-or-later"
//!
//! [package.dependencies]
//! runtime = ["busybox"]
//!
//! [[subpackages]]
//! name = "hello-doc"
//! description = "hello documentation"
//! ```
//!
//! The [`BuildContext`] carries everything that is not package metadata:
//! target architecture, workspace and output directories, the
//! reproducibility epoch and the optional signing key.

use crate::arch::Arch;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable holding the reproducibility epoch
pub const SOURCE_DATE_EPOCH_ENV: &str = "SOURCE_DATE_EPOCH";

/// Environment variable holding the signing key passphrase
pub const SIGNING_PASSPHRASE_ENV: &str = "APKPACK_SIGNING_PASSPHRASE";

/// Directory under the workspace holding one prepared tree per package
pub const WORKSPACE_OUTPUT_DIR: &str = "melange-out";

/// A complete build file
#[derive(Debug, Clone, Deserialize)]
pub struct PackageConfig {
    /// Origin package metadata
    pub package: Package,

    /// Packages split out of the same build
    #[serde(default)]
    pub subpackages: Vec<Subpackage>,
}

/// Origin package metadata
#[derive(Debug, Clone, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,

    /// Package revision, rendered as `-rN`
    #[serde(default)]
    pub epoch: u64,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub copyright: Vec<Copyright>,

    #[serde(default)]
    pub dependencies: Dependencies,
}

/// License information for a set of paths
#[derive(Debug, Clone, Deserialize)]
pub struct Copyright {
    /// Paths the license applies to (informational)
    #[serde(default)]
    pub paths: Vec<String>,

    /// Copyright attestation text (informational)
    #[serde(default)]
    pub attestation: Option<String>,

    /// SPDX license expression
    pub license: String,
}

/// Dependency lists
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Dependencies {
    /// Runtime dependencies, each rendered as a `depend =` line
    #[serde(default)]
    pub runtime: Vec<String>,
}

/// A package split out of the origin build
#[derive(Debug, Clone, Deserialize)]
pub struct Subpackage {
    pub name: String,

    /// Overrides the origin description when set
    #[serde(default)]
    pub description: Option<String>,

    /// Overrides the origin dependencies when set
    #[serde(default)]
    pub dependencies: Option<Dependencies>,
}

impl Package {
    /// Distinct license values in first-seen order
    pub fn licenses(&self) -> Vec<String> {
        let mut licenses: Vec<String> = Vec::new();
        for copyright in &self.copyright {
            if !licenses.contains(&copyright.license) {
                licenses.push(copyright.license.clone());
            }
        }
        licenses
    }
}

impl PackageConfig {
    /// Parse a build file from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: PackageConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and parse a build file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::IoError(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    /// Check the metadata that ends up in file names and control records
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.package.name)?;
        if self.package.version.trim().is_empty() {
            return Err(Error::ParseError(format!(
                "package {} has an empty version",
                self.package.name
            )));
        }
        if self.package.version.contains(char::is_whitespace) {
            return Err(Error::ParseError(format!(
                "package {} version '{}' contains whitespace",
                self.package.name, self.package.version
            )));
        }
        // The version is part of the output file name
        if self.package.version.contains(['/', '\\']) || self.package.version.contains("..") {
            return Err(Error::ParseError(format!(
                "package {} version '{}' is not a valid file name component",
                self.package.name, self.package.version
            )));
        }

        let mut seen = vec![self.package.name.as_str()];
        for sub in &self.subpackages {
            validate_name(&sub.name)?;
            if seen.contains(&sub.name.as_str()) {
                return Err(Error::ParseError(format!(
                    "duplicate package name: {}",
                    sub.name
                )));
            }
            seen.push(&sub.name);
        }

        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::ParseError("package name is empty".to_string()));
    }
    if name.contains(['/', '\\']) || name.contains(char::is_whitespace) || name.starts_with('.') {
        return Err(Error::ParseError(format!("invalid package name: {}", name)));
    }
    Ok(())
}

/// Everything an emit needs besides package metadata
#[derive(Clone)]
pub struct BuildContext {
    /// Target architecture
    pub arch: Arch,
    /// Workspace root holding `melange-out/<package>` trees
    pub workspace_dir: PathBuf,
    /// Output root; packages land in `<out_dir>/<apk arch>/`
    pub out_dir: PathBuf,
    /// Timestamp substituted for every archive entry mtime
    pub source_date_epoch: u64,
    /// RSA private key used to sign the control member
    pub signing_key: Option<PathBuf>,
    /// Passphrase for an encrypted signing key
    pub signing_passphrase: Option<String>,
    /// Directory for intermediate member files (default: system temp dir)
    pub temp_dir: Option<PathBuf>,
}

impl BuildContext {
    pub fn new(workspace_dir: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            arch: Arch::default(),
            workspace_dir: workspace_dir.into(),
            out_dir: out_dir.into(),
            source_date_epoch: 0,
            signing_key: None,
            signing_passphrase: None,
            temp_dir: None,
        }
    }

    pub fn with_arch(mut self, arch: Arch) -> Self {
        self.arch = arch;
        self
    }

    pub fn with_source_date_epoch(mut self, epoch: u64) -> Self {
        self.source_date_epoch = epoch;
        self
    }

    /// Sign emitted packages with the given key
    pub fn with_signing_key(mut self, key: impl Into<PathBuf>, passphrase: Option<String>) -> Self {
        self.signing_key = Some(key.into());
        self.signing_passphrase = passphrase;
        self
    }

    /// Write intermediate member files below `dir`
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Prepared tree for one package
    pub fn workspace_subdir(&self, package_name: &str) -> PathBuf {
        self.workspace_dir.join(WORKSPACE_OUTPUT_DIR).join(package_name)
    }

    /// Directory the packages for this architecture are written to
    pub fn arch_out_dir(&self) -> PathBuf {
        self.out_dir.join(self.arch.to_apk())
    }
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("arch", &self.arch)
            .field("workspace_dir", &self.workspace_dir)
            .field("out_dir", &self.out_dir)
            .field("source_date_epoch", &self.source_date_epoch)
            .field("signing_key", &self.signing_key)
            .field(
                "signing_passphrase",
                &self.signing_passphrase.as_ref().map(|_| "<redacted>"),
            )
            .field("temp_dir", &self.temp_dir)
            .finish()
    }
}

/// Parse a `SOURCE_DATE_EPOCH` value (seconds since the Unix epoch)
pub fn parse_source_date_epoch(value: &str) -> Result<u64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed
        .parse::<u64>()
        .map_err(|_| Error::InvalidEpoch(value.to_string()))
}

/// Reproducibility epoch from the environment, if set
pub fn source_date_epoch_from_env() -> Result<Option<u64>> {
    match std::env::var(SOURCE_DATE_EPOCH_ENV) {
        Ok(value) => parse_source_date_epoch(&value).map(Some),
        Err(_) => Ok(None),
    }
}
