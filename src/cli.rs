// src/cli.rs
//! CLI definitions for apkpack
//!
//! The command implementations live in the `commands` module.

use apkpack::signing::DEFAULT_KEY_BITS;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "apkpack")]
#[command(author, version, about = "Reproducible, signed APK package emitter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Emit the package and subpackages described by a build file
    Emit {
        /// Build file (TOML)
        config: String,

        /// Target architecture (apk or OCI name, default: host)
        #[arg(short, long)]
        arch: Option<String>,

        /// Workspace holding melange-out/<package> trees
        #[arg(short, long, default_value = ".")]
        workspace_dir: String,

        /// Output directory; packages land in <out-dir>/<arch>/
        #[arg(short, long, default_value = "packages")]
        out_dir: String,

        /// Timestamp for every archive entry (default: $SOURCE_DATE_EPOCH or 0)
        #[arg(long)]
        source_date_epoch: Option<String>,

        /// RSA private key used to sign packages
        #[arg(short = 'k', long)]
        signing_key: Option<String>,

        /// Passphrase for an encrypted signing key
        /// (default: $APKPACK_SIGNING_PASSPHRASE)
        #[arg(long)]
        signing_passphrase: Option<String>,
    },

    /// Generate an RSA signing key pair
    Keygen {
        /// Private key path; the public key is written to <output>.pub
        #[arg(short, long, default_value = "melange.rsa")]
        output: String,

        /// Key size in bits
        #[arg(short, long, default_value_t = DEFAULT_KEY_BITS)]
        bits: usize,

        /// Overwrite existing key files
        #[arg(short, long)]
        force: bool,
    },

    /// Show the members, digests and control record of a package
    Inspect {
        /// Path to .apk package file
        package: String,

        /// Show data member file listing
        #[arg(short, long)]
        files: bool,
    },

    /// Verify package digests and signature
    Verify {
        /// Path to .apk package file
        package: String,

        /// Public key to check the signature against
        #[arg(short, long)]
        key: Option<String>,
    },
}
