// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use apkpack::config::WORKSPACE_OUTPUT_DIR;
use apkpack::signing::generate_keypair;
use apkpack::{BuildContext, PackageConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Build file for a small package with one subpackage.
pub const HELLO_CONFIG: &str = r#"
[package]
name = "hello"
version = "2.12"
epoch = 1
description = "the GNU hello world program"

[[package.copyright]]
license = "GPL-3.0-or-later"

[package.dependencies]
runtime = ["busybox"]

[[subpackages]]
name = "hello-doc"
description = "hello documentation"

[subpackages.dependencies]
runtime = []
"#;

/// Create a workspace and output directory inside a fresh TempDir.
///
/// Returns (TempDir, BuildContext) - keep the TempDir alive to prevent cleanup.
pub fn setup_context() -> (TempDir, BuildContext) {
    let temp_dir = tempfile::tempdir().unwrap();
    let ctx = BuildContext::new(temp_dir.path().join("workspace"), temp_dir.path().join("out"))
        .with_source_date_epoch(1_700_000_000);
    fs::create_dir_all(&ctx.workspace_dir).unwrap();
    (temp_dir, ctx)
}

/// Populate `melange-out/<name>` with the given files.
pub fn write_tree(ctx: &BuildContext, name: &str, files: &[(&str, &[u8])]) -> PathBuf {
    let root = ctx.workspace_dir.join(WORKSPACE_OUTPUT_DIR).join(name);
    fs::create_dir_all(&root).unwrap();
    for (path, contents) in files {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full, contents).unwrap();
    }
    root
}

/// Tree for the `hello` package.
pub fn write_hello_tree(ctx: &BuildContext) -> PathBuf {
    let root = write_tree(
        ctx,
        "hello",
        &[
            ("usr/bin/hello", b"#!/bin/sh\necho hello\n"),
            ("usr/share/locale/de/hello.mo", b"hallo"),
        ],
    );
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(root.join("usr/bin/hello"), fs::Permissions::from_mode(0o755)).unwrap();
    }
    root
}

pub fn hello_config() -> PackageConfig {
    PackageConfig::parse(HELLO_CONFIG).unwrap()
}

/// Generate a small RSA key pair for tests; returns (private, public).
pub fn test_keypair(dir: &Path) -> (PathBuf, PathBuf) {
    let pair = generate_keypair(&dir.join("test.rsa"), 1024).unwrap();
    (pair.private_key, pair.public_key)
}
