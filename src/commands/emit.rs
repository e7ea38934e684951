// src/commands/emit.rs
//! Package emission command

use anyhow::{Context, Result};
use apkpack::config::{SIGNING_PASSPHRASE_ENV, parse_source_date_epoch, source_date_epoch_from_env};
use apkpack::{Arch, BuildContext, PackageConfig, emit_all};
use std::path::Path;
use tracing::info;

/// Emit every package described by a build file
pub fn cmd_emit(
    config_path: &str,
    arch: Option<&str>,
    workspace_dir: &str,
    out_dir: &str,
    source_date_epoch: Option<&str>,
    signing_key: Option<&str>,
    signing_passphrase: Option<String>,
) -> Result<()> {
    let config = PackageConfig::from_file(Path::new(config_path))
        .with_context(|| format!("Failed to load build file {}", config_path))?;

    let arch = match arch {
        Some(a) => a.parse::<Arch>()?,
        None => Arch::host().unwrap_or_default(),
    };

    let epoch = match source_date_epoch {
        Some(value) => parse_source_date_epoch(value)?,
        None => source_date_epoch_from_env()?.unwrap_or(0),
    };

    let mut ctx = BuildContext::new(workspace_dir, out_dir)
        .with_arch(arch)
        .with_source_date_epoch(epoch);

    if let Some(key) = signing_key {
        let passphrase = signing_passphrase.or_else(|| std::env::var(SIGNING_PASSPHRASE_ENV).ok());
        ctx = ctx.with_signing_key(key, passphrase);
    }

    info!(
        "Emitting {} ({} subpackages) for {}",
        config.package.name,
        config.subpackages.len(),
        arch
    );

    let emitted = emit_all(&ctx, &config).context("Package emission failed")?;

    for pkg in &emitted {
        println!("{}", pkg.path.display());
    }

    Ok(())
}
