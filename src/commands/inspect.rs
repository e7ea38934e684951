// src/commands/inspect.rs
//! Package inspection and verification commands

use anyhow::{Context, Result};
use apkpack::inspect::{InspectedPackage, SignatureStatus};
use std::path::Path;

/// Print the structure of a package
pub fn cmd_inspect(path: &str, show_files: bool) -> Result<()> {
    let pkg = InspectedPackage::from_file(Path::new(path))
        .with_context(|| format!("Failed to inspect {}", path))?;
    let info = pkg.pkginfo();

    println!("Package: {} {}", info.pkgname, info.pkgver);
    println!("Arch: {}", info.arch);
    println!("Installed size: {} bytes", info.size);
    if !info.pkgdesc.is_empty() {
        println!("Description: {}", info.pkgdesc);
    }
    if !info.licenses.is_empty() {
        println!("License: {}", info.licenses.join(", "));
    }
    if !info.depends.is_empty() {
        println!("Depends: {}", info.depends.join(" "));
    }

    println!();
    println!("Members:");
    for member in pkg.members() {
        println!(
            "  {:<10} {:>8} bytes  [{}..{})  {} entries",
            member.kind.as_str(),
            member.range.len(),
            member.range.start,
            member.range.end,
            member.entries.len()
        );
    }

    println!();
    println!("Control digest (sha1):  {}", pkg.control_digest());
    println!("Data digest (sha256):   {}", pkg.data_digest());
    println!("Recorded datahash:      {}", info.datahash);
    if let Some((name, sig)) = pkg.signature() {
        println!("Signature: {} ({} bytes)", name, sig.len());
    } else {
        println!("Signature: none");
    }

    if show_files {
        println!();
        println!("Files:");
        for entry in pkg.data_entries() {
            match &entry.link {
                Some(target) => println!("  {:04o} {} -> {}", entry.mode, entry.path, target),
                None => println!("  {:04o} {:>10} {}", entry.mode, entry.size, entry.path),
            }
        }
    }

    Ok(())
}

/// Verify digests and, given a public key, the signature of a package
pub fn cmd_verify(path: &str, key: Option<&str>) -> Result<()> {
    let pkg = InspectedPackage::from_file(Path::new(path))
        .with_context(|| format!("Failed to read {}", path))?;

    let result = pkg
        .verify(key.map(Path::new))
        .with_context(|| format!("Verification of {} failed", path))?;

    println!("[OK] datahash {}", result.data_digest);
    println!("[OK] control digest {}", result.control_digest);
    match result.signature {
        SignatureStatus::Unsigned if key.is_some() => {
            anyhow::bail!("{} is unsigned but a signing key was given", path)
        }
        SignatureStatus::Unsigned => println!("[--] package is unsigned"),
        SignatureStatus::Unchecked { key_name } => {
            println!("[--] signed with {} (no --key given, not checked)", key_name)
        }
        SignatureStatus::Verified { key_name } => println!("[OK] signature {}", key_name),
    }

    Ok(())
}
