// src/commands/keygen.rs
//! Signing key generation command

use anyhow::{Context, Result};
use apkpack::signing::{generate_keypair, public_key_path};
use std::path::Path;

/// Generate an RSA key pair for package signing
pub fn cmd_keygen(output: &str, bits: usize, force: bool) -> Result<()> {
    let private_path = Path::new(output);
    let public_path = public_key_path(private_path);

    if !force {
        for path in [private_path, public_path.as_path()] {
            if path.exists() {
                anyhow::bail!(
                    "{} already exists. Use --force to overwrite.",
                    path.display()
                );
            }
        }
    }

    if bits < 2048 {
        anyhow::bail!("Refusing to generate a {}-bit key; use at least 2048 bits", bits);
    }

    let pair = generate_keypair(private_path, bits).context("Failed to generate signing key")?;

    println!("Private key: {}", pair.private_key.display());
    println!("Public key:  {}", pair.public_key.display());
    println!();
    println!("Install the public key into /etc/apk/keys/ on systems that should trust these packages.");

    Ok(())
}
