// src/main.rs

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Emit {
            config,
            arch,
            workspace_dir,
            out_dir,
            source_date_epoch,
            signing_key,
            signing_passphrase,
        } => commands::cmd_emit(
            &config,
            arch.as_deref(),
            &workspace_dir,
            &out_dir,
            source_date_epoch.as_deref(),
            signing_key.as_deref(),
            signing_passphrase,
        ),
        Commands::Keygen {
            output,
            bits,
            force,
        } => commands::cmd_keygen(&output, bits, force),
        Commands::Inspect { package, files } => commands::cmd_inspect(&package, files),
        Commands::Verify { package, key } => commands::cmd_verify(&package, key.as_deref()),
    }
}
