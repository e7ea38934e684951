// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: package file
fn package_arg() -> Arg {
    Arg::new("package").required(true).help("Path to .apk package file")
}

fn build_cli() -> Command {
    Command::new("apkpack")
        .version(env!("CARGO_PKG_VERSION"))
        .author("apkpack Contributors")
        .about("Reproducible, signed APK package emitter")
        .subcommand_required(true)
        .subcommand(
            Command::new("emit")
                .about("Emit the package and subpackages described by a build file")
                .arg(Arg::new("config").required(true).help("Build file (TOML)"))
                .arg(
                    Arg::new("arch")
                        .short('a')
                        .long("arch")
                        .help("Target architecture (apk or OCI name, default: host)"),
                )
                .arg(
                    Arg::new("workspace_dir")
                        .short('w')
                        .long("workspace-dir")
                        .default_value(".")
                        .help("Workspace holding melange-out/<package> trees"),
                )
                .arg(
                    Arg::new("out_dir")
                        .short('o')
                        .long("out-dir")
                        .default_value("packages")
                        .help("Output directory; packages land in <out-dir>/<arch>/"),
                )
                .arg(
                    Arg::new("source_date_epoch")
                        .long("source-date-epoch")
                        .help("Timestamp for every archive entry (default: $SOURCE_DATE_EPOCH or 0)"),
                )
                .arg(
                    Arg::new("signing_key")
                        .short('k')
                        .long("signing-key")
                        .help("RSA private key used to sign packages"),
                )
                .arg(
                    Arg::new("signing_passphrase")
                        .long("signing-passphrase")
                        .help("Passphrase for an encrypted signing key (default: $APKPACK_SIGNING_PASSPHRASE)"),
                ),
        )
        .subcommand(
            Command::new("keygen")
                .about("Generate an RSA signing key pair")
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .default_value("melange.rsa")
                        .help("Private key path; the public key is written to <output>.pub"),
                )
                .arg(
                    Arg::new("bits")
                        .short('b')
                        .long("bits")
                        .default_value("4096")
                        .help("Key size in bits"),
                )
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Overwrite existing key files"),
                ),
        )
        .subcommand(
            Command::new("inspect")
                .about("Show the members, digests and control record of a package")
                .arg(package_arg())
                .arg(
                    Arg::new("files")
                        .short('f')
                        .long("files")
                        .action(ArgAction::SetTrue)
                        .help("Show data member file listing"),
                ),
        )
        .subcommand(
            Command::new("verify")
                .about("Verify package digests and signature")
                .arg(package_arg())
                .arg(
                    Arg::new("key")
                        .short('k')
                        .long("key")
                        .help("Public key to check the signature against"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = match env::var("OUT_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=OUT_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = out_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("apkpack.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
