// src/arch.rs

//! Target architectures and their APK names
//!
//! Build tooling usually speaks OCI/Go platform names (`amd64`, `arm64`,
//! `arm/v7`), while APK indexes and `.PKGINFO` use the apk-tools names
//! (`x86_64`, `aarch64`, `armv7`). Both spellings parse into [`Arch`].

use crate::error::Error;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

/// A package target architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Arch {
    #[default]
    X86_64,
    Aarch64,
    Armv7,
    Armhf,
    X86,
    Ppc64le,
    S390x,
    Riscv64,
}

impl Arch {
    /// Name used in `.PKGINFO` and in the output directory layout
    pub const fn to_apk(&self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
            Self::Armv7 => "armv7",
            Self::Armhf => "armhf",
            Self::X86 => "x86",
            Self::Ppc64le => "ppc64le",
            Self::S390x => "s390x",
            Self::Riscv64 => "riscv64",
        }
    }

    /// OCI platform name
    pub const fn to_oci(&self) -> &'static str {
        match self {
            Self::X86_64 => "amd64",
            Self::Aarch64 => "arm64",
            Self::Armv7 => "arm/v7",
            Self::Armhf => "arm/v6",
            Self::X86 => "386",
            Self::Ppc64le => "ppc64le",
            Self::S390x => "s390x",
            Self::Riscv64 => "riscv64",
        }
    }

    /// Architecture of the running host, if it has an APK equivalent
    pub fn host() -> Option<Self> {
        std::env::consts::ARCH.parse().ok()
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_apk())
    }
}

impl FromStr for Arch {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "x86_64" | "amd64" => Ok(Self::X86_64),
            "aarch64" | "arm64" => Ok(Self::Aarch64),
            "armv7" | "arm/v7" => Ok(Self::Armv7),
            "armhf" | "arm/v6" | "arm" => Ok(Self::Armhf),
            "x86" | "386" | "i386" | "i686" => Ok(Self::X86),
            "ppc64le" | "powerpc64le" => Ok(Self::Ppc64le),
            "s390x" => Ok(Self::S390x),
            "riscv64" => Ok(Self::Riscv64),
            other => Err(Error::UnsupportedArch(other.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Arch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
