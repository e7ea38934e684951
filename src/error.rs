// src/error.rs

//! Error types for package emission
//!
//! A single error enum covers every failure class of the emit pipeline:
//! I/O, tree traversal, control rendering, cryptography and configuration.
//! Job-level failures are wrapped in [`Error::StageFailed`] so callers learn
//! which stage aborted the job.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage of a single package job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Scanning,
    DataArchiving,
    ControlComposing,
    Signing,
    Combining,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scanning => "scanning",
            Self::DataArchiving => "data-archiving",
            Self::ControlComposing => "control-composing",
            Self::Signing => "signing",
            Self::Combining => "combining",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced while emitting or inspecting packages
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Failed to traverse {path}: {source}")]
    Traversal {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Control record field '{0}' is not set")]
    MissingField(&'static str),

    #[error("Failed to load signing key {path}: {reason}")]
    KeyLoad { path: PathBuf, reason: String },

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unsupported architecture: {0}")]
    UnsupportedArch(String),

    #[error("Invalid source date epoch: {0}")]
    InvalidEpoch(String),

    #[error("Invalid package: {0}")]
    InvalidPackage(String),

    #[error("{what} mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        what: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("Package {package} failed during {stage}: {source}")]
    StageFailed {
        package: String,
        stage: Stage,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Stage that aborted the job, if this is a job-level failure
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_failed_display() {
        let err = Error::StageFailed {
            package: "hello".to_string(),
            stage: Stage::ControlComposing,
            source: Box::new(Error::MissingField("datahash")),
        };

        assert_eq!(err.stage(), Some(Stage::ControlComposing));
        let msg = err.to_string();
        assert!(msg.contains("hello"));
        assert!(msg.contains("control-composing"));
        assert!(msg.contains("datahash"));
    }

    #[test]
    fn test_plain_error_has_no_stage() {
        assert_eq!(Error::Signing("boom".to_string()).stage(), None);
    }
}
