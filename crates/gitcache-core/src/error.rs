use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A version-control command failed for a reason other than "differences found".
    #[error("vcs query failed: {command}: {message}")]
    VcsQuery { command: String, message: String },

    /// The repository (or the path) has no revision yet.
    #[error("no revision found for {scope}")]
    NoRevision { scope: String },

    /// A status entry did not have the expected `XY path` shape.
    #[error("unrecognized status line: {line:?}")]
    UnrecognizedStatus { line: String },

    /// The sidecar metadata file exists but could not be read or parsed.
    #[error("metadata io error at {}: {source}", path.display())]
    MetadataIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An entry vanished or became unreadable while hashing a tree.
    #[error("hash computation failed at {}: {source}", path.display())]
    HashComputation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid revision id: {0:?}")]
    InvalidRevision(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The external compiler or packager reported a failure.
    #[error("{stage} failed: {message}")]
    Build { stage: String, message: String },
}

impl Error {
    pub fn vcs(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::VcsQuery {
            command: command.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for the variants callers may treat as a version-control failure.
    pub fn is_vcs(&self) -> bool {
        matches!(
            self,
            Self::VcsQuery { .. } | Self::NoRevision { .. } | Self::UnrecognizedStatus { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
