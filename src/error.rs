use std::borrow::Cow;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Canonical error surface for pixvault-core.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error: {source}")]
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },

    #[error("Serialization error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Deserialization error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot validation failed: {reason}")]
    InvalidSnapshot { reason: Cow<'static, str> },

    #[error("Unsupported snapshot version {major}.{minor}")]
    UnsupportedVersion { major: u32, minor: u32 },

    #[error("Checksum mismatch while validating {context}")]
    ChecksumMismatch { context: &'static str },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: Cow<'static, str> },

    #[error("Invalid cursor: {reason}")]
    InvalidCursor { reason: Cow<'static, str> },

    #[error("Credentials were rejected by the upstream service")]
    AuthRejected,

    #[error("Transport failed: {reason}")]
    Transport { reason: Box<str> },

    #[error("Intern id space exhausted")]
    InternExhausted,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Record {id} was not found")]
    NotFound { id: u64 },
}

impl ArchiveError {
    pub(crate) fn snapshot(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidSnapshot {
            reason: reason.into(),
        }
    }

    /// True for the cooperative-cancellation outcome.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source, path: None }
    }
}

impl From<url::ParseError> for ArchiveError {
    fn from(value: url::ParseError) -> Self {
        Self::InvalidCursor {
            reason: value.to_string().into(),
        }
    }
}
