//! Error taxonomy for the watch engine
//!
//! Every error carries a kind so the watch loop can tell "this path
//! failed" apart from "the whole watch must stop".

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// How far an error reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Terminates the watch loop
    Fatal,
    /// Confined to one path; its session is evicted and retried next tick
    PathRecoverable,
    /// No state change; deferred to the next tick
    Transient,
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to allocate {requested} byte notification buffer")]
    ResourceExhausted { requested: usize },

    #[error("failed to create completion event for {path}: {source}")]
    CreateCompletion { path: String, source: io::Error },

    #[error("failed to reset completion event for {path}: {source}")]
    ResetCompletion { path: String, source: io::Error },

    #[error("failed to open {path}: {source}")]
    Open { path: String, source: io::Error },

    #[error("ReadDirectoryChangesW failed for {path}: {source}")]
    IssueRead { path: String, source: io::Error },

    #[error("GetOverlappedResult failed for {path}: {source}")]
    Completion { path: String, source: io::Error },

    #[error("malformed notification record at offset {offset}")]
    MalformedRecord { offset: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read config {}: {source}", path.display())]
    ConfigIo { path: PathBuf, source: io::Error },
}

impl WatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WatchError::ResourceExhausted { .. }
            | WatchError::CreateCompletion { .. }
            | WatchError::ResetCompletion { .. }
            | WatchError::InvalidConfig(_)
            | WatchError::ConfigIo { .. } => ErrorKind::Fatal,
            WatchError::Open { .. }
            | WatchError::IssueRead { .. }
            | WatchError::Completion { .. } => ErrorKind::PathRecoverable,
            WatchError::MalformedRecord { .. } => ErrorKind::Transient,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }
}
