//! Core types for dirwatch
//!
//! This crate provides the platform-independent half of the watch engine:
//! - Canonical (wide) path representation
//! - Change-flag table for native action codes
//! - Notification buffer decoder
//! - Error taxonomy and watch configuration

pub mod config;
pub mod error;
pub mod event;
pub mod flags;
pub mod path;
pub mod record;

// Re-export main types for convenience
pub use config::{ChangeFilter, WatchConfig};
pub use error::{ErrorKind, WatchError};
pub use event::ChangeEvent;
pub use flags::{decode_flags, ChangeAction, ChangeFlag, FlagSet};
pub use path::CanonicalPath;
pub use record::{decode, ChangeRecord, Changes, RecordWriter};

/// Common result type used throughout dirwatch
pub type Result<T> = std::result::Result<T, WatchError>;
