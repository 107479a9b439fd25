//! Change events delivered to consumers

use crate::flags::{ChangeFlag, FlagSet};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// A decoded file system change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    /// Absolute path of the affected entry
    pub path: String,
    /// Semantic flags (empty for unrecognized actions)
    pub flags: FlagSet,
    /// When the record was decoded
    pub time: DateTime<Utc>,
}

impl ChangeEvent {
    /// Create an event stamped with the current time
    pub fn new(path: String, flags: FlagSet) -> Self {
        Self {
            path,
            flags,
            time: Utc::now(),
        }
    }

    pub fn path(&self) -> &Path {
        Path::new(&self.path)
    }

    pub fn has(&self, flag: ChangeFlag) -> bool {
        self.flags.contains(flag)
    }
}
