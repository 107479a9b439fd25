//! Watch configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid:
//! ```toml
//! latency_secs = 1.0
//! buffer_records = 128
//! recursive = true
//! filters = ["file_name", "dir_name", "last_write", "last_access", "creation"]
//! exclude = ["*.tmp", "target/"]
//! ```

use crate::error::WatchError;
use crate::record::NOTIFY_RECORD_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Largest buffer `ReadDirectoryChangesW` accepts for network shares
pub const MAX_BUFFER_BYTES: usize = 64 * 1024;

/// Change classes the OS should report (`FILE_NOTIFY_CHANGE_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeFilter {
    FileName,
    DirName,
    LastWrite,
    LastAccess,
    Creation,
}

impl ChangeFilter {
    pub const ALL: [ChangeFilter; 5] = [
        ChangeFilter::FileName,
        ChangeFilter::DirName,
        ChangeFilter::LastWrite,
        ChangeFilter::LastAccess,
        ChangeFilter::Creation,
    ];

    /// Native mask bit
    pub const fn mask(self) -> u32 {
        match self {
            ChangeFilter::FileName => 0x0000_0001,
            ChangeFilter::DirName => 0x0000_0002,
            ChangeFilter::LastWrite => 0x0000_0010,
            ChangeFilter::LastAccess => 0x0000_0020,
            ChangeFilter::Creation => 0x0000_0040,
        }
    }
}

/// Watch loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    /// Seconds to sleep between ticks
    pub latency_secs: f64,

    /// Notification buffer capacity, in records
    pub buffer_records: usize,

    /// Watch the whole subtree
    pub recursive: bool,

    /// Change classes to report
    pub filters: Vec<ChangeFilter>,

    /// Gitignore-style patterns, relative to each watched directory
    pub exclude: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            latency_secs: 1.0,
            buffer_records: 128,
            recursive: true,
            filters: ChangeFilter::ALL.to_vec(),
            exclude: Vec::new(),
        }
    }
}

impl WatchConfig {
    /// Parse from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, WatchError> {
        let config: WatchConfig =
            toml::from_str(text).map_err(|e| WatchError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self, WatchError> {
        let text = std::fs::read_to_string(path).map_err(|source| WatchError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), WatchError> {
        if !self.latency_secs.is_finite() || self.latency_secs <= 0.0 {
            return Err(WatchError::InvalidConfig(format!(
                "latency_secs must be a positive number of seconds, got {}",
                self.latency_secs
            )));
        }

        if let Err(e) = Duration::try_from_secs_f64(self.latency_secs) {
            return Err(WatchError::InvalidConfig(format!(
                "latency_secs = {} is out of range: {}",
                self.latency_secs, e
            )));
        }

        if self.buffer_records == 0 {
            return Err(WatchError::InvalidConfig(
                "buffer_records must be at least 1".to_string(),
            ));
        }

        if self.buffer_bytes() > MAX_BUFFER_BYTES {
            return Err(WatchError::InvalidConfig(format!(
                "buffer_records = {} needs {} bytes, limit is {}",
                self.buffer_records,
                self.buffer_bytes(),
                MAX_BUFFER_BYTES
            )));
        }

        if self.filters.is_empty() {
            return Err(WatchError::InvalidConfig(
                "filters must name at least one change class".to_string(),
            ));
        }

        Ok(())
    }

    pub fn latency(&self) -> Duration {
        Duration::from_secs_f64(self.latency_secs)
    }

    /// Notification buffer size in bytes
    pub fn buffer_bytes(&self) -> usize {
        self.buffer_records.saturating_mul(NOTIFY_RECORD_SIZE)
    }

    /// Combined `FILE_NOTIFY_CHANGE_*` mask
    pub fn notify_mask(&self) -> u32 {
        self.filters.iter().fold(0, |mask, f| mask | f.mask())
    }
}
