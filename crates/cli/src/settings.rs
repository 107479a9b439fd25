//! Watch settings from the config file and the command line

use anyhow::{bail, Context, Result};
use dirwatch_core::WatchConfig;
use std::path::{Path, PathBuf};

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub latency: Option<f64>,
    pub buffer_records: Option<usize>,
    pub no_recursive: bool,
    /// Appended to the file's exclude patterns
    pub exclude: Vec<String>,
}

impl Overrides {
    pub fn apply(&self, config: &mut WatchConfig) {
        if let Some(latency) = self.latency {
            config.latency_secs = latency;
        }
        if let Some(records) = self.buffer_records {
            config.buffer_records = records;
        }
        if self.no_recursive {
            config.recursive = false;
        }
        config.exclude.extend(self.exclude.iter().cloned());
    }
}

/// Load the config file (if any), apply overrides and validate the result
pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<WatchConfig> {
    let mut config = match path {
        Some(path) => WatchConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => WatchConfig::default(),
    };

    overrides.apply(&mut config);
    config.validate().context("Invalid watch settings")?;

    Ok(config)
}

/// Make every path absolute
///
/// Existing paths are canonicalized; paths that do not exist yet are
/// joined onto `cwd` so they can be picked up once they appear.
pub fn resolve_paths(paths: &[PathBuf], cwd: &Path) -> Result<Vec<PathBuf>> {
    if paths.is_empty() {
        bail!("No paths to watch");
    }

    Ok(paths.iter().map(|path| resolve_path(path, cwd)).collect())
}

fn resolve_path(path: &Path, cwd: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };

    match std::fs::canonicalize(&absolute) {
        Ok(canonical) => strip_verbatim(canonical),
        Err(_) => absolute,
    }
}

/// Drop the `\\?\` prefix canonicalize adds to local Windows paths
fn strip_verbatim(path: PathBuf) -> PathBuf {
    match path.to_str() {
        Some(s) if s.starts_with(r"\\?\") && !s.starts_with(r"\\?\UNC\") => PathBuf::from(&s[4..]),
        _ => path,
    }
}
