//! Exclude patterns for delivered events
//!
//! Patterns use gitignore syntax and are matched against the event path
//! relative to the watched directory it was reported under:
//! - `*.tmp` drops temp files at any depth
//! - `target/` drops everything below any `target` directory
//! - `!keep.tmp` re-includes a path excluded by an earlier pattern

use ahash::AHashMap;
use dirwatch_core::{CanonicalPath, ChangeEvent, WatchError};
use ignore::gitignore::{Gitignore, GitignoreBuilder};

/// Per-root exclude matchers
#[derive(Debug, Default)]
pub struct EventFilter {
    /// Only roots with at least one pattern have a matcher
    rules: AHashMap<CanonicalPath, Gitignore>,
    /// Some pattern only matches directories (`target/`)
    check_dirs: bool,
}

impl EventFilter {
    /// Build matchers for every root from the same pattern list
    pub fn new(roots: &[CanonicalPath], patterns: &[String]) -> Result<Self, WatchError> {
        let mut rules = AHashMap::new();
        if patterns.is_empty() {
            return Ok(Self::default());
        }

        for root in roots {
            let mut builder = GitignoreBuilder::new(root.as_path());
            for pattern in patterns {
                builder.add_line(None, pattern).map_err(|e| {
                    WatchError::InvalidConfig(format!("bad exclude pattern '{}': {}", pattern, e))
                })?;
            }
            let matcher = builder
                .build()
                .map_err(|e| WatchError::InvalidConfig(format!("bad exclude patterns: {}", e)))?;
            rules.insert(root.clone(), matcher);
        }

        let check_dirs = patterns
            .iter()
            .any(|pattern| pattern.trim_end().ends_with('/'));

        Ok(Self { rules, check_dirs })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Check if an event reported under `root` should be dropped
    pub fn should_skip(&self, root: &CanonicalPath, event: &ChangeEvent) -> bool {
        let Some(matcher) = self.rules.get(root) else {
            return false;
        };

        let path = event.path();
        let relative = match path.strip_prefix(root.as_path()) {
            Ok(relative) if !relative.as_os_str().is_empty() => relative,
            _ => return false,
        };

        // Only directory patterns need a stat; removed entries match as files
        let is_dir = self.check_dirs && path.is_dir();

        matcher
            .matched_path_or_any_parents(relative, is_dir)
            .is_ignore()
    }

    /// Drop excluded events in place, returning how many were dropped
    pub fn retain(&self, root: &CanonicalPath, events: &mut Vec<ChangeEvent>) -> usize {
        if self.is_empty() {
            return 0;
        }

        let before = events.len();
        events.retain(|event| !self.should_skip(root, event));
        before - events.len()
    }
}
