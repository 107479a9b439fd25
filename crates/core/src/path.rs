//! Canonical path representation
//!
//! Monitored directories are translated once, at startup, into the
//! OS-native wide form handed to the change-notification API. The UTF-8
//! form is kept alongside for logging and for building event paths.

use std::fmt;
use std::path::{Path, MAIN_SEPARATOR};

/// Immutable OS-native (UTF-16) form of a monitored directory
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalPath {
    /// Wide code units, without a terminator
    wide: Box<[u16]>,
    /// UTF-8 display form
    display: Box<str>,
}

impl CanonicalPath {
    /// Translate a native path into its canonical wide form
    pub fn from_path(path: &Path) -> Self {
        let display = path.to_string_lossy();

        #[cfg(windows)]
        let wide: Vec<u16> = {
            use std::os::windows::ffi::OsStrExt;
            path.as_os_str().encode_wide().collect()
        };

        #[cfg(not(windows))]
        let wide: Vec<u16> = display.encode_utf16().collect();

        Self {
            wide: wide.into_boxed_slice(),
            display: display.into_owned().into_boxed_str(),
        }
    }

    /// Wide code units (no terminator)
    pub fn as_wide(&self) -> &[u16] {
        &self.wide
    }

    /// Wide code units followed by a NUL, ready for Win32 calls
    pub fn to_wide_nul(&self) -> Vec<u16> {
        let mut wide = Vec::with_capacity(self.wide.len() + 1);
        wide.extend_from_slice(&self.wide);
        wide.push(0);
        wide
    }

    /// UTF-8 form of the path
    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// Path view of the UTF-8 form
    pub fn as_path(&self) -> &Path {
        Path::new(&*self.display)
    }

    /// Build the absolute path of an entry below this directory
    ///
    /// The separator is not doubled when the directory already ends in one
    /// (drive roots such as `C:\`).
    pub fn join_name(&self, name: &str) -> String {
        let mut joined = String::with_capacity(self.display.len() + 1 + name.len());
        joined.push_str(&self.display);
        if !joined.ends_with(&['\\', '/'][..]) {
            joined.push(MAIN_SEPARATOR);
        }
        joined.push_str(name);
        joined
    }
}

impl From<&Path> for CanonicalPath {
    fn from(path: &Path) -> Self {
        Self::from_path(path)
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl fmt::Debug for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CanonicalPath({:?})", self.display)
    }
}
