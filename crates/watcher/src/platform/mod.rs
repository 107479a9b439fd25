//! Platform-specific change sources

#[cfg(windows)]
pub mod windows;

#[cfg(windows)]
pub use self::windows::{Win32Api, Win32Handle, Win32Request};
