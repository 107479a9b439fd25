//! Directory change watching for dirwatch
//!
//! This crate provides the asynchronous watch engine:
//! - Owned native handles and notification buffers
//! - Per-path watch sessions with one outstanding read each
//! - A single-threaded polling loop with cooperative shutdown
//! - The `ReadDirectoryChangesW` change source (Windows only)
//! - A scripted change source that runs the same engine anywhere

pub mod api;
pub mod buffer;
pub mod filter;
pub mod handle;
pub mod handler;
pub mod monitor;
pub mod platform;
pub mod registry;
pub mod scripted;
pub mod session;

// Re-exports
pub use api::{ChangeApi, Completion, ReadParams};
pub use buffer::NotifyBuffer;
pub use filter::EventFilter;
pub use handle::{HandleKind, OwnedHandle};
pub use handler::EventHandler;
pub use monitor::{DirectoryMonitor, ShutdownHandle, TickStats};
pub use registry::SessionRegistry;
pub use session::{Completed, PollOutcome, WatchSession};

#[cfg(windows)]
pub use platform::Win32Api;

/// Monitor backed by `ReadDirectoryChangesW`
#[cfg(windows)]
pub type WindowsMonitor<H> = DirectoryMonitor<Win32Api, H>;
