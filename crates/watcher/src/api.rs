//! Seam between the watch engine and the OS change-notification primitive
//!
//! The Win32 implementation lives in [`crate::platform`]; the scripted one
//! in [`crate::scripted`] replays canned results on any platform.

use crate::buffer::NotifyBuffer;
use crate::handle::{HandleKind, OwnedHandle};
use dirwatch_core::CanonicalPath;
use std::io;

/// Result of a non-blocking completion check
#[derive(Debug)]
pub enum Completion {
    /// Request still in flight (`ERROR_IO_INCOMPLETE`)
    Pending,
    /// Request finished; this many bytes were written to the buffer
    Ready(u32),
    /// Record buffer overflowed (`ERROR_NOTIFY_ENUM_DIR`); changes were lost
    Overflow,
    /// Any other failure, e.g. the watched directory was deleted
    Failed(io::Error),
}

/// Parameters of one asynchronous read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadParams {
    /// `FILE_NOTIFY_CHANGE_*` mask
    pub notify_mask: u32,
    /// Watch the whole subtree
    pub recursive: bool,
}

/// Asynchronous directory-change primitive
pub trait ChangeApi: Clone {
    type Handle: HandleKind;

    /// Per-session request state (the `OVERLAPPED` block on Windows)
    ///
    /// Must keep a stable address for the OS while a read is outstanding,
    /// even when the owning session is moved.
    type Request;

    /// Open a directory for asynchronous, shared (including delete) reads
    fn open_directory(&self, path: &CanonicalPath) -> io::Result<OwnedHandle<Self::Handle>>;

    /// Create a manual-reset, non-signaled completion object
    fn create_completion(&self) -> io::Result<OwnedHandle<Self::Handle>>;

    /// Build request state signalling `completion` when a read finishes
    fn bind_request(&self, completion: &OwnedHandle<Self::Handle>) -> Self::Request;

    /// Issue an asynchronous read into `buffer`
    ///
    /// # Safety
    /// `buffer` and `request` must stay alive, and `buffer` must not be
    /// reallocated, until [`ChangeApi::poll`] reports something other than
    /// [`Completion::Pending`] or [`ChangeApi::cancel`] returns.
    unsafe fn read_changes(
        &self,
        dir: &OwnedHandle<Self::Handle>,
        buffer: &mut NotifyBuffer,
        request: &mut Self::Request,
        params: ReadParams,
    ) -> io::Result<()>;

    /// Check the outstanding read without blocking
    ///
    /// `buffer` is the one the read was issued with.
    fn poll(
        &self,
        dir: &OwnedHandle<Self::Handle>,
        request: &mut Self::Request,
        buffer: &mut NotifyBuffer,
    ) -> Completion;

    /// Return the completion object to the non-signaled state
    fn reset_completion(&self, completion: &OwnedHandle<Self::Handle>) -> io::Result<()>;

    /// Cancel the outstanding read and wait until the OS lets go of it
    fn cancel(&self, dir: &OwnedHandle<Self::Handle>, request: &mut Self::Request);
}
