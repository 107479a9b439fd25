//! `ReadDirectoryChangesW` change source
//!
//! Handles are opened with `FILE_SHARE_DELETE`, so the watched directory
//! can be deleted or renamed by other processes while it is observed. Both
//! `ReadDirectoryChangesW` and `GetOverlappedResult` then fail (usually
//! with "Access is denied"), and the session is evicted and re-opened on a
//! later tick.

use crate::api::{ChangeApi, Completion, ReadParams};
use crate::buffer::NotifyBuffer;
use crate::handle::{HandleKind, OwnedHandle};
use dirwatch_core::CanonicalPath;
use std::io;
use std::ptr;
use tracing::{debug, trace};
use windows_sys::Win32::Foundation::{
    CloseHandle, ERROR_IO_INCOMPLETE, ERROR_NOTIFY_ENUM_DIR, FALSE, HANDLE,
    INVALID_HANDLE_VALUE, TRUE,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, ReadDirectoryChangesW, FILE_FLAG_BACKUP_SEMANTICS, FILE_FLAG_OVERLAPPED,
    FILE_LIST_DIRECTORY, FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};
use windows_sys::Win32::System::Threading::{CreateEventW, ResetEvent};
use windows_sys::Win32::System::IO::{CancelIoEx, GetOverlappedResult, OVERLAPPED};

/// Win32 `HANDLE`; both null and `INVALID_HANDLE_VALUE` are invalid
#[derive(Debug)]
pub enum Win32Handle {}

impl HandleKind for Win32Handle {
    type Raw = HANDLE;
    const INVALID: HANDLE = INVALID_HANDLE_VALUE;

    fn is_valid(raw: HANDLE) -> bool {
        raw != INVALID_HANDLE_VALUE && raw != 0
    }

    unsafe fn close(raw: HANDLE) {
        trace!("Closing handle {:#x}", raw);
        CloseHandle(raw);
    }
}

/// Heap-pinned `OVERLAPPED` block bound to a session's completion event
pub struct Win32Request(Box<OVERLAPPED>);

// SAFETY: the block is only touched by the thread that owns the session;
// the raw pointer inside OVERLAPPED is never dereferenced by us.
unsafe impl Send for Win32Request {}

/// Win32 implementation of [`ChangeApi`]
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32Api;

impl ChangeApi for Win32Api {
    type Handle = Win32Handle;
    type Request = Win32Request;

    fn open_directory(&self, path: &CanonicalPath) -> io::Result<OwnedHandle<Win32Handle>> {
        let wide = path.to_wide_nul();

        // SAFETY: `wide` is nul-terminated and outlives the call.
        let raw = unsafe {
            CreateFileW(
                wide.as_ptr(),
                FILE_LIST_DIRECTORY,
                FILE_SHARE_DELETE | FILE_SHARE_READ | FILE_SHARE_WRITE,
                ptr::null(),
                OPEN_EXISTING,
                FILE_FLAG_BACKUP_SEMANTICS | FILE_FLAG_OVERLAPPED,
                0,
            )
        };

        if !Win32Handle::is_valid(raw) {
            return Err(io::Error::last_os_error());
        }

        debug!("Opened {} as handle {:#x}", path, raw);
        // SAFETY: freshly returned by CreateFileW and owned by nobody else.
        Ok(unsafe { OwnedHandle::from_raw(raw) })
    }

    fn create_completion(&self) -> io::Result<OwnedHandle<Win32Handle>> {
        // Manual reset, initially non-signaled, unnamed
        // SAFETY: all pointer arguments are null, which CreateEventW accepts.
        let raw = unsafe { CreateEventW(ptr::null(), TRUE, FALSE, ptr::null()) };

        if raw == 0 {
            return Err(io::Error::last_os_error());
        }

        trace!("Created completion event {:#x}", raw);
        // SAFETY: freshly returned by CreateEventW and owned by nobody else.
        Ok(unsafe { OwnedHandle::from_raw(raw) })
    }

    fn bind_request(&self, completion: &OwnedHandle<Win32Handle>) -> Win32Request {
        // SAFETY: OVERLAPPED is plain data; all-zero is its documented
        // initial state.
        let mut overlapped: Box<OVERLAPPED> = Box::new(unsafe { std::mem::zeroed() });
        overlapped.hEvent = completion.as_raw();
        Win32Request(overlapped)
    }

    unsafe fn read_changes(
        &self,
        dir: &OwnedHandle<Win32Handle>,
        buffer: &mut NotifyBuffer,
        request: &mut Win32Request,
        params: ReadParams,
    ) -> io::Result<()> {
        trace!("ReadDirectoryChangesW on handle {:#x}", dir.as_raw());

        let ok = ReadDirectoryChangesW(
            dir.as_raw(),
            buffer.as_mut_ptr().cast(),
            buffer.len() as u32,
            if params.recursive { TRUE } else { FALSE },
            params.notify_mask,
            ptr::null_mut(),
            &mut *request.0,
            None,
        );

        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn poll(
        &self,
        dir: &OwnedHandle<Win32Handle>,
        request: &mut Win32Request,
        _buffer: &mut NotifyBuffer,
    ) -> Completion {
        let mut bytes = 0u32;

        // SAFETY: the request block belongs to a read issued on `dir`.
        let ok = unsafe { GetOverlappedResult(dir.as_raw(), &*request.0, &mut bytes, FALSE) };
        if ok != 0 {
            return Completion::Ready(bytes);
        }

        let err = io::Error::last_os_error();
        match err.raw_os_error().map(|code| code as u32) {
            Some(ERROR_IO_INCOMPLETE) => Completion::Pending,
            Some(ERROR_NOTIFY_ENUM_DIR) => Completion::Overflow,
            _ => Completion::Failed(err),
        }
    }

    fn reset_completion(&self, completion: &OwnedHandle<Win32Handle>) -> io::Result<()> {
        // SAFETY: `completion` is a live event handle.
        if unsafe { ResetEvent(completion.as_raw()) } == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn cancel(&self, dir: &OwnedHandle<Win32Handle>, request: &mut Win32Request) {
        if !dir.is_valid() {
            return;
        }

        let mut bytes = 0u32;
        // SAFETY: the request block stays alive until the blocking
        // GetOverlappedResult below confirms the kernel is done with it.
        unsafe {
            CancelIoEx(dir.as_raw(), &*request.0);
            GetOverlappedResult(dir.as_raw(), &*request.0, &mut bytes, TRUE);
        }
        trace!("Cancelled read on handle {:#x}", dir.as_raw());
    }
}
