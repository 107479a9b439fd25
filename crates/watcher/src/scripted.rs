//! Scripted in-memory change source
//!
//! Implements [`ChangeApi`] without touching the OS: opens, reads and
//! completions follow a script set up per path, and every handle handed
//! out is tracked so leaks can be detected. This drives the full session
//! lifecycle on any platform.

use crate::api::{ChangeApi, Completion, ReadParams};
use crate::buffer::NotifyBuffer;
use crate::handle::{HandleKind, OwnedHandle};
use ahash::AHashMap;
use dirwatch_core::{CanonicalPath, ChangeAction, RecordWriter};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handles currently open across all scripted sources
static LIVE_HANDLES: Mutex<Vec<u64>> = parking_lot::const_mutex(Vec::new());

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Handle kind of the scripted source; raw values are opaque ids
#[derive(Debug)]
pub enum ScriptedHandle {}

impl HandleKind for ScriptedHandle {
    type Raw = u64;
    const INVALID: u64 = 0;

    fn is_valid(raw: u64) -> bool {
        raw != 0
    }

    unsafe fn close(raw: u64) {
        LIVE_HANDLES.lock().retain(|id| *id != raw);
    }
}

/// What the next poll of a path reports
#[derive(Debug, Clone)]
pub enum ScriptedResult {
    /// Still in flight
    Pending,
    /// Raw notification bytes; reported as zero bytes if they do not fit
    Records(Vec<u8>),
    /// Completed with zero bytes
    ZeroBytes,
    /// Record buffer overflow
    Overflow,
    /// Completion failure of the given kind
    Error(io::ErrorKind),
}

impl ScriptedResult {
    /// Encode `(action, name)` pairs into one notification buffer
    pub fn records(records: &[(ChangeAction, &str)]) -> Self {
        let mut writer = RecordWriter::new();
        for (action, name) in records {
            writer.push(action.code(), name);
        }
        ScriptedResult::Records(writer.finish())
    }
}

/// Request block of the scripted source
#[derive(Debug, Default)]
pub struct ScriptedRequest {
    completion: u64,
    in_flight: bool,
}

#[derive(Debug, Default)]
struct ScriptState {
    open_failures: AHashMap<CanonicalPath, usize>,
    read_failures: AHashMap<CanonicalPath, usize>,
    results: AHashMap<CanonicalPath, VecDeque<ScriptedResult>>,
    fail_completion_events: bool,
    fail_resets: bool,

    dirs: AHashMap<u64, CanonicalPath>,
    handles: Vec<u64>,
    opens: AHashMap<CanonicalPath, usize>,
    reads: AHashMap<CanonicalPath, usize>,
    resets: usize,
    cancels: usize,
}

/// Cloneable scripted backend; clones share one script
#[derive(Debug, Clone, Default)]
pub struct ScriptedApi {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` opens of `path` fail
    pub fn fail_opens(&self, path: &Path, count: usize) {
        *self
            .state
            .lock()
            .open_failures
            .entry(CanonicalPath::from_path(path))
            .or_default() += count;
    }

    /// Make the next `count` reads issued for `path` fail
    pub fn fail_reads(&self, path: &Path, count: usize) {
        *self
            .state
            .lock()
            .read_failures
            .entry(CanonicalPath::from_path(path))
            .or_default() += count;
    }

    /// Queue the result of a future poll of `path`
    ///
    /// Polls beyond the queued results report [`ScriptedResult::Pending`].
    pub fn push_result(&self, path: &Path, result: ScriptedResult) {
        self.state
            .lock()
            .results
            .entry(CanonicalPath::from_path(path))
            .or_default()
            .push_back(result);
    }

    pub fn fail_completion_events(&self, fail: bool) {
        self.state.lock().fail_completion_events = fail;
    }

    pub fn fail_resets(&self, fail: bool) {
        self.state.lock().fail_resets = fail;
    }

    /// Successful opens of `path` so far
    pub fn open_count(&self, path: &Path) -> usize {
        let state = self.state.lock();
        state
            .opens
            .get(&CanonicalPath::from_path(path))
            .copied()
            .unwrap_or(0)
    }

    /// Successfully issued reads for `path` so far
    pub fn read_count(&self, path: &Path) -> usize {
        let state = self.state.lock();
        state
            .reads
            .get(&CanonicalPath::from_path(path))
            .copied()
            .unwrap_or(0)
    }

    pub fn reset_count(&self) -> usize {
        self.state.lock().resets
    }

    pub fn cancel_count(&self) -> usize {
        self.state.lock().cancels
    }

    /// Handles from this source that have not been closed yet
    pub fn live_handles(&self) -> usize {
        let state = self.state.lock();
        let live = LIVE_HANDLES.lock();
        state.handles.iter().filter(|id| live.contains(id)).count()
    }

    fn new_handle(state: &mut ScriptState) -> OwnedHandle<ScriptedHandle> {
        let id = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
        LIVE_HANDLES.lock().push(id);
        state.handles.push(id);
        // SAFETY: the id was just minted and is owned by nobody else.
        unsafe { OwnedHandle::from_raw(id) }
    }

    fn path_of(state: &ScriptState, dir: &OwnedHandle<ScriptedHandle>) -> io::Result<CanonicalPath> {
        state
            .dirs
            .get(&dir.as_raw())
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "unknown directory handle"))
    }
}

fn take_failure(counts: &mut AHashMap<CanonicalPath, usize>, path: &CanonicalPath) -> bool {
    match counts.get_mut(path) {
        Some(remaining) if *remaining > 0 => {
            *remaining -= 1;
            true
        }
        _ => false,
    }
}

impl ChangeApi for ScriptedApi {
    type Handle = ScriptedHandle;
    type Request = ScriptedRequest;

    fn open_directory(&self, path: &CanonicalPath) -> io::Result<OwnedHandle<ScriptedHandle>> {
        let mut state = self.state.lock();

        if take_failure(&mut state.open_failures, path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "The system cannot find the path specified.",
            ));
        }

        let handle = Self::new_handle(&mut state);
        state.dirs.insert(handle.as_raw(), path.clone());
        *state.opens.entry(path.clone()).or_default() += 1;
        Ok(handle)
    }

    fn create_completion(&self) -> io::Result<OwnedHandle<ScriptedHandle>> {
        let mut state = self.state.lock();

        if state.fail_completion_events {
            return Err(io::Error::new(
                io::ErrorKind::OutOfMemory,
                "Not enough memory resources are available to process this command.",
            ));
        }

        Ok(Self::new_handle(&mut state))
    }

    fn bind_request(&self, completion: &OwnedHandle<ScriptedHandle>) -> ScriptedRequest {
        ScriptedRequest {
            completion: completion.as_raw(),
            in_flight: false,
        }
    }

    unsafe fn read_changes(
        &self,
        dir: &OwnedHandle<ScriptedHandle>,
        _buffer: &mut NotifyBuffer,
        request: &mut ScriptedRequest,
        _params: ReadParams,
    ) -> io::Result<()> {
        let mut state = self.state.lock();
        let path = Self::path_of(&state, dir)?;

        if take_failure(&mut state.read_failures, &path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "Access is denied.",
            ));
        }

        debug_assert!(!request.in_flight, "read issued while another is in flight");
        debug_assert_ne!(request.completion, 0, "request bound to no completion object");
        request.in_flight = true;
        *state.reads.entry(path).or_default() += 1;
        Ok(())
    }

    fn poll(
        &self,
        dir: &OwnedHandle<ScriptedHandle>,
        request: &mut ScriptedRequest,
        buffer: &mut NotifyBuffer,
    ) -> Completion {
        let mut state = self.state.lock();
        let path = match Self::path_of(&state, dir) {
            Ok(path) => path,
            Err(e) => return Completion::Failed(e),
        };

        let next = state
            .results
            .get_mut(&path)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(ScriptedResult::Pending);

        let completion = match next {
            ScriptedResult::Pending => return Completion::Pending,
            ScriptedResult::Records(bytes) if bytes.len() > buffer.len() => Completion::Ready(0),
            ScriptedResult::Records(bytes) => {
                buffer.as_mut_bytes()[..bytes.len()].copy_from_slice(&bytes);
                Completion::Ready(bytes.len() as u32)
            }
            ScriptedResult::ZeroBytes => Completion::Ready(0),
            ScriptedResult::Overflow => Completion::Overflow,
            ScriptedResult::Error(kind) => {
                Completion::Failed(io::Error::new(kind, "scripted completion failure"))
            }
        };

        request.in_flight = false;
        completion
    }

    fn reset_completion(&self, _completion: &OwnedHandle<ScriptedHandle>) -> io::Result<()> {
        let mut state = self.state.lock();
        state.resets += 1;

        if state.fail_resets {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "The handle is invalid."));
        }
        Ok(())
    }

    fn cancel(&self, _dir: &OwnedHandle<ScriptedHandle>, request: &mut ScriptedRequest) {
        if request.in_flight {
            self.state.lock().cancels += 1;
            request.in_flight = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_tracked_until_closed() {
        let api = ScriptedApi::new();
        let path = CanonicalPath::from_path(Path::new("scripted-dir"));

        let dir = api.open_directory(&path).unwrap();
        let event = api.create_completion().unwrap();
        assert_eq!(api.live_handles(), 2);
        assert_eq!(api.open_count(Path::new("scripted-dir")), 1);

        drop(dir);
        assert_eq!(api.live_handles(), 1);
        drop(event);
        assert_eq!(api.live_handles(), 0);
    }

    #[test]
    fn test_scripted_open_failures_run_out() {
        let api = ScriptedApi::new();
        api.fail_opens(Path::new("flaky"), 2);
        let path = CanonicalPath::from_path(Path::new("flaky"));

        assert!(api.open_directory(&path).is_err());
        assert!(api.open_directory(&path).is_err());
        assert!(api.open_directory(&path).is_ok());
    }

    #[test]
    fn test_oversized_records_report_zero_bytes() {
        let api = ScriptedApi::new();
        let path = CanonicalPath::from_path(Path::new("small"));
        api.push_result(
            Path::new("small"),
            ScriptedResult::records(&[(ChangeAction::Added, "a-rather-long-file-name.txt")]),
        );

        let dir = api.open_directory(&path).unwrap();
        let event = api.create_completion().unwrap();
        let mut request = api.bind_request(&event);
        let mut buffer = NotifyBuffer::new(16).unwrap();
        let params = ReadParams { notify_mask: 0x73, recursive: true };

        unsafe { api.read_changes(&dir, &mut buffer, &mut request, params) }.unwrap();
        assert!(matches!(api.poll(&dir, &mut request, &mut buffer), Completion::Ready(0)));
    }
}
