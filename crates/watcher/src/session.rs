//! Per-path watch session
//!
//! A session owns everything one monitored directory needs: the directory
//! handle, the completion event, the notification buffer and the request
//! block. At most one read is outstanding at any time.

use crate::api::{ChangeApi, Completion, ReadParams};
use crate::buffer::NotifyBuffer;
use crate::handle::OwnedHandle;
use dirwatch_core::{decode, CanonicalPath, ChangeEvent, WatchConfig, WatchError};
use tracing::{debug, error, trace, warn};

/// How an outstanding read finished
#[derive(Debug)]
pub enum Completed {
    /// Records were decoded
    Changes(Vec<ChangeEvent>),
    /// Zero bytes returned: not even one record fitted
    BufferTooSmall,
    /// Records were dropped by the OS
    Overflow,
}

/// Result of one poll
#[derive(Debug, Default)]
pub struct PollOutcome {
    /// Set when the outstanding read finished this tick
    pub completed: Option<Completed>,
    /// Set when the session can no longer be used and must be evicted
    pub failure: Option<WatchError>,
}

impl PollOutcome {
    pub fn is_pending(&self) -> bool {
        self.completed.is_none() && self.failure.is_none()
    }

    pub fn should_evict(&self) -> bool {
        self.failure.is_some()
    }
}

/// Live state of one watched directory
pub struct WatchSession<A: ChangeApi> {
    api: A,
    path: CanonicalPath,
    dir: OwnedHandle<A::Handle>,
    completion: OwnedHandle<A::Handle>,
    request: A::Request,
    buffer: NotifyBuffer,
    params: ReadParams,
    outstanding: bool,
    bytes_returned: u32,
}

impl<A: ChangeApi> WatchSession<A> {
    /// Open `path` and issue the first read
    ///
    /// Open and issue failures are path-recoverable; buffer and completion
    /// object failures are fatal.
    pub fn initialize(api: A, path: CanonicalPath, config: &WatchConfig) -> Result<Self, WatchError> {
        debug!("Initializing watch session for {}", path);

        let dir = api.open_directory(&path).map_err(|source| WatchError::Open {
            path: path.to_string(),
            source,
        })?;
        trace!("Opened {} as {:?}", path, dir);

        let buffer = NotifyBuffer::new(config.buffer_bytes())?;

        let completion = api
            .create_completion()
            .map_err(|source| WatchError::CreateCompletion {
                path: path.to_string(),
                source,
            })?;
        let request = api.bind_request(&completion);

        let mut session = Self {
            api,
            path,
            dir,
            completion,
            request,
            buffer,
            params: ReadParams {
                notify_mask: config.notify_mask(),
                recursive: config.recursive,
            },
            outstanding: false,
            bytes_returned: 0,
        };

        session.issue()?;
        Ok(session)
    }

    pub fn path(&self) -> &CanonicalPath {
        &self.path
    }

    /// Whether a read is currently in flight
    pub fn is_outstanding(&self) -> bool {
        self.outstanding
    }

    /// Byte count reported by the last completed read
    pub fn bytes_returned(&self) -> u32 {
        self.bytes_returned
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Check the outstanding read and, once it finished, rearm it
    ///
    /// Returns `Err` only for fatal errors. Failures confined to this path
    /// are reported in [`PollOutcome::failure`].
    pub fn poll(&mut self) -> Result<PollOutcome, WatchError> {
        debug_assert!(self.outstanding, "polled a session without a request");

        let completed = match self.api.poll(&self.dir, &mut self.request, &mut self.buffer) {
            Completion::Pending => {
                trace!("I/O incomplete for {}", self.path);
                return Ok(PollOutcome::default());
            }
            Completion::Failed(source) => {
                self.outstanding = false;
                let failure = WatchError::Completion {
                    path: self.path.to_string(),
                    source,
                };
                warn!("{}", failure);
                return Ok(PollOutcome {
                    completed: None,
                    failure: Some(failure),
                });
            }
            Completion::Overflow => {
                self.outstanding = false;
                warn!(
                    "Notification buffer overflow for {}; changes since the last read were lost",
                    self.path
                );
                Completed::Overflow
            }
            Completion::Ready(0) => {
                self.outstanding = false;
                self.bytes_returned = 0;
                warn!(
                    "Notification buffer for {} is too small ({} bytes)",
                    self.path,
                    self.buffer.len()
                );
                Completed::BufferTooSmall
            }
            Completion::Ready(bytes) => {
                self.outstanding = false;
                self.bytes_returned = bytes;
                debug!("Read returned {} bytes for {}", bytes, self.path);
                Completed::Changes(self.decode())
            }
        };

        self.reset()?;

        let failure = match self.issue() {
            Ok(()) => None,
            Err(e) => {
                warn!("{}", e);
                Some(e)
            }
        };

        Ok(PollOutcome {
            completed: Some(completed),
            failure,
        })
    }

    fn decode(&self) -> Vec<ChangeEvent> {
        let mut events = Vec::new();

        for result in decode(self.buffer.as_bytes(), self.bytes_returned as usize, &self.path) {
            match result {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!("Discarding rest of notification buffer for {}: {}", self.path, e);
                    break;
                }
            }
        }

        events
    }

    fn reset(&mut self) -> Result<(), WatchError> {
        self.api
            .reset_completion(&self.completion)
            .map_err(|source| {
                let e = WatchError::ResetCompletion {
                    path: self.path.to_string(),
                    source,
                };
                error!("{}", e);
                e
            })?;
        trace!("Completion event reset for {}", self.path);
        Ok(())
    }

    fn issue(&mut self) -> Result<(), WatchError> {
        debug!("Issuing read for {}", self.path);

        // SAFETY: buffer and request belong to this session and are never
        // reallocated; Drop cancels an outstanding read before they are
        // released.
        unsafe {
            self.api
                .read_changes(&self.dir, &mut self.buffer, &mut self.request, self.params)
        }
        .map_err(|source| WatchError::IssueRead {
            path: self.path.to_string(),
            source,
        })?;

        self.outstanding = true;
        Ok(())
    }
}

impl<A: ChangeApi> Drop for WatchSession<A> {
    fn drop(&mut self) {
        if self.outstanding {
            debug!("Cancelling outstanding read for {}", self.path);
            self.api.cancel(&self.dir, &mut self.request);
            self.outstanding = false;
        }
        trace!("Releasing watch session for {}", self.path);
    }
}

impl<A: ChangeApi> std::fmt::Debug for WatchSession<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSession")
            .field("path", &self.path)
            .field("outstanding", &self.outstanding)
            .field("bytes_returned", &self.bytes_returned)
            .field("buffer", &self.buffer)
            .finish()
    }
}
