//! The watch loop
//!
//! One thread drives every watched directory. Each tick it walks the
//! monitored paths in order, lazily opens sessions that are missing,
//! polls outstanding reads without blocking, delivers decoded events and
//! rearms the reads. Sessions that fail are evicted and re-opened on a
//! later tick; only fatal errors stop the loop.

use crate::api::ChangeApi;
use crate::filter::EventFilter;
use crate::handler::EventHandler;
use crate::registry::SessionRegistry;
use crate::session::{Completed, WatchSession};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use dirwatch_core::{CanonicalPath, WatchConfig, WatchError};
use std::path::Path;
use tracing::{debug, error, info, trace, warn};

/// Counters for one tick
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickStats {
    /// Sessions opened this tick
    pub initialized: usize,
    /// Paths that could not be opened or armed
    pub init_failures: usize,
    /// Sessions whose read is still in flight
    pub pending: usize,
    /// Events handed to the handler
    pub delivered: usize,
    /// Events dropped by exclude patterns
    pub excluded: usize,
    /// Overflowed reads
    pub overflows: usize,
    /// Reads that returned zero bytes
    pub too_small: usize,
    /// Sessions evicted for re-initialization
    pub evicted: usize,
}

/// Requests a running [`DirectoryMonitor`] to stop
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Sender<()>,
}

impl ShutdownHandle {
    /// Stop the loop before its next tick
    pub fn shutdown(&self) {
        let _ = self.tx.send(());
    }
}

/// Watches a fixed set of directories through a [`ChangeApi`]
pub struct DirectoryMonitor<A: ChangeApi, H: EventHandler> {
    api: A,
    config: WatchConfig,
    paths: Vec<CanonicalPath>,
    registry: SessionRegistry<A>,
    filter: EventFilter,
    handler: H,
    shutdown_tx: Sender<()>,
    shutdown_rx: Receiver<()>,
}

impl<A: ChangeApi, H: EventHandler> std::fmt::Debug for DirectoryMonitor<A, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryMonitor")
            .field("paths", &self.paths)
            .field("sessions", &self.registry.len())
            .field("config", &self.config)
            .finish()
    }
}

impl<A: ChangeApi, H: EventHandler> DirectoryMonitor<A, H> {
    /// Create a monitor; no directory is opened until the first tick
    ///
    /// Duplicate paths are watched once, in first-seen order.
    pub fn new<I, P>(api: A, paths: I, handler: H, config: WatchConfig) -> Result<Self, WatchError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        config.validate()?;

        let mut canonical: Vec<CanonicalPath> = Vec::new();
        for path in paths {
            let path = CanonicalPath::from_path(path.as_ref());
            if !canonical.contains(&path) {
                canonical.push(path);
            }
        }

        let filter = EventFilter::new(&canonical, &config.exclude)?;
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::unbounded();

        Ok(Self {
            api,
            config,
            paths: canonical,
            registry: SessionRegistry::new(),
            filter,
            handler,
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    pub fn paths(&self) -> &[CanonicalPath] {
        &self.paths
    }

    pub fn registry(&self) -> &SessionRegistry<A> {
        &self.registry
    }

    /// Run until shut down or a fatal error occurs
    ///
    /// Sleeps for the configured latency before every tick. A shutdown
    /// request interrupts the sleep.
    pub fn run(&mut self) -> Result<(), WatchError> {
        info!(
            "Watching {} path(s) (latency: {:?}, buffer: {} bytes)",
            self.paths.len(),
            self.config.latency(),
            self.config.buffer_bytes()
        );

        loop {
            match self.shutdown_rx.recv_timeout(self.config.latency()) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }

            if let Err(e) = self.tick() {
                error!("Watch stopped by fatal error: {}", e);
                return Err(e);
            }
        }

        info!("Watch stopped");
        self.registry.clear();
        Ok(())
    }

    /// Visit every monitored path once
    ///
    /// A fatal error evicts the session it came from, so calling `tick`
    /// again retries that path from scratch.
    pub fn tick(&mut self) -> Result<TickStats, WatchError> {
        let mut stats = TickStats::default();

        for path in &self.paths {
            trace!("Processing {}", path);

            if !self.registry.contains(path) {
                debug!("Initializing search structures for {}", path);
                match WatchSession::initialize(self.api.clone(), path.clone(), &self.config) {
                    Ok(session) => {
                        self.registry.insert(session);
                        stats.initialized += 1;
                    }
                    Err(e) if e.is_fatal() => {
                        error!("{}", e);
                        return Err(e);
                    }
                    Err(e) => {
                        warn!("{}", e);
                        stats.init_failures += 1;
                        continue;
                    }
                }
            }

            let Some(session) = self.registry.get_mut(path) else {
                continue;
            };

            let outcome = match session.poll() {
                Ok(outcome) => outcome,
                Err(e) => {
                    // Never leave a session without a read in the registry
                    self.registry.remove(path);
                    return Err(e);
                }
            };
            if outcome.is_pending() {
                stats.pending += 1;
                continue;
            }

            match outcome.completed {
                Some(Completed::Changes(mut events)) => {
                    stats.excluded += self.filter.retain(path, &mut events);
                    if !events.is_empty() {
                        stats.delivered += events.len();
                        self.handler.handle_events(events);
                    }
                }
                Some(Completed::Overflow) => stats.overflows += 1,
                Some(Completed::BufferTooSmall) => stats.too_small += 1,
                None => {}
            }

            if outcome.failure.is_some() {
                debug!("Evicting session for {}", path);
                self.registry.remove(path);
                stats.evicted += 1;
            }
        }

        Ok(stats)
    }
}
