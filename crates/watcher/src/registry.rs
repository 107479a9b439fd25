//! Registry of live watch sessions

use crate::api::ChangeApi;
use crate::session::WatchSession;
use ahash::AHashMap;
use dirwatch_core::CanonicalPath;

/// Canonical path → session; a missing entry means the path is unwatched
///
/// Only the watch loop mutates the registry, so it needs no locking.
pub struct SessionRegistry<A: ChangeApi> {
    sessions: AHashMap<CanonicalPath, WatchSession<A>>,
}

impl<A: ChangeApi> SessionRegistry<A> {
    pub fn new() -> Self {
        Self {
            sessions: AHashMap::new(),
        }
    }

    pub fn contains(&self, path: &CanonicalPath) -> bool {
        self.sessions.contains_key(path)
    }

    pub fn get_mut(&mut self, path: &CanonicalPath) -> Option<&mut WatchSession<A>> {
        self.sessions.get_mut(path)
    }

    /// Register a freshly initialized session
    ///
    /// Returns the session previously registered for the same path, if any.
    pub fn insert(&mut self, session: WatchSession<A>) -> Option<WatchSession<A>> {
        self.sessions.insert(session.path().clone(), session)
    }

    /// Evict the session for `path`; dropping it releases its resources
    pub fn remove(&mut self, path: &CanonicalPath) -> Option<WatchSession<A>> {
        self.sessions.remove(path)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Number of sessions with a read in flight
    pub fn outstanding(&self) -> usize {
        self.sessions.values().filter(|s| s.is_outstanding()).count()
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }
}

impl<A: ChangeApi> Default for SessionRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedApi;
    use dirwatch_core::WatchConfig;
    use std::path::Path;

    fn session(api: &ScriptedApi, path: &str) -> WatchSession<ScriptedApi> {
        WatchSession::initialize(
            api.clone(),
            CanonicalPath::from_path(Path::new(path)),
            &WatchConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_insert_and_remove() {
        let api = ScriptedApi::new();
        let mut registry = SessionRegistry::new();
        let key = CanonicalPath::from_path(Path::new("one"));

        assert!(!registry.contains(&key));
        assert!(registry.insert(session(&api, "one")).is_none());
        assert!(registry.contains(&key));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.outstanding(), 1);

        let evicted = registry.remove(&key).unwrap();
        assert_eq!(evicted.path(), &key);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_clear_releases_every_session() {
        let api = ScriptedApi::new();
        let mut registry = SessionRegistry::new();
        registry.insert(session(&api, "one"));
        registry.insert(session(&api, "two"));

        // Directory handle + completion event per session
        assert_eq!(api.live_handles(), 4);

        registry.clear();
        assert_eq!(api.live_handles(), 0);
        assert_eq!(api.cancel_count(), 2);
    }
}
