//! Source Registry (`spec.md` §4.2): known upstream media sources keyed
//! by a stable identifier, with name/alias lookup and a URL resolver.
//!
//! Generalizes the teacher's path-keyed `MountRegistry` (`mount.rs`) to
//! UUID-keyed sources resolved by name, id, or alias rather than by
//! exact URI path.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::auth::{AuthScheme, Credential};
use crate::collab::{SourceBackend, StubSourceBackend};
use crate::error::{Result, RtspError};
use crate::protocol::sdp::SessionDescription;
use crate::session::transport::SourceTransportContext;

/// Lifecycle state of a [`Source`] (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Stopped,
    Starting,
    Started,
    Faulted,
}

/// One pullable upstream media producer, made available under a logical
/// name.
pub struct Source {
    id: Uuid,
    name: String,
    aliases: RwLock<Vec<String>>,
    state: RwLock<SourceState>,
    /// `Started` AND first media received.
    ready: AtomicBool,
    description: RwLock<Option<SessionDescription>>,
    contexts: RwLock<Vec<SourceTransportContext>>,
    credential: Option<Credential>,
    auth_scheme: AuthScheme,
    force_tcp: AtomicBool,
    backend: Mutex<Box<dyn SourceBackend>>,
}

impl Source {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            aliases: RwLock::new(Vec::new()),
            state: RwLock::new(SourceState::Stopped),
            ready: AtomicBool::new(false),
            description: RwLock::new(None),
            contexts: RwLock::new(Vec::new()),
            credential: None,
            auth_scheme: AuthScheme::None,
            force_tcp: AtomicBool::new(false),
            backend: Mutex::new(Box::new(StubSourceBackend::new())),
        }
    }

    pub fn with_aliases(self, aliases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        *self.aliases.write() = aliases.into_iter().map(|a| a.into().to_ascii_lowercase()).collect();
        self
    }

    pub fn with_credential(mut self, scheme: AuthScheme, credential: Credential) -> Self {
        self.auth_scheme = scheme;
        self.credential = Some(credential);
        self
    }

    pub fn with_force_tcp(self, force: bool) -> Self {
        self.force_tcp.store(force, Ordering::SeqCst);
        self
    }

    pub fn with_backend(self, backend: Box<dyn SourceBackend>) -> Self {
        *self.backend.lock() = backend;
        self
    }

    pub fn with_description(self, description: SessionDescription) -> Self {
        *self.description.write() = Some(description);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> Vec<String> {
        self.aliases.read().clone()
    }

    pub fn state(&self) -> SourceState {
        *self.state.read()
    }

    pub fn ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn force_tcp(&self) -> bool {
        self.force_tcp.load(Ordering::SeqCst)
    }

    pub fn auth_scheme(&self) -> AuthScheme {
        self.auth_scheme
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn description(&self) -> Option<SessionDescription> {
        self.description.read().clone()
    }

    /// Snapshot of the source's per-track transport state.
    pub fn transport_contexts(&self) -> Vec<SourceTransportContext> {
        self.contexts.read().clone()
    }

    pub fn set_transport_contexts(&self, contexts: Vec<SourceTransportContext>) {
        *self.contexts.write() = contexts;
    }

    /// Mark media as having been received at least once, making the
    /// source eligible for DESCRIBE/SETUP/PLAY.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Start the source's upstream connection (`spec.md` §4.2: invoked
    /// immediately by `SourceRegistry::add` when the server is
    /// listening).
    pub fn start(&self) -> Result<()> {
        *self.state.write() = SourceState::Starting;
        match self.backend.lock().start() {
            Ok(()) => {
                *self.state.write() = SourceState::Started;
                tracing::info!(source = %self.name, id = %self.id, "source started");
                Ok(())
            }
            Err(err) => {
                *self.state.write() = SourceState::Faulted;
                tracing::warn!(source = %self.name, error = %err, "source failed to start");
                Err(err)
            }
        }
    }

    pub fn stop(&self) {
        self.backend.lock().stop();
        self.ready.store(false, Ordering::SeqCst);
        *self.state.write() = SourceState::Stopped;
        tracing::info!(source = %self.name, id = %self.id, "source stopped");
    }

    /// Restart used by the Maintenance loop when a `Started` source has
    /// never become `Ready`.
    pub fn restart(&self) {
        self.stop();
        let _ = self.start();
    }

    /// Case-insensitive match against name, stringified id, or any alias
    /// (`spec.md` §4.2).
    fn matches_key(&self, key: &str) -> bool {
        let key = key.to_ascii_lowercase();
        self.name.to_ascii_lowercase() == key
            || self.id.to_string() == key
            || self.aliases.read().iter().any(|a| a == &key)
    }
}

/// Registry of known sources, keyed by stable [`Uuid`].
#[derive(Clone)]
pub struct SourceRegistry {
    sources: Arc<RwLock<HashMap<Uuid, Arc<Source>>>>,
    listening: Arc<AtomicBool>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Arc::new(RwLock::new(HashMap::new())),
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Mark the registry as belonging to a listening server: sources
    /// added from this point on are started immediately.
    pub fn set_listening(&self, listening: bool) {
        self.listening.store(listening, Ordering::SeqCst);
    }

    /// Register a source. Fails with [`RtspError::AlreadyPresent`] if
    /// its id already exists; starts it immediately if the server is
    /// Listening (`spec.md` §4.2).
    pub fn add(&self, source: Arc<Source>) -> Result<Arc<Source>> {
        {
            let mut sources = self.sources.write();
            if sources.contains_key(&source.id()) {
                return Err(RtspError::AlreadyPresent(source.id().to_string()));
            }
            sources.insert(source.id(), source.clone());
        }
        if self.listening.load(Ordering::SeqCst) {
            let _ = source.start();
        }
        tracing::info!(source = %source.name(), id = %source.id(), "source registered");
        Ok(source)
    }

    /// Remove a source, optionally stopping it first. Returns whether a
    /// source was present.
    pub fn remove(&self, id: Uuid, stop: bool) -> bool {
        let removed = self.sources.write().remove(&id);
        match removed {
            Some(source) => {
                if stop {
                    source.stop();
                }
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<Source>> {
        self.sources.read().get(&id).cloned()
    }

    pub fn iter(&self) -> Vec<Arc<Source>> {
        self.sources.read().values().cloned().collect()
    }

    /// Resolve a request URI against `/live/<name-or-id>[/<track>]`.
    /// `archive` is recognised as a URL segment but always resolves to
    /// `None` (`spec.md` §4.2 explicitly stubs archive handling).
    pub fn resolve(&self, request_uri: &str) -> Option<Arc<Source>> {
        let path = strip_scheme_and_host(request_uri);
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        while let Some(segment) = segments.next() {
            match segment {
                "live" => {
                    let key = segments.next()?;
                    return self.resolve_key(key);
                }
                "archive" => {
                    return None;
                }
                _ => continue,
            }
        }
        None
    }

    fn resolve_key(&self, key: &str) -> Option<Arc<Source>> {
        self.sources
            .read()
            .values()
            .find(|s| s.matches_key(key))
            .cloned()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_scheme_and_host(uri: &str) -> &str {
    if let Some(after) = uri.strip_prefix("rtsp://").or_else(|| uri.strip_prefix("rtsps://")) {
        match after.find('/') {
            Some(slash) => &after[slash..],
            None => "",
        }
    } else {
        uri
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_by_name() {
        let registry = SourceRegistry::new();
        let source = Arc::new(Source::new("camera1"));
        registry.add(source.clone()).unwrap();

        let resolved = registry.resolve("rtsp://host/live/camera1/track1").unwrap();
        assert_eq!(resolved.id(), source.id());
    }

    #[test]
    fn resolve_by_id() {
        let registry = SourceRegistry::new();
        let source = Arc::new(Source::new("camera1"));
        registry.add(source.clone()).unwrap();

        let uri = format!("rtsp://host/live/{}", source.id());
        assert!(registry.resolve(&uri).is_some());
    }

    #[test]
    fn resolve_by_alias_case_insensitive() {
        let registry = SourceRegistry::new();
        let source = Arc::new(Source::new("camera1").with_aliases(["Front-Door"]));
        registry.add(source.clone()).unwrap();

        assert!(registry.resolve("rtsp://host/live/front-door").is_some());
        assert!(registry.resolve("rtsp://host/live/FRONT-DOOR").is_some());
    }

    #[test]
    fn archive_segment_is_a_stub() {
        let registry = SourceRegistry::new();
        let source = Arc::new(Source::new("camera1"));
        registry.add(source).unwrap();
        assert!(registry.resolve("rtsp://host/archive/camera1").is_none());
    }

    #[test]
    fn unknown_key_resolves_to_none() {
        let registry = SourceRegistry::new();
        assert!(registry.resolve("rtsp://host/live/nope").is_none());
    }

    #[test]
    fn add_duplicate_id_fails() {
        let registry = SourceRegistry::new();
        let source = Arc::new(Source::new("camera1"));
        registry.add(source.clone()).unwrap();
        assert!(registry.add(source).is_err());
    }

    #[test]
    fn add_while_listening_starts_source() {
        let registry = SourceRegistry::new();
        registry.set_listening(true);
        let source = Arc::new(Source::new("camera1"));
        registry.add(source.clone()).unwrap();
        assert_eq!(source.state(), SourceState::Started);
    }

    #[test]
    fn remove_returns_whether_present() {
        let registry = SourceRegistry::new();
        let source = Arc::new(Source::new("camera1"));
        let id = source.id();
        registry.add(source).unwrap();
        assert!(registry.remove(id, true));
        assert!(!registry.remove(id, true));
    }
}
