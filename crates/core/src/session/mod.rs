//! RTSP session state machine (RFC 2326 §3, §12.37; `spec.md` §4.4).
//!
//! A `Session` is the server-side object for one connected RTSP client:
//! created on TCP accept / first UDP datagram / first HTTP tunnel POST,
//! registered on its first request, and destroyed by TEARDOWN, socket
//! close, or inactivity.
//!
//! ```text
//! New --OPTIONS/DESCRIBE--> New
//! New/Ready --SETUP(first)--> Ready   (token minted)
//! Ready --SETUP(more tracks)--> Ready
//! Ready --PLAY--> Playing
//! Playing --PAUSE--> Ready
//! Ready/Playing --TEARDOWN(all)--> Closed
//! Any --inactivity--> Closed
//! ```

pub mod registry;
pub mod transport;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::collab::MediaClient;
pub use registry::SessionRegistry;
use transport::{ClientTransportContext, SourceTransportContext};

/// Default session timeout in seconds (RFC 2326 §12.37), overridden by
/// `ServerConfig.client_inactivity_timeout_seconds`.
pub const DEFAULT_SESSION_TIMEOUT_SECS: i64 = 60;

/// RTSP session state machine (`spec.md` §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, no `Session:` token minted yet.
    New,
    /// Token minted, at least one track attached, not playing.
    Ready,
    /// Attached to a source and receiving forwarded media.
    Playing,
    /// Terminal: socket closed, detached, Registry entry removed.
    Closed,
}

/// A single RTSP client's control-plane state.
pub struct Session {
    id: Uuid,
    token: RwLock<Option<String>>,
    /// Endpoint the Session was created on — requests bearing this
    /// Session's token from a different peer are hijack attempts
    /// (`spec.md` §7).
    peer: SocketAddr,
    last_cseq: AtomicI64,
    last_activity: RwLock<Instant>,
    client_contexts: RwLock<Vec<ClientTransportContext>>,
    source_contexts: RwLock<Vec<SourceTransportContext>>,
    media_client: RwLock<Option<Box<dyn MediaClient>>>,
    attached_source: RwLock<Option<Uuid>>,
    state: RwLock<SessionState>,
    timeout_secs: i64,
}

impl Session {
    pub fn new(peer: SocketAddr, timeout_secs: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            token: RwLock::new(None),
            peer,
            last_cseq: AtomicI64::new(-1),
            last_activity: RwLock::new(Instant::now()),
            client_contexts: RwLock::new(Vec::new()),
            source_contexts: RwLock::new(Vec::new()),
            media_client: RwLock::new(None),
            attached_source: RwLock::new(None),
            state: RwLock::new(SessionState::New),
            timeout_secs,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    /// Mint a token on first successful SETUP. No-op if already minted.
    pub fn ensure_token(&self) -> String {
        let mut token = self.token.write();
        if token.is_none() {
            *token = Some(Uuid::new_v4().simple().to_string());
        }
        token.clone().unwrap()
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn set_state(&self, state: SessionState) {
        tracing::debug!(session_id = %self.id, old = ?*self.state.read(), new = ?state, "session state transition");
        *self.state.write() = state;
    }

    /// Render the `Session:` response header value.
    pub fn session_header_value(&self) -> String {
        let token = self.token.read().clone().unwrap_or_default();
        format!("{token};timeout={}", self.timeout_secs)
    }

    /// Whether `cseq` repeats the last serviced request (`spec.md`
    /// §4.4's duplicate-suppression rule). Updates the tracked value as
    /// a side effect so callers only need one call per request.
    pub fn is_duplicate_cseq(&self, cseq: i64) -> bool {
        let last = self.last_cseq.swap(cseq, Ordering::SeqCst);
        last == cseq
    }

    pub fn touch(&self) {
        *self.last_activity.write() = Instant::now();
    }

    pub fn idle_seconds(&self) -> i64 {
        self.last_activity.read().elapsed().as_secs() as i64
    }

    /// Configured inactivity timeout in seconds (`-1` disables it), as
    /// passed to [`Session::new`]. Read by the Maintenance loop.
    pub fn timeout_secs(&self) -> i64 {
        self.timeout_secs
    }

    pub fn client_contexts(&self) -> Vec<ClientTransportContext> {
        self.client_contexts.read().clone()
    }

    pub fn add_client_context(&self, ctx: ClientTransportContext) {
        self.client_contexts.write().push(ctx);
    }

    pub fn remove_client_context_for_media(&self, media: &transport::MediaRef) {
        self.client_contexts.write().retain(|c| &c.media != media);
    }

    pub fn source_contexts(&self) -> Vec<SourceTransportContext> {
        self.source_contexts.read().clone()
    }

    pub fn add_source_context(&self, ctx: SourceTransportContext) {
        self.source_contexts.write().push(ctx);
    }

    pub fn remove_source_context_for_media(&self, media: &transport::MediaRef) {
        self.source_contexts.write().retain(|c| &c.media != media);
    }

    pub fn clear_contexts(&self) {
        self.client_contexts.write().clear();
        self.source_contexts.write().clear();
    }

    pub fn attached_source(&self) -> Option<Uuid> {
        *self.attached_source.read()
    }

    pub fn attach_source(&self, id: Uuid) {
        *self.attached_source.write() = Some(id);
    }

    pub fn detach_source(&self) {
        *self.attached_source.write() = None;
    }

    /// Install a freshly-created media client, replacing any existing
    /// one. Used when SETUP creates the Session's outgoing channel for
    /// the first time.
    pub fn set_media_client(&self, client: Box<dyn MediaClient>) {
        *self.media_client.write() = Some(client);
    }

    pub fn with_media_client<R>(&self, f: impl FnOnce(&mut dyn MediaClient) -> R) -> Option<R> {
        self.media_client.write().as_deref_mut().map(f)
    }

    pub fn has_media_client(&self) -> bool {
        self.media_client.read().is_some()
    }

    pub fn disconnect_media_client(&self) {
        if let Some(client) = self.media_client.write().as_deref_mut() {
            client.disconnect();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("state", &*self.state.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:1234".parse().unwrap()
    }

    #[test]
    fn new_session_has_no_token() {
        let session = Session::new(peer(), 60);
        assert!(session.token().is_none());
        assert_eq!(session.state(), SessionState::New);
    }

    #[test]
    fn ensure_token_is_idempotent() {
        let session = Session::new(peer(), 60);
        let first = session.ensure_token();
        let second = session.ensure_token();
        assert_eq!(first, second);
    }

    #[test]
    fn duplicate_cseq_detection() {
        let session = Session::new(peer(), 60);
        assert!(!session.is_duplicate_cseq(1));
        assert!(session.is_duplicate_cseq(1));
        assert!(!session.is_duplicate_cseq(2));
    }

    #[test]
    fn session_header_includes_timeout() {
        let session = Session::new(peer(), 60);
        session.ensure_token();
        let header = session.session_header_value();
        assert!(header.ends_with(";timeout=60"));
    }
}
