//! Session Registry (`spec.md` §4.3): sessions keyed by internal id and,
//! after their first successful SETUP, by RTSP `Session:` token.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{Result, RtspError};
use crate::session::Session;

/// Thread-safe registry of active sessions, plus the server's UDP media
/// port allocator (`spec.md` §4.5's `[minUdpPort, maxUdpPort]` pool).
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<Session>>>>,
    next_port: Arc<AtomicU32>,
    min_port: u16,
    max_port: u16,
}

impl SessionRegistry {
    pub fn new(min_port: u16, max_port: u16) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            next_port: Arc::new(AtomicU32::new(min_port as u32)),
            min_port,
            max_port,
        }
    }

    pub fn add(&self, session: Arc<Session>) {
        let id = session.id();
        self.sessions.write().insert(id, session);
        tracing::debug!(session_id = %id, total = self.sessions.read().len(), "session registered");
    }

    pub fn remove(&self, id: Uuid) -> Option<Arc<Session>> {
        let removed = self.sessions.write().remove(&id);
        if let Some(session) = &removed {
            tracing::debug!(session_id = %id, total = self.sessions.read().len(), "session removed");
            session.set_state(crate::session::SessionState::Closed);
        }
        removed
    }

    pub fn find_by_id(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions.read().get(&id).cloned()
    }

    /// Find a session by its RTSP `Session:` token. Trimmed,
    /// case-sensitive, O(n) scan (`spec.md` §4.3 explicitly permits this
    /// rather than requiring a secondary index).
    pub fn find_by_token(&self, token: &str) -> Option<Arc<Session>> {
        let token = token.trim();
        self.sessions
            .read()
            .values()
            .find(|s| s.token().as_deref() == Some(token))
            .cloned()
    }

    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.read().values().cloned().collect()
    }

    /// Allocate a local (RTP, RTCP) UDP port pair from the configured
    /// pool. RTP is even, RTCP is RTP + 1 (RFC 3550 §11). Fails with
    /// [`RtspError::PortRangeExhausted`] once the pool wraps past
    /// `max_port` without the caller releasing ports — this workspace
    /// does not track port reuse explicitly, matching `spec.md` §4.5's
    /// "fail if none available" rather than ever blocking.
    pub fn allocate_server_ports(&self) -> Result<(u16, u16)> {
        loop {
            let candidate = self.next_port.fetch_add(2, Ordering::SeqCst);
            if candidate > self.max_port as u32 {
                return Err(RtspError::PortRangeExhausted);
            }
            let rtp = candidate as u16;
            if rtp % 2 != 0 {
                continue;
            }
            return Ok((rtp, rtp + 1));
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(5000, 65534)
    }
}
