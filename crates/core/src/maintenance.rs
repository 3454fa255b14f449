//! Maintenance Loop (`spec.md` §4.8): periodic inactivity sweep and
//! faulted-source restart. Grounded on the teacher's `thread::spawn` +
//! `Arc<AtomicBool>` running-flag pattern (`server.rs::Server::start`),
//! sleeping for the configured sweep interval instead of polling.
//!
//! Exceptions inside a sweep are swallowed — this loop must never take
//! down the server (`spec.md` §4.8's last sentence). Every step here is
//! infallible by construction (registry operations don't panic), but the
//! per-source/per-session bodies are still isolated from each other so one
//! misbehaving stub backend can't stop the rest of the sweep.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::session::registry::SessionRegistry;
use crate::source::{SourceRegistry, SourceState};

/// Spawn the maintenance thread. Returns immediately; the thread runs
/// until `running` clears.
pub fn spawn(
    sources: SourceRegistry,
    sessions: SessionRegistry,
    interval: Duration,
    running: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || run(sources, sessions, interval, running))
}

fn run(sources: SourceRegistry, sessions: SessionRegistry, interval: Duration, running: Arc<AtomicBool>) {
    tracing::info!(interval_secs = interval.as_secs(), "maintenance loop started");
    while running.load(Ordering::SeqCst) {
        thread::sleep(interval);
        if !running.load(Ordering::SeqCst) {
            break;
        }
        sweep_sessions(&sessions);
        sweep_sources(&sources);
    }
    tracing::debug!("maintenance loop exited");
}

/// Cull sessions idle past `timeout_secs` (`-1` disables the check per
/// session, since each `Session` carries its own configured timeout).
fn sweep_sessions(sessions: &SessionRegistry) {
    for session in sessions.snapshot() {
        let timeout = session.timeout_secs();
        if timeout < 0 {
            continue;
        }
        if session.idle_seconds() > timeout {
            tracing::info!(session_id = %session.id(), idle = session.idle_seconds(), "culling inactive session");
            session.with_media_client(|c| c.send_goodbyes());
            session.disconnect_media_client();
            sessions.remove(session.id());
        }
    }
}

/// Restart any source that reached `Started` but never became `Ready`
/// (`spec.md` §4.8: "any source in state Started but not Ready is stopped
/// and restarted").
fn sweep_sources(sources: &SourceRegistry) {
    for source in sources.iter() {
        if source.state() == SourceState::Started && !source.ready() {
            tracing::warn!(source = %source.name(), id = %source.id(), "source started but never ready, restarting");
            source.restart();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use std::net::SocketAddr;
    use std::thread::sleep;

    fn peer() -> SocketAddr {
        "127.0.0.1:1234".parse().unwrap()
    }

    #[test]
    fn sweep_removes_sessions_past_timeout() {
        let sessions = SessionRegistry::default();
        let session = Arc::new(Session::new(peer(), 0));
        sessions.add(session.clone());

        sleep(Duration::from_millis(1100));
        sweep_sessions(&sessions);

        assert!(sessions.find_by_id(session.id()).is_none());
    }

    #[test]
    fn sweep_preserves_sessions_with_disabled_timeout() {
        let sessions = SessionRegistry::default();
        let session = Arc::new(Session::new(peer(), -1));
        let id = session.id();
        sessions.add(session);

        sweep_sessions(&sessions);

        assert!(sessions.find_by_id(id).is_some());
    }

    #[test]
    fn sweep_restarts_started_but_not_ready_sources() {
        use crate::source::Source;

        let sources = SourceRegistry::new();
        let source = Arc::new(Source::new("camera1"));
        sources.add(source.clone()).unwrap();
        source.start().unwrap();
        assert_eq!(source.state(), SourceState::Started);
        assert!(!source.ready());

        sweep_sources(&sources);

        assert_eq!(source.state(), SourceState::Started);
    }
}
