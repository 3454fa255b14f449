//! `Server` orchestrator (`spec.md` §4.7, §5): wires the Source and
//! Session Registries to the TCP (mandatory), UDP (optional), and HTTP
//! tunnel (optional) transport bridges, plus the Maintenance loop, behind
//! one `start`/`stop` lifecycle. Grounded on the teacher's `Server`, which
//! owned a single `SessionManager` and one `TcpListener` thread; this
//! generalizes it to the full transport/registry set `spec.md` describes.

use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::error::{Result, RtspError};
use crate::maintenance;
use crate::session::registry::SessionRegistry;
use crate::source::{Source, SourceRegistry};
use crate::transport::{http, tcp, udp::UdpRtspListener};

/// High-level RTSP aggregator/relay server.
///
/// Owns the Source Registry, Session Registry, and configuration; starts
/// the mandatory TCP acceptor plus any transports enabled in `config`
/// (UDP RTSP, HTTP tunnel) and the Maintenance loop, all as detached
/// threads coordinated by a single `running` flag (`spec.md` §5).
pub struct Server {
    config: Arc<ServerConfig>,
    sources: SourceRegistry,
    sessions: SessionRegistry,
    running: Arc<AtomicBool>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        let sessions = SessionRegistry::new(
            config.minimum_udp_port.unwrap_or(16384),
            config.maximum_udp_port.unwrap_or(32768),
        );
        Self {
            config: Arc::new(config),
            sources: SourceRegistry::new(),
            sessions,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_default_config() -> Self {
        Self::new(ServerConfig::default())
    }

    /// Register a source. Starts it immediately if the server is already
    /// listening (`spec.md` §4.2).
    pub fn add_source(&self, source: Arc<Source>) -> Result<Arc<Source>> {
        self.sources.add(source)
    }

    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn config(&self) -> &Arc<ServerConfig> {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Bind the mandatory TCP listener plus any transports `config`
    /// enables, start every registered source, and spawn the Maintenance
    /// loop. Returns once the TCP listener is bound; all loops run on
    /// detached threads.
    pub fn start(&mut self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(RtspError::AlreadyRunning);
        }

        let bind_addr = format!("0.0.0.0:{}", self.config.port);
        let tcp_listener = TcpListener::bind(&bind_addr)?;
        tcp_listener.set_nonblocking(true)?;
        tracing::info!(addr = %bind_addr, "RTSP server listening (TCP)");

        self.sources.set_listening(true);
        for source in self.sources.iter() {
            let _ = source.start();
        }

        {
            let sources = self.sources.clone();
            let sessions = self.sessions.clone();
            let config = self.config.clone();
            let running = self.running.clone();
            thread::spawn(move || tcp::accept_loop(tcp_listener, sources, sessions, config, running));
        }

        if let Some(port) = self.config.udp_port {
            let listener = UdpRtspListener::bind(port, self.config.udp_ipv6)?;
            tracing::info!(port, "RTSP server listening (UDP)");
            let sources = self.sources.clone();
            let sessions = self.sessions.clone();
            let config = self.config.clone();
            let running = self.running.clone();
            thread::spawn(move || listener.run(sources, sessions, config, running));
        }

        if let Some(port) = self.config.http_port {
            let http_listener = TcpListener::bind(format!("0.0.0.0:{port}"))?;
            http_listener.set_nonblocking(true)?;
            tracing::info!(port, "RTSP server listening (HTTP tunnel)");
            let sources = self.sources.clone();
            let sessions = self.sessions.clone();
            let config = self.config.clone();
            let running = self.running.clone();
            thread::spawn(move || http::accept_loop(http_listener, sources, sessions, config, running));
        }

        maintenance::spawn(
            self.sources.clone(),
            self.sessions.clone(),
            Duration::from_secs(self.config.maintenance_interval_seconds),
            self.running.clone(),
        );

        Ok(())
    }

    /// Signal all loops to stop, stop every source, and clear both
    /// registries (`spec.md` §5's `stop()` contract). Threads observe
    /// `running` cleared on their next poll and exit on their own; this
    /// call does not block waiting for them.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.sources.set_listening(false);
        for source in self.sources.iter() {
            source.stop();
            self.sources.remove(source.id(), false);
        }
        for session in self.sessions.snapshot() {
            session.with_media_client(|c| c.send_goodbyes());
            session.disconnect_media_client();
            self.sessions.remove(session.id());
        }
        tracing::info!("server stopped");
    }
}
