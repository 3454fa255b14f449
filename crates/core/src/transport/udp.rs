//! Optional UDP RTSP listener (`spec.md` §4.7): a second way to carry
//! RTSP signaling (distinct from UDP *media* delivery, which lives
//! entirely behind the opaque [`MediaClient`](crate::collab::MediaClient)
//! collaborator). The teacher's `UdpTransport` only ever sent; this
//! generalizes it to a receive loop that seeds one [`Session`] per peer.

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::protocol::handler::MethodHandler;
use crate::protocol::request::RtspRequest;
use crate::session::Session;
use crate::session::registry::SessionRegistry;
use crate::source::SourceRegistry;

/// A bound UDP socket used for RTSP signaling: the first datagram from a
/// peer seeds a [`Session`] bound to it, subsequent datagrams from that
/// peer route to the same handler (`spec.md` §4.7).
pub struct UdpRtspListener {
    socket: UdpSocket,
}

impl UdpRtspListener {
    pub fn bind(port: u16, ipv6: bool) -> Result<Self> {
        let addr: SocketAddr = if ipv6 {
            format!("[::]:{port}").parse().unwrap()
        } else {
            format!("0.0.0.0:{port}").parse().unwrap()
        };
        let socket = UdpSocket::bind(addr)?;
        socket.set_read_timeout(Some(Duration::from_millis(200)))?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Run the receive loop until `running` clears. Each distinct peer
    /// gets its own [`Session`] + [`MethodHandler`], mirroring one
    /// control connection each.
    pub fn run(
        self,
        sources: SourceRegistry,
        sessions: SessionRegistry,
        config: Arc<ServerConfig>,
        running: Arc<AtomicBool>,
    ) {
        let local_addr = self.socket.local_addr().unwrap_or_else(|_| "0.0.0.0:555".parse().unwrap());
        let handlers: Mutex<HashMap<SocketAddr, MethodHandler>> = Mutex::new(HashMap::new());
        let mut buf = [0u8; 65_536];

        while running.load(Ordering::SeqCst) {
            let (len, peer) = match self.socket.recv_from(&mut buf) {
                Ok(pair) => pair,
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "UDP recv error");
                    continue;
                }
            };

            let raw = match std::str::from_utf8(&buf[..len]) {
                Ok(s) => s,
                Err(_) => continue,
            };
            let request = match RtspRequest::parse(raw) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(%peer, error = %e, "UDP parse error");
                    continue;
                }
            };

            let mut handlers = handlers.lock();
            let handler = handlers.entry(peer).or_insert_with(|| {
                let session = Arc::new(Session::new(peer, config.client_inactivity_timeout_seconds));
                sessions.add(session.clone());
                MethodHandler::new(sources.clone(), sessions.clone(), config.clone(), session, peer, local_addr)
            });

            if let Some(response) = handler.handle(&request) {
                if let Err(e) = self.socket.send_to(response.serialize().as_bytes(), peer) {
                    tracing::warn!(%peer, error = %e, "UDP send error");
                }
            }
        }
        tracing::debug!("UDP RTSP listener exited");
    }
}
