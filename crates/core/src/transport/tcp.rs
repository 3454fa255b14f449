//! TCP Acceptor / Transport Bridge (`spec.md` §4.7).
//!
//! One thread accepts control connections; each accepted connection is
//! serviced by its own worker thread that reads a request, dispatches it
//! synchronously through [`MethodHandler`], and writes the response —
//! the teacher's own `Connection` shape, generalized with a client-count
//! cap and pipelining for interleaved TCP.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::protocol::handler::MethodHandler;
use crate::protocol::request::RtspRequest;
use crate::session::Session;
use crate::session::registry::SessionRegistry;
use crate::source::SourceRegistry;

/// Non-blocking TCP accept loop, bounded by `ServerConfig.maximum_clients`
/// (`spec.md` §4.7: "reject (drop) new accepts past the cap").
pub fn accept_loop(
    listener: TcpListener,
    sources: SourceRegistry,
    sessions: SessionRegistry,
    config: Arc<ServerConfig>,
    running: Arc<AtomicBool>,
) {
    let active = Arc::new(AtomicUsize::new(0));

    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                if active.load(Ordering::SeqCst) >= config.maximum_clients {
                    tracing::warn!(%peer, "client cap reached, dropping connection");
                    drop(stream);
                    continue;
                }
                if stream.set_nonblocking(false).is_err() {
                    continue;
                }
                active.fetch_add(1, Ordering::SeqCst);

                let sources = sources.clone();
                let sessions = sessions.clone();
                let config = config.clone();
                let running = running.clone();
                let active = active.clone();
                thread::spawn(move || {
                    Connection::handle(stream, peer, sources, sessions, config, running);
                    active.fetch_sub(1, Ordering::SeqCst);
                });
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "TCP accept error");
                }
            }
        }
    }
    tracing::debug!("TCP accept loop exited");
}

/// One control connection's request/response loop, including pipelined
/// reads once the Session's media client has switched to interleaved TCP
/// (`spec.md` §4.7's "attempt to parse a next request from the same
/// buffer").
struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    handler: MethodHandler,
    buffer: Vec<u8>,
}

impl Connection {
    fn handle(
        stream: TcpStream,
        peer: SocketAddr,
        sources: SourceRegistry,
        sessions: SessionRegistry,
        config: Arc<ServerConfig>,
        running: Arc<AtomicBool>,
    ) {
        let local_addr = stream
            .local_addr()
            .unwrap_or_else(|_| "0.0.0.0:554".parse().unwrap());
        let _ = stream.set_read_timeout(Some(Duration::from_millis(config.receive_timeout_ms)));
        let _ = stream.set_write_timeout(Some(Duration::from_millis(config.send_timeout_ms)));

        let session = Arc::new(Session::new(peer, config.client_inactivity_timeout_seconds));
        sessions.add(session.clone());

        let handler = MethodHandler::new(sources, sessions.clone(), config, session.clone(), peer, local_addr);

        tracing::info!(%peer, "client connected");

        let mut conn = Connection {
            stream,
            peer,
            handler,
            buffer: Vec::new(),
        };

        let reason = conn.run(&running);
        sessions.remove(session.id());

        tracing::info!(%peer, reason, "client disconnected");
    }

    fn run(&mut self, running: &Arc<AtomicBool>) -> &'static str {
        let mut chunk = [0u8; 4096];
        while running.load(Ordering::SeqCst) {
            match self.try_dispatch_buffered() {
                DispatchResult::Handled => continue,
                DispatchResult::NeedMoreData => {}
                DispatchResult::WriteError => return "write error",
            }

            match self.stream.read(&mut chunk) {
                Ok(0) => return "connection closed by client",
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(_) => return "read error",
            }
        }
        "server shutting down"
    }

    /// Try to parse and dispatch exactly one request out of `self.buffer`.
    fn try_dispatch_buffered(&mut self) -> DispatchResult {
        let Some(split) = find_request_boundary(&self.buffer) else {
            return DispatchResult::NeedMoreData;
        };
        let raw = match String::from_utf8(self.buffer[..split].to_vec()) {
            Ok(s) => s,
            Err(_) => {
                self.buffer.clear();
                return DispatchResult::NeedMoreData;
            }
        };
        self.buffer.drain(..split);

        match RtspRequest::parse(&raw) {
            Ok(request) => {
                tracing::debug!(peer = %self.peer, method = %request.method, uri = %request.uri, "request");
                if let Some(response) = self.handler.handle(&request) {
                    tracing::debug!(peer = %self.peer, status = response.status_code, "response");
                    if self.stream.write_all(response.serialize().as_bytes()).is_err() {
                        return DispatchResult::WriteError;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(peer = %self.peer, error = %e, "parse error");
            }
        }
        DispatchResult::Handled
    }
}

enum DispatchResult {
    Handled,
    NeedMoreData,
    WriteError,
}

/// Find the end of the first complete request in `buffer`: the header
/// terminator plus, if `Content-Length` is present, enough trailing bytes
/// to cover the declared body. Returns `None` if the buffer doesn't yet
/// hold a full request.
fn find_request_boundary(buffer: &[u8]) -> Option<usize> {
    let header_end = find_subslice(buffer, b"\r\n\r\n")
        .map(|i| i + 4)
        .or_else(|| find_subslice(buffer, b"\n\n").map(|i| i + 2))?;

    let head = String::from_utf8_lossy(&buffer[..header_end]);
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("Content-Length:").or_else(|| line.strip_prefix("content-length:")))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let total = header_end + content_length;
    if buffer.len() >= total {
        Some(total)
    } else {
        None
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
