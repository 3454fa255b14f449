//! HTTP tunnel Acceptor / Transport Bridge (`spec.md` §4.7 third bullet).
//!
//! A third way to reach the same [`MethodHandler`] dispatch as
//! [`transport::tcp`](crate::transport::tcp) and
//! [`transport::udp`](crate::transport::udp): each `POST` carrying
//! `Accept: application/x-rtsp-tunnelled` and a base64-encoded RTSP
//! request body is decoded, dispatched, and answered synchronously with a
//! base64-encoded RTSP response — one HTTP request/response pair per RTSP
//! request, rather than the bidirectional GET/POST streaming variant some
//! RTSP servers also support (out of scope here, as `spec.md`'s
//! Non-goals exclude HTTP tunnelling performance beyond "supported").

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::protocol::handler::MethodHandler;
use crate::protocol::request::RtspRequest;
use crate::protocol::tunnel::{self, HttpTunnelRequest};
use crate::session::Session;
use crate::session::registry::SessionRegistry;
use crate::source::SourceRegistry;

/// Non-blocking HTTP accept loop bound to `ServerConfig.http_port`.
pub fn accept_loop(
    listener: TcpListener,
    sources: SourceRegistry,
    sessions: SessionRegistry,
    config: Arc<ServerConfig>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                if stream.set_nonblocking(false).is_err() {
                    continue;
                }
                let sources = sources.clone();
                let sessions = sessions.clone();
                let config = config.clone();
                thread::spawn(move || handle_connection(stream, peer, sources, sessions, config));
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "HTTP tunnel accept error");
                }
            }
        }
    }
    tracing::debug!("HTTP tunnel accept loop exited");
}

/// Service one HTTP tunnel POST to completion: read the head, read the
/// declared body, decode/dispatch/encode, write the response, close.
fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    sources: SourceRegistry,
    sessions: SessionRegistry,
    config: Arc<ServerConfig>,
) {
    let local_addr = stream
        .local_addr()
        .unwrap_or_else(|_| "0.0.0.0:80".parse().unwrap());
    let _ = stream.set_read_timeout(Some(Duration::from_millis(config.receive_timeout_ms)));
    let _ = stream.set_write_timeout(Some(Duration::from_millis(config.send_timeout_ms)));

    let Some((head, body)) = read_http_request(&mut stream) else {
        return;
    };

    let tunnel_req = match HttpTunnelRequest::parse_head(&head) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(%peer, error = %e, "HTTP tunnel parse error");
            return;
        }
    };

    if !tunnel_req.is_tunnel_post() {
        let _ = stream.write_all(b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n");
        return;
    }

    let decoded = match tunnel::decode_body(&body) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(%peer, error = %e, "HTTP tunnel body decode error");
            return;
        }
    };

    let request = match RtspRequest::parse(&decoded) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(%peer, error = %e, "HTTP tunnel RTSP parse error");
            return;
        }
    };

    // Reuse the Session the `Session:` header names if one exists;
    // otherwise bind a fresh Session to this HTTP context (`spec.md`
    // §4.7). Each POST is its own TCP connection, so — unlike the
    // control-connection-scoped `MethodHandler` in `transport::tcp` —
    // there is no persistent connection object to own across requests.
    let session = tunnel_req
        .session
        .as_deref()
        .and_then(|token| sessions.find_by_token(token))
        .unwrap_or_else(|| {
            let session = Arc::new(Session::new(peer, config.client_inactivity_timeout_seconds));
            sessions.add(session.clone());
            session
        });

    let mut handler = MethodHandler::new(sources, sessions, config, session, peer, local_addr);

    let Some(response) = handler.handle(&request) else {
        let _ = stream.write_all(b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n");
        return;
    };

    let encoded = tunnel::encode_body(&response.serialize());
    let http_response = tunnel::wrap_http_response(&encoded);
    if let Err(e) = stream.write_all(http_response.as_bytes()) {
        tracing::warn!(%peer, error = %e, "HTTP tunnel write error");
    }
}

/// Read an HTTP request's header block, then its declared `Content-Length`
/// worth of body bytes. Returns `None` on I/O error or EOF before a
/// complete header block arrives.
fn read_http_request(stream: &mut TcpStream) -> Option<(String, String)> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        if let Some(idx) = find_subslice(&buffer, b"\r\n\r\n") {
            break idx + 4;
        }
        match stream.read(&mut chunk) {
            Ok(0) => return None,
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
            Err(_) => return None,
        }
        if buffer.len() > 64 * 1024 {
            return None;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let content_length: usize = head
        .lines()
        .find_map(|l| l.split_once(':').filter(|(k, _)| k.trim().eq_ignore_ascii_case("content-length")))
        .and_then(|(_, v)| v.trim().parse().ok())
        .unwrap_or(0);

    while buffer.len() < header_end + content_length {
        match stream.read(&mut chunk) {
            Ok(0) => return None,
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
            Err(_) => return None,
        }
    }

    let body = String::from_utf8_lossy(&buffer[header_end..header_end + content_length]).to_string();
    Some((head, body))
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
