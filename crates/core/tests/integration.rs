//! Black-box integration test driving a live server over a real
//! `TcpStream`: OPTIONS → DESCRIBE → SETUP → PLAY → TEARDOWN (`spec.md`
//! §8 scenario 1), plus the Digest auth challenge scenario (§8 scenario
//! 2).

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use md5::{Digest as _, Md5};
use rtsp_relay::auth::{AuthScheme, Credential};
use rtsp_relay::protocol::sdp::{MediaDescription, SessionDescription};
use rtsp_relay::source::Source;
use rtsp_relay::{Server, ServerConfig};

fn rtsp_request(stream: &mut TcpStream, request: &str) -> std::io::Result<String> {
    stream.write_all(request.as_bytes())?;
    stream.flush()?;

    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        if let Some(idx) = find(&buf, b"\r\n\r\n") {
            break idx + 4;
        }
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            break buf.len();
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end.min(buf.len())]).to_string();
    let content_length: usize = head
        .lines()
        .find_map(|l| l.split_once(':').filter(|(k, _)| k.trim().eq_ignore_ascii_case("content-length")))
        .and_then(|(_, v)| v.trim().parse().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Ok(String::from_utf8_lossy(&buf).to_string())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn session_token(response: &str) -> String {
    response
        .lines()
        .find(|l| l.to_ascii_lowercase().starts_with("session:"))
        .and_then(|l| l.split_once(':'))
        .map(|(_, v)| v.trim().split(';').next().unwrap_or("").trim().to_string())
        .unwrap_or_default()
}

fn status_code(response: &str) -> u16 {
    response
        .lines()
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|c| c.parse().ok())
        .unwrap_or(0)
}

fn connect(addr: &str) -> TcpStream {
    let sockaddr = addr.to_socket_addrs().unwrap().next().unwrap();
    let stream = TcpStream::connect_timeout(&sockaddr, Duration::from_secs(2)).expect("connect");
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    stream.set_write_timeout(Some(Duration::from_secs(2))).unwrap();
    stream
}

fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Pulls `key="value"` out of a `WWW-Authenticate: Digest ...` header
/// value. Matches on a leading space or comma so `nonce=` doesn't also
/// match inside `cnonce=`.
fn digest_param<'a>(header: &'a str, key: &str) -> &'a str {
    let needle = format!("{key}=\"");
    let at = header
        .match_indices(&needle)
        .map(|(i, _)| i)
        .find(|&i| i == 0 || matches!(header.as_bytes()[i - 1], b' ' | b','))
        .expect("param present");
    let rest = &header[at + needle.len()..];
    &rest[..rest.find('"').expect("closing quote")]
}

fn www_authenticate(response: &str) -> String {
    response
        .lines()
        .find(|l| l.to_ascii_lowercase().starts_with("www-authenticate:"))
        .and_then(|l| l.split_once(':'))
        .map(|(_, v)| v.trim().to_string())
        .expect("WWW-Authenticate header present")
}

fn demo_description() -> SessionDescription {
    SessionDescription::new().with_media(
        MediaDescription::new("video", "96", "track1")
            .with_attribute("rtpmap:96 H264/90000")
            .with_attribute("fmtp:96 packetization-mode=1"),
    )
}

#[test]
fn full_handshake_options_describe_setup_play_teardown() {
    const BIND: &str = "127.0.0.1:18554";
    let mut server = Server::new(ServerConfig {
        port: 18554,
        ..ServerConfig::default()
    });

    let source = Arc::new(Source::new("camera1").with_description(demo_description()));
    server.add_source(source.clone()).expect("register source");
    server.start().expect("server start");
    source.mark_ready();

    let mut stream = connect(BIND);
    let base_uri = format!("rtsp://{}/live/{}", BIND, source.id());

    // OPTIONS
    let opt_resp = rtsp_request(
        &mut stream,
        &format!("OPTIONS {base_uri} RTSP/1.0\r\nCSeq: 1\r\n\r\n"),
    )
    .unwrap();
    assert_eq!(status_code(&opt_resp), 200);
    assert!(opt_resp.contains("Public:"));

    // DESCRIBE
    let desc_resp = rtsp_request(
        &mut stream,
        &format!("DESCRIBE {base_uri} RTSP/1.0\r\nCSeq: 2\r\nAccept: application/sdp\r\n\r\n"),
    )
    .unwrap();
    assert_eq!(status_code(&desc_resp), 200);
    assert!(desc_resp.contains("Content-Type: application/sdp"));
    assert!(desc_resp.contains("v=0"));
    assert!(desc_resp.contains("m=video"));
    assert!(desc_resp.contains("a=rtpmap:96 H264/90000"));

    // SETUP (track1, UDP unicast)
    let setup_resp = rtsp_request(
        &mut stream,
        &format!(
            "SETUP {base_uri}/track1 RTSP/1.0\r\nCSeq: 3\r\nTransport: RTP/AVP;unicast;client_port=5000-5001\r\n\r\n"
        ),
    )
    .unwrap();
    assert_eq!(status_code(&setup_resp), 200);
    assert!(setup_resp.contains("Transport:"));
    let token = session_token(&setup_resp);
    assert!(!token.is_empty());

    // PLAY
    let play_resp = rtsp_request(
        &mut stream,
        &format!(
            "PLAY {base_uri} RTSP/1.0\r\nCSeq: 4\r\nSession: {token}\r\nRange: npt=0.000-\r\n\r\n"
        ),
    )
    .unwrap();
    assert_eq!(status_code(&play_resp), 200);
    assert!(play_resp.contains("RTP-Info:"));
    assert!(play_resp.contains("url="));

    // TEARDOWN
    let teardown_resp = rtsp_request(
        &mut stream,
        &format!("TEARDOWN {base_uri} RTSP/1.0\r\nCSeq: 5\r\nSession: {token}\r\n\r\n"),
    )
    .unwrap();
    assert_eq!(status_code(&teardown_resp), 200);

    // Session Registry no longer carries the torn-down token.
    std::thread::sleep(Duration::from_millis(100));
    assert!(server.sessions().find_by_token(&token).is_none());

    server.stop();
}

#[test]
fn digest_auth_challenge_then_success_then_wrong_password() {
    const BIND: &str = "127.0.0.1:18555";
    let mut server = Server::new(ServerConfig {
        port: 18555,
        ..ServerConfig::default()
    });

    let source = Arc::new(
        Source::new("secure-cam")
            .with_description(demo_description())
            .with_credential(AuthScheme::Digest, Credential::new("alice", "s3cret")),
    );
    server.add_source(source.clone()).expect("register source");
    server.start().expect("server start");
    source.mark_ready();

    let base_uri = format!("rtsp://{}/live/{}", BIND, source.id());

    // First DESCRIBE carries no Authorization header -> 401 challenge.
    let mut stream = connect(BIND);
    let resp = rtsp_request(
        &mut stream,
        &format!("DESCRIBE {base_uri} RTSP/1.0\r\nCSeq: 1\r\nAccept: application/sdp\r\n\r\n"),
    )
    .unwrap();
    assert_eq!(status_code(&resp), 401);
    assert!(resp.to_ascii_lowercase().contains("www-authenticate: digest"));

    let challenge = www_authenticate(&resp);
    assert_eq!(digest_param(&challenge, "username"), "alice");
    let realm = digest_param(&challenge, "realm").to_string();
    let nonce = digest_param(&challenge, "nonce").to_string();
    let cnonce = digest_param(&challenge, "cnonce").to_string();

    // Second DESCRIBE, same connection, answers the cached challenge
    // with the correct password -> 200.
    let ha1 = md5_hex(&format!("alice:{realm}:s3cret"));
    let ha2 = md5_hex(&format!("DESCRIBE:{base_uri}"));
    let response = md5_hex(&format!("{ha1}:{nonce}::{cnonce}::{ha2}"));
    let auth_header = format!(
        "Digest username=\"alice\",realm=\"{realm}\",nonce=\"{nonce}\",uri=\"{base_uri}\",response=\"{response}\",nc=\"\",cnonce=\"{cnonce}\",qop=\"\""
    );
    let resp = rtsp_request(
        &mut stream,
        &format!(
            "DESCRIBE {base_uri} RTSP/1.0\r\nCSeq: 2\r\nAccept: application/sdp\r\nAuthorization: {auth_header}\r\n\r\n"
        ),
    )
    .unwrap();
    assert_eq!(status_code(&resp), 200);
    assert!(resp.contains("v=0"));

    // Third DESCRIBE, same connection, reuses the cached nonce but
    // answers with a digest computed from the wrong password -> 403.
    let wrong_ha1 = md5_hex(&format!("alice:{realm}:wrong-password"));
    let wrong_response = md5_hex(&format!("{wrong_ha1}:{nonce}::{cnonce}::{ha2}"));
    let wrong_auth_header = format!(
        "Digest username=\"alice\",realm=\"{realm}\",nonce=\"{nonce}\",uri=\"{base_uri}\",response=\"{wrong_response}\",nc=\"\",cnonce=\"{cnonce}\",qop=\"\""
    );
    let resp = rtsp_request(
        &mut stream,
        &format!(
            "DESCRIBE {base_uri} RTSP/1.0\r\nCSeq: 3\r\nAccept: application/sdp\r\nAuthorization: {wrong_auth_header}\r\n\r\n"
        ),
    )
    .unwrap();
    assert_eq!(status_code(&resp), 403);

    server.stop();
}
