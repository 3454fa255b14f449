//! HTTP-tunnelled RTSP (`spec.md` §4.1 second paragraph, §4.7's "HTTP
//! tunnel" transport).
//!
//! A client behind a proxy that only allows plain HTTP can still reach an
//! RTSP source: it `POST`s with `Accept: application/x-rtsp-tunnelled` and
//! a base64-encoded RTSP request as the body. The server decodes the body,
//! parses and dispatches it exactly like any other request, then responds
//! synchronously with the base64-encoded RTSP response (`spec.md` §4.7 —
//! this is a request/response bridge, not the bidirectional GET/POST
//! streaming variant some RTSP servers also support).

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::{ParseErrorKind, Result, RtspError};

/// Minimal HTTP/1.1 request line plus the headers the tunnel bridge needs.
/// Not a general HTTP parser — only a `POST` carrying a tunnelled RTSP
/// request is recognized.
#[derive(Debug, Clone)]
pub struct HttpTunnelRequest {
    pub method: String,
    pub path: String,
    pub accept: Option<String>,
    pub session: Option<String>,
    pub content_length: usize,
}

impl HttpTunnelRequest {
    /// Parse the header block of an HTTP request (everything up to, but
    /// not including, the blank line that ends it).
    pub fn parse_head(head: &str) -> Result<Self> {
        let mut lines = head.lines();
        let request_line = lines.next().ok_or(RtspError::MalformedRequest {
            kind: ParseErrorKind::EmptyRequest,
        })?;
        let mut parts = request_line.split_whitespace();
        let method = parts.next().ok_or(RtspError::MalformedRequest {
            kind: ParseErrorKind::InvalidRequestLine,
        })?;
        let path = parts.next().ok_or(RtspError::MalformedRequest {
            kind: ParseErrorKind::InvalidRequestLine,
        })?;

        let mut headers: HashMap<String, String> = HashMap::new();
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }

        Ok(Self {
            method: method.to_string(),
            path: path.to_string(),
            accept: headers.get("accept").cloned(),
            session: headers.get("session").cloned(),
            content_length: headers
                .get("content-length")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        })
    }

    /// Whether this request identifies itself as a tunnelled RTSP POST
    /// (`spec.md` §4.7: `Accept: application/x-rtsp-tunnelled` and a
    /// `Content-Length`).
    pub fn is_tunnel_post(&self) -> bool {
        self.method.eq_ignore_ascii_case("POST")
            && self.accept.as_deref() == Some("application/x-rtsp-tunnelled")
    }
}

/// Decode a base64 tunnel body into the RTSP request text it carries.
pub fn decode_body(body: &str) -> Result<String> {
    let bytes = BASE64
        .decode(body.trim())
        .map_err(|_| RtspError::MalformedRequest {
            kind: ParseErrorKind::InvalidTunnelBody,
        })?;
    String::from_utf8(bytes).map_err(|_| RtspError::MalformedRequest {
        kind: ParseErrorKind::InvalidTunnelBody,
    })
}

/// Encode an RTSP response for delivery as a tunnelled HTTP body.
pub fn encode_body(message: &str) -> String {
    BASE64.encode(message.as_bytes())
}

/// Wrap a base64-encoded RTSP response in the HTTP response envelope
/// `spec.md` §4.1 specifies: `application/x-rtsp-tunnelled` content type,
/// `Cache-Control: no-cache`.
pub fn wrap_http_response(encoded_body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: application/x-rtsp-tunnelled\r\n\
         Cache-Control: no-cache\r\n\
         Content-Length: {}\r\n\r\n\
         {encoded_body}",
        encoded_body.len(),
    )
}
