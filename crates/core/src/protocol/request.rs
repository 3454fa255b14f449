//! RTSP request parsing (RFC 2326 §6).

use std::collections::HashMap;

use crate::error::{ParseErrorKind, Result, RtspError};

/// A parsed RTSP request: request line, headers, and optional body.
///
/// RTSP requests follow HTTP/1.1 syntax:
///
/// ```text
/// Method SP Request-URI SP RTSP-Version CRLF
/// *(Header: Value CRLF)
/// CRLF
/// [body]
/// ```
///
/// Header lookup is case-insensitive per RFC 2326 §4.2.
#[derive(Debug, Clone)]
pub struct RtspRequest {
    pub method: String,
    pub uri: String,
    pub version: String,
    /// Headers keyed by lowercased name. Continuation lines (a line
    /// starting with whitespace, RFC 2326 §4.1) fold into the previous
    /// header's value.
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

impl RtspRequest {
    /// Parse an RTSP request from its text representation.
    ///
    /// Splits the header block from the body on the first blank line and,
    /// when `Content-Length` is present, reads exactly that many bytes of
    /// body. A body with no `Content-Length`, or fewer bytes than
    /// declared, is rejected rather than guessed at.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(RtspError::MalformedRequest {
                kind: ParseErrorKind::EmptyRequest,
            });
        }

        let (head, rest) = split_head(raw);

        let mut lines = head.lines();
        let request_line = lines.next().unwrap_or_default();
        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(RtspError::MalformedRequest {
                kind: ParseErrorKind::InvalidRequestLine,
            });
        }
        let method = parts[0].to_string();
        let uri = parts[1].to_string();
        let version = parts[2].to_string();

        if version != "RTSP/1.0" {
            tracing::warn!(version, "client sent non-RTSP/1.0 version");
        }

        let mut headers: HashMap<String, String> = HashMap::new();
        let mut last_key: Option<String> = None;
        for line in lines {
            if line.is_empty() {
                continue;
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some(key) = &last_key {
                    if let Some(value) = headers.get_mut(key) {
                        value.push(' ');
                        value.push_str(line.trim());
                    }
                }
                continue;
            }
            let colon_pos = line.find(':').ok_or(RtspError::MalformedRequest {
                kind: ParseErrorKind::InvalidHeader,
            })?;
            let key = line[..colon_pos].trim().to_ascii_lowercase();
            let value = line[colon_pos + 1..].trim().to_string();
            headers.insert(key.clone(), value);
            last_key = Some(key);
        }

        let content_length = headers
            .get("content-length")
            .and_then(|v| v.trim().parse::<usize>().ok());

        let body = match (content_length, rest) {
            (None, None) => None,
            (None, Some(body)) if body.is_empty() => None,
            (None, Some(_)) => {
                return Err(RtspError::MalformedRequest {
                    kind: ParseErrorKind::UnexpectedBody,
                });
            }
            (Some(0), _) => None,
            (Some(len), Some(body)) if body.len() >= len => Some(body[..len].to_string()),
            (Some(_), _) => {
                return Err(RtspError::MalformedRequest {
                    kind: ParseErrorKind::UnexpectedBody,
                });
            }
        };

        Ok(RtspRequest {
            method,
            uri,
            version,
            headers,
            body,
        })
    }

    /// Look up a header value by name (case-insensitive, per RFC 2326 §4.2).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|v| v.as_str())
    }

    /// Returns the CSeq header value, which numbers and orders RTSP
    /// request/response pairs (RFC 2326 §12.17).
    pub fn cseq(&self) -> Option<&str> {
        self.get_header("CSeq")
    }

    /// `Session:` header with any `;timeout=` parameter stripped.
    pub fn session_id(&self) -> Option<&str> {
        self.get_header("Session")
            .map(|v| v.split(';').next().unwrap_or(v).trim())
    }

    /// Declared `Content-Length`, or `0` when absent.
    pub fn content_length(&self) -> usize {
        self.get_header("Content-Length")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0)
    }

    /// Final non-empty `/`-separated segment of the request URI, used to
    /// identify the track a `SETUP`/`TEARDOWN` refers to.
    pub fn last_path_segment(&self) -> Option<&str> {
        self.uri
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
    }
}

/// Split `raw` into the header block and, if present, the trailing body.
fn split_head(raw: &str) -> (&str, Option<&str>) {
    if let Some(idx) = raw.find("\r\n\r\n") {
        (&raw[..idx], Some(&raw[idx + 4..]))
    } else if let Some(idx) = raw.find("\n\n") {
        (&raw[..idx], Some(&raw[idx + 2..]))
    } else {
        (raw, None)
    }
}
