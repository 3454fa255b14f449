//! RTSP response construction and serialization (RFC 2326 §7).

use crate::error::RtspError;

/// An RTSP response.
///
/// Serializes to the standard text format:
///
/// ```text
/// RTSP/1.0 200 OK\r\n
/// CSeq: 1\r\n
/// Content-Type: application/sdp\r\n
/// Content-Length: 142\r\n
/// \r\n
/// v=0\r\n...
/// ```
///
/// Uses a builder pattern — chain [`add_header`](Self::add_header) and
/// [`with_body`](Self::with_body), then call [`serialize`](Self::serialize).
/// `Content-Length` is computed automatically when a body is present.
#[must_use]
pub struct RtspResponse {
    pub status_code: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl RtspResponse {
    /// Build a bare response, with `Server:` set from `server_name`
    /// (`spec.md` §6 — `ServerConfig.server_name`, not a fixed constant).
    pub fn new(status_code: u16, status_text: &str, server_name: &str) -> Self {
        RtspResponse {
            status_code,
            status_text: status_text.to_string(),
            headers: vec![("Server".to_string(), server_name.to_string())],
            body: None,
        }
    }

    /// 200 OK — success (RFC 2326 §7.1.1).
    pub fn ok(server_name: &str) -> Self {
        Self::new(200, "OK", server_name)
    }

    /// Build a response from an [`RtspError`], mapping it to its status
    /// code and reason phrase (`spec.md` §7).
    pub fn from_error(err: &RtspError, server_name: &str) -> Self {
        Self::new(err.status_code(), err.status_text(), server_name)
    }

    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Add a header only when `value` is `Some`.
    pub fn maybe_header(self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.add_header(name, v),
            None => self,
        }
    }

    pub fn with_body(mut self, body: String, content_type: &str) -> Self {
        self.headers
            .push(("Content-Type".to_string(), content_type.to_string()));
        self.body = Some(body);
        self
    }

    /// Serialize to the RTSP text wire format.
    ///
    /// If a body is present, `Content-Length` is appended automatically
    /// (RFC 2326 §12.14).
    pub fn serialize(&self) -> String {
        let mut response = format!("RTSP/1.0 {} {}\r\n", self.status_code, self.status_text);

        for (name, value) in &self.headers {
            response.push_str(&format!("{name}: {value}\r\n"));
        }

        if let Some(body) = &self.body {
            response.push_str(&format!("Content-Length: {}\r\n", body.len()));
            response.push_str("\r\n");
            response.push_str(body);
        } else {
            response.push_str("\r\n");
        }
        response
    }
}
