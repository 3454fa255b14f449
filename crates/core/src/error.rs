//! Error types for the RTSP server library.

use std::fmt;

/// Errors that can occur in the RTSP server library.
///
/// Variants map to specific failure modes across the stack and, where the
/// failure should become an RTSP response, to the status code the
/// handler layer converts them to via [`status_code`](Self::status_code).
#[derive(Debug, thiserror::Error)]
pub enum RtspError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed request line, header, or body (RFC 2326 §6) → 400.
    #[error("malformed request: {kind}")]
    MalformedRequest { kind: ParseErrorKind },

    /// Request requires credentials that were not supplied → 401.
    #[error("authentication required")]
    Unauthorized,

    /// Supplied credentials were rejected → 403.
    #[error("authentication failed")]
    Forbidden,

    /// No such source or track → 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// Unknown method, or source not ready for DESCRIBE → 405.
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// `Session:` token supplied but unknown to the registry → 454.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Source exists but is not `Ready` for SETUP/PLAY → 412.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// Requested transport cannot be satisfied (e.g. UDP against a
    /// force-TCP source, or exhausted UDP port pool) → 461.
    #[error("unsupported transport: {0}")]
    UnsupportedTransport(String),

    /// Client RTSP version is newer than the server supports → 505.
    #[error("RTSP version not supported: {0}")]
    VersionNotSupported(String),

    /// Identifier collision on [`SourceRegistry::add`](crate::source::SourceRegistry::add).
    #[error("source already present: {0}")]
    AlreadyPresent(String),

    /// [`Server::start`](crate::server::Server::start) has not been called yet.
    #[error("server not started")]
    NotStarted,

    /// [`Server::start`](crate::server::Server::start) was called while already running.
    #[error("server already running")]
    AlreadyRunning,

    /// Server-side UDP port allocation exhausted the configured range.
    #[error("UDP port range exhausted")]
    PortRangeExhausted,
}

impl RtspError {
    /// RTSP status code this error maps to, per `spec.md` §7.
    ///
    /// Handlers never let an `RtspError` escape the worker thread; every
    /// error returned from a handler is converted via this method into a
    /// response before the connection loop writes back to the socket.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MalformedRequest { .. } => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound(_) => 404,
            Self::MethodNotAllowed(_) => 405,
            Self::SessionNotFound(_) => 454,
            Self::PreconditionFailed(_) => 412,
            Self::UnsupportedTransport(_) => 461,
            Self::VersionNotSupported(_) => 505,
            Self::AlreadyPresent(_) => 400,
            Self::Io(_) | Self::NotStarted | Self::AlreadyRunning | Self::PortRangeExhausted => {
                500
            }
        }
    }

    /// Canonical reason phrase for [`status_code`](Self::status_code).
    pub fn status_text(&self) -> &'static str {
        match self.status_code() {
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            412 => "Precondition Failed",
            454 => "Session Not Found",
            461 => "Unsupported Transport",
            505 => "RTSP Version Not Supported",
            _ => "Internal Server Error",
        }
    }
}

/// Specific kind of RTSP parse failure.
#[derive(Debug)]
pub enum ParseErrorKind {
    /// Input was empty (no request line).
    EmptyRequest,
    /// Request line did not have the expected `Method URI Version` format.
    InvalidRequestLine,
    /// A header line did not contain a colon separator.
    InvalidHeader,
    /// `Content-Length` absent but body bytes followed the header block.
    UnexpectedBody,
    /// Base64 body on an HTTP-tunnelled request/response failed to decode.
    InvalidTunnelBody,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRequest => write!(f, "empty request"),
            Self::InvalidRequestLine => write!(f, "invalid request line"),
            Self::InvalidHeader => write!(f, "invalid header"),
            Self::UnexpectedBody => write!(f, "body present without Content-Length"),
            Self::InvalidTunnelBody => write!(f, "invalid base64 tunnel body"),
        }
    }
}

/// Convenience alias for `Result<T, RtspError>`.
pub type Result<T> = std::result::Result<T, RtspError>;
