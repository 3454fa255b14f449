//! Server configuration surface (`spec.md` §6).

/// Server-level configuration consumed by the transport bridge and
/// method handlers.
///
/// Threaded through the stack as `Arc<ServerConfig>`, the same way the
/// teacher threads its (much smaller) `ServerConfig` into `MethodHandler`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP control port. Default 554 (RFC 2326 §9.2).
    pub port: u16,
    /// Maximum simultaneous client sessions. Must be > 0. Default 1024.
    pub maximum_clients: usize,
    /// Socket receive timeout, milliseconds. Default 1000.
    pub receive_timeout_ms: u64,
    /// Socket send timeout, milliseconds. Default 1000.
    pub send_timeout_ms: u64,
    /// Seconds of inactivity before Maintenance culls a session.
    /// `-1` disables the timeout. Default 60.
    pub client_inactivity_timeout_seconds: i64,
    /// Reject requests without a `User-Agent:` header.
    pub require_user_agent: bool,
    /// Reject PLAY requests without a `Range:` header.
    pub require_range_header: bool,
    /// `Server:` header value on every response.
    pub server_name: String,
    /// Lower bound of the UDP media port allocation pool.
    pub minimum_udp_port: Option<u16>,
    /// Upper bound of the UDP media port allocation pool.
    pub maximum_udp_port: Option<u16>,
    /// Optional UDP RTSP listener port (None disables it).
    pub udp_port: Option<u16>,
    /// Bind UDP listener to an IPv6 wildcard instead of IPv4.
    pub udp_ipv6: bool,
    /// Optional HTTP tunnel listener port (None disables it).
    pub http_port: Option<u16>,
    /// Public host advertised in SDP `o=`/`c=` lines and `Content-Base`.
    /// When `None`, inferred from the request URI or client address.
    pub public_host: Option<String>,
    /// Interval, in seconds, between Maintenance sweeps. Default 30.
    pub maintenance_interval_seconds: u64,
    /// SDP origin username field (`o=<username> ...`).
    pub sdp_username: String,
    /// SDP origin session id field (`o=... <session-id> ...`).
    pub sdp_session_id: String,
    /// SDP origin session version field (`o=... ... <session-version> ...`).
    pub sdp_session_version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 554,
            maximum_clients: 1024,
            receive_timeout_ms: 1000,
            send_timeout_ms: 1000,
            client_inactivity_timeout_seconds: 60,
            require_user_agent: false,
            require_range_header: false,
            server_name: "ASTI Media Server".to_string(),
            minimum_udp_port: None,
            maximum_udp_port: None,
            udp_port: None,
            udp_ipv6: false,
            http_port: None,
            public_host: None,
            maintenance_interval_seconds: 30,
            sdp_username: "-".to_string(),
            sdp_session_id: "0".to_string(),
            sdp_session_version: "0".to_string(),
        }
    }
}

impl ServerConfig {
    /// Enable the optional UDP RTSP listener on `port`.
    pub fn enable_udp(mut self, port: u16, ipv6: bool) -> Self {
        self.udp_port = Some(port);
        self.udp_ipv6 = ipv6;
        self
    }

    /// Enable the optional HTTP tunnel listener on `port`.
    pub fn enable_http(mut self, port: u16) -> Self {
        self.http_port = Some(port);
        self
    }
}
