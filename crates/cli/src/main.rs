use std::io;
use std::sync::Arc;

use clap::Parser;

use rtsp_relay::auth::{AuthScheme, Credential};
use rtsp_relay::protocol::sdp::{MediaDescription, SessionDescription};
use rtsp_relay::source::Source;
use rtsp_relay::{Server, ServerConfig};

/// Standalone RTSP aggregator/relay server.
///
/// Registers one static source named `demo`, exposed at
/// `rtsp://<host>/live/demo`, so the control-plane handshake (OPTIONS,
/// DESCRIBE, SETUP, PLAY, TEARDOWN) can be exercised against a real
/// process without a camera attached.
#[derive(Parser)]
#[command(name = "rtsp-relay", about = "RTSP aggregator/relay server")]
struct Args {
    /// TCP control port.
    #[arg(long, default_value_t = 554)]
    port: u16,

    /// Maximum simultaneous client sessions.
    #[arg(long, default_value_t = 1024)]
    max_clients: usize,

    /// Seconds of inactivity before a session is culled (-1 disables).
    #[arg(long, default_value_t = 60)]
    session_timeout: i64,

    /// Reject requests without a `User-Agent:` header.
    #[arg(long, default_value_t = false)]
    require_user_agent: bool,

    /// Optional UDP RTSP listener port.
    #[arg(long)]
    udp_port: Option<u16>,

    /// Optional HTTP tunnel listener port.
    #[arg(long)]
    http_port: Option<u16>,

    /// Require `username:password` Basic auth on the demo source.
    #[arg(long)]
    basic_auth: Option<String>,
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut config = ServerConfig {
        port: args.port,
        maximum_clients: args.max_clients,
        client_inactivity_timeout_seconds: args.session_timeout,
        require_user_agent: args.require_user_agent,
        ..ServerConfig::default()
    };
    if let Some(port) = args.udp_port {
        config = config.enable_udp(port, false);
    }
    if let Some(port) = args.http_port {
        config = config.enable_http(port);
    }

    let mut server = Server::new(config);

    let mut demo = Source::new("demo").with_description(
        SessionDescription::new().with_media(
            MediaDescription::new("video", "96", "track1")
                .with_attribute("rtpmap:96 H264/90000")
                .with_attribute("fmtp:96 packetization-mode=1"),
        ),
    );
    if let Some(creds) = args.basic_auth {
        if let Some((user, pass)) = creds.split_once(':') {
            demo = demo.with_credential(AuthScheme::Basic, Credential::new(user, pass));
        }
    }
    let demo = Arc::new(demo);

    if let Err(e) = server.add_source(demo.clone()) {
        eprintln!("Failed to register demo source: {e}");
        return;
    }

    if let Err(e) = server.start() {
        eprintln!("Failed to start server: {e}");
        return;
    }
    demo.mark_ready();

    println!(
        "RTSP relay listening on 0.0.0.0:{} (rtsp://<host>/live/demo) — press Enter to stop",
        args.port
    );
    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap();

    server.stop();
}
