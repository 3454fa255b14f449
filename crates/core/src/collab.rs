//! Collaborator interfaces named but left external by `spec.md` §6: the
//! upstream RTSP client that pulls media into a [`Source`](crate::source::Source),
//! and the per-`Session` outgoing media client that forwards RTP/RTCP.
//!
//! Neither collaborator's real implementation (actual RTP I/O, SR/RR
//! generation, jitter buffering, an upstream RTSP pull client) is in
//! scope here — the teacher's `Packetizer` trait plays the same role for
//! codec-specific framing, injected as `Box<dyn Packetizer>` rather than
//! built into `Mount`. The stubs below exist so the full request
//! lifecycle (SETUP → PLAY → TEARDOWN) is exercisable without real media
//! I/O.

use std::net::SocketAddr;

use crate::session::transport::{SourceTransportContext, TransportProtocol};

/// Drives a [`Source`](crate::source::Source)'s upstream connection
/// lifecycle (starting, stopping, restarting the pull from the origin
/// camera/encoder).
pub trait SourceBackend: Send {
    fn start(&mut self) -> crate::error::Result<()>;
    fn stop(&mut self);
}

/// A `Session`'s outgoing media forwarding channel: the thing that
/// actually writes RTP/RTCP bytes to the client once attached to a
/// source.
pub trait MediaClient: Send {
    fn connect(&mut self) -> crate::error::Result<()>;
    fn disconnect(&mut self);
    fn add_context(&mut self, ctx: SourceTransportContext);
    fn send_senders_reports(&mut self);
    fn send_goodbyes(&mut self);
    fn set_transport_protocol(&mut self, proto: TransportProtocol);
    /// True once outgoing packet queues have been cleared — the
    /// post-condition `spec.md` §8 checks after a UDP→TCP transport
    /// switch and after TEARDOWN.
    fn queues_empty(&self) -> bool;
}

/// In-memory [`SourceBackend`] that flips straight from Starting to
/// Started without talking to a real upstream. Default backend for
/// sources registered without a custom one (the CLI's "static SDP"
/// source, and every test in this workspace).
#[derive(Debug, Default)]
pub struct StubSourceBackend {
    running: bool,
}

impl StubSourceBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SourceBackend for StubSourceBackend {
    fn start(&mut self) -> crate::error::Result<()> {
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
    }
}

/// In-memory [`MediaClient`] that records contexts and call counts
/// instead of writing real RTP/RTCP. Public so downstream integrators
/// can start from it, the same way the teacher's `H264Packetizer` is a
/// usable default rather than a test-only fixture.
#[derive(Debug, Default)]
pub struct StubMediaClient {
    pub connected: bool,
    pub contexts: Vec<SourceTransportContext>,
    pub transport_protocol: Option<TransportProtocol>,
    pub senders_reports_sent: u32,
    pub goodbyes_sent: u32,
    pub peer: Option<SocketAddr>,
    /// Stand-in for bytes sitting in an outgoing RTP/RTCP queue. Tracked
    /// separately from `contexts`, which only records which tracks are
    /// attached — a track can be re-attached right after a transport
    /// switch while its queue is still empty, and the two must not be
    /// conflated.
    pub queued_packets: u32,
}

impl StubMediaClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_peer(peer: SocketAddr) -> Self {
        Self {
            peer: Some(peer),
            ..Self::default()
        }
    }

    /// Simulates a packet landing in the outgoing queue for this client.
    /// Real `MediaClient` implementations would enqueue actual RTP/RTCP
    /// bytes here; the stub only needs the count for `queues_empty`.
    pub fn enqueue_packet(&mut self) {
        self.queued_packets += 1;
    }
}

impl MediaClient for StubMediaClient {
    fn connect(&mut self) -> crate::error::Result<()> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.contexts.clear();
        self.queued_packets = 0;
    }

    fn add_context(&mut self, ctx: SourceTransportContext) {
        self.contexts.push(ctx);
    }

    fn send_senders_reports(&mut self) {
        self.senders_reports_sent += 1;
    }

    fn send_goodbyes(&mut self) {
        self.goodbyes_sent += 1;
    }

    fn set_transport_protocol(&mut self, proto: TransportProtocol) {
        self.transport_protocol = Some(proto);
        self.contexts.clear();
        self.queued_packets = 0;
    }

    fn queues_empty(&self) -> bool {
        self.queued_packets == 0
    }
}
