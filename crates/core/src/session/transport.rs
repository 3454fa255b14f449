//! Negotiated RTP/RTCP transport parameters (RFC 2326 §12.39).
//!
//! A track's transport is either **UDP unicast** (separate RTP/RTCP
//! sockets, ports negotiated in `SETUP`) or **interleaved TCP** (RTP/RTCP
//! framed as `$<channel><length><data>` inside the control connection).
//! `spec.md` §4.5 has both the server allocate the former and rebuild
//! in-place to the latter mid-session, so both shapes live side by side
//! here rather than as a single flat struct (the teacher only ever had
//! UDP, so this generalizes its `Transport`/`TransportHeader` pair).

use std::net::SocketAddr;

/// Negotiated protocol for a track, chosen during `SETUP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportProtocol {
    Udp,
    Tcp,
}

/// A reference to the media description a transport context is bound
/// to, by media type + format (`spec.md` §3's "both reference the same
/// media description" invariant) rather than by index, so reordering a
/// source's media list can't desynchronize client/source contexts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaRef {
    pub media_type: String,
    pub format: String,
}

impl MediaRef {
    pub fn new(media_type: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            format: format.into(),
        }
    }
}

/// What a client asked for in its `Transport:` header.
#[derive(Debug, Clone, Copy)]
pub enum RequestedTransport {
    Udp {
        client_rtp_port: u16,
        client_rtcp_port: u16,
    },
    Tcp {
        data_channel: u8,
        control_channel: u8,
    },
}

impl RequestedTransport {
    /// Parse a `Transport:` header value. Looks for `client_port=a-b`
    /// (UDP unicast) or `interleaved=a-b` (TCP) among the
    /// semicolon-separated parameters; `spec.md` §4.5 rejects a header
    /// with neither.
    pub fn parse(header: &str) -> Option<Self> {
        for part in header.split(';') {
            let part = part.trim();
            if let Some(ports) = part.strip_prefix("client_port=") {
                let (rtp, rtcp) = ports.split_once('-')?;
                return Some(Self::Udp {
                    client_rtp_port: rtp.parse().ok()?,
                    client_rtcp_port: rtcp.parse().ok()?,
                });
            }
            if let Some(channels) = part.strip_prefix("interleaved=") {
                let (data, control) = channels.split_once('-')?;
                return Some(Self::Tcp {
                    data_channel: data.parse().ok()?,
                    control_channel: control.parse().ok()?,
                });
            }
        }
        None
    }
}

/// Per-track transport state on the **client** side of a `Session` —
/// one per attached track, created by `SETUP`.
#[derive(Debug, Clone)]
pub struct ClientTransportContext {
    pub media: MediaRef,
    pub protocol: TransportProtocol,
    /// UDP only.
    pub client_addr: Option<SocketAddr>,
    pub client_rtp_port: Option<u16>,
    pub client_rtcp_port: Option<u16>,
    pub server_rtp_port: Option<u16>,
    pub server_rtcp_port: Option<u16>,
    /// TCP (interleaved) only.
    pub data_channel: Option<u8>,
    pub control_channel: Option<u8>,
    pub ssrc: u32,
    pub rtcp_enabled: bool,
}

impl ClientTransportContext {
    #[allow(clippy::too_many_arguments)]
    pub fn udp(
        media: MediaRef,
        client_addr: SocketAddr,
        client_rtp_port: u16,
        client_rtcp_port: u16,
        server_rtp_port: u16,
        server_rtcp_port: u16,
        data_channel: u8,
        control_channel: u8,
        ssrc: u32,
        rtcp_enabled: bool,
    ) -> Self {
        Self {
            media,
            protocol: TransportProtocol::Udp,
            client_addr: Some(client_addr),
            client_rtp_port: Some(client_rtp_port),
            client_rtcp_port: Some(client_rtcp_port),
            server_rtp_port: Some(server_rtp_port),
            server_rtcp_port: Some(server_rtcp_port),
            data_channel: Some(data_channel),
            control_channel: Some(control_channel),
            ssrc,
            rtcp_enabled,
        }
    }

    pub fn tcp(
        media: MediaRef,
        data_channel: u8,
        control_channel: u8,
        ssrc: u32,
        rtcp_enabled: bool,
    ) -> Self {
        Self {
            media,
            protocol: TransportProtocol::Tcp,
            client_addr: None,
            client_rtp_port: None,
            client_rtcp_port: None,
            server_rtp_port: None,
            server_rtcp_port: None,
            data_channel: Some(data_channel),
            control_channel: Some(control_channel),
            ssrc,
            rtcp_enabled,
        }
    }

    /// Interleaved channel pair for the next track attached to a session,
    /// given the client contexts already attached to it: `0`/`1` for the
    /// first track, then `lastData+2`/`lastControl+2` for each one after
    /// that (`spec.md` §4.5). Applied to UDP contexts too — they carry a
    /// channel pair even though they move no bytes over it, so a later
    /// `SETUP` switching the session to interleaved TCP has a consistent
    /// numbering already reserved for every track rather than renumbering
    /// tracks that didn't change transport.
    pub fn next_channel_pair(existing: &[ClientTransportContext]) -> (u8, u8) {
        match existing.last() {
            Some(last) => {
                let data = last.data_channel.unwrap_or(0);
                let control = last.control_channel.unwrap_or(1);
                (data.saturating_add(2), control.saturating_add(2))
            }
            None => (0, 1),
        }
    }

    /// Render the `Transport:` response header value for this context.
    pub fn to_header(&self, local_addr: &str) -> String {
        match self.protocol {
            TransportProtocol::Udp => format!(
                "RTP/AVP/UDP;unicast;client_port={}-{};server_port={}-{};source={};ssrc={:08x}",
                self.client_rtp_port.unwrap_or_default(),
                self.client_rtcp_port.unwrap_or_default(),
                self.server_rtp_port.unwrap_or_default(),
                self.server_rtcp_port.unwrap_or_default(),
                local_addr,
                self.ssrc,
            ),
            TransportProtocol::Tcp => format!(
                "RTP/AVP/TCP;unicast;interleaved={}-{};ssrc={:08x}",
                self.data_channel.unwrap_or_default(),
                self.control_channel.unwrap_or_default(),
                self.ssrc,
            ),
        }
    }
}

/// Per-track transport state on the **source** side — copied into a
/// `Session`'s attachment list on `SETUP`, carrying the last-known
/// timestamps so the client context can inherit them (`spec.md` §4.5).
#[derive(Debug, Clone, Default)]
pub struct SourceTransportContext {
    pub media: MediaRef,
    pub sequence_number: u16,
    pub ntp_timestamp: u64,
    pub rtp_timestamp: u32,
    pub rtcp_enabled: bool,
}

impl SourceTransportContext {
    pub fn new(media: MediaRef, rtcp_enabled: bool) -> Self {
        Self {
            media,
            sequence_number: 0,
            ntp_timestamp: 0,
            rtp_timestamp: 0,
            rtcp_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_udp_client_port() {
        let t = RequestedTransport::parse("RTP/AVP;unicast;client_port=5000-5001").unwrap();
        match t {
            RequestedTransport::Udp {
                client_rtp_port,
                client_rtcp_port,
            } => {
                assert_eq!(client_rtp_port, 5000);
                assert_eq!(client_rtcp_port, 5001);
            }
            _ => panic!("expected udp"),
        }
    }

    #[test]
    fn parses_tcp_interleaved() {
        let t = RequestedTransport::parse("RTP/AVP/TCP;unicast;interleaved=0-1").unwrap();
        match t {
            RequestedTransport::Tcp {
                data_channel,
                control_channel,
            } => {
                assert_eq!(data_channel, 0);
                assert_eq!(control_channel, 1);
            }
            _ => panic!("expected tcp"),
        }
    }

    #[test]
    fn neither_present_returns_none() {
        assert!(RequestedTransport::parse("RTP/AVP;unicast").is_none());
    }

    #[test]
    fn udp_header_rendering() {
        let ctx = ClientTransportContext::udp(
            MediaRef::new("video", "96"),
            "1.2.3.4:5000".parse().unwrap(),
            5000,
            5001,
            6000,
            6001,
            0,
            1,
            0xdeadbeef,
            true,
        );
        let header = ctx.to_header("10.0.0.1");
        assert!(header.starts_with("RTP/AVP/UDP;unicast;"));
        assert!(header.contains("client_port=5000-5001"));
        assert!(header.contains("server_port=6000-6001"));
        assert!(header.contains("source=10.0.0.1"));
        assert!(header.contains("ssrc=deadbeef"));
    }

    #[test]
    fn tcp_header_rendering() {
        let ctx = ClientTransportContext::tcp(MediaRef::new("video", "96"), 2, 3, 0x1234, false);
        let header = ctx.to_header("10.0.0.1");
        assert_eq!(header, "RTP/AVP/TCP;unicast;interleaved=2-3;ssrc=00001234");
    }

    #[test]
    fn next_channel_pair_defaults_to_zero_one_for_first_track() {
        assert_eq!(ClientTransportContext::next_channel_pair(&[]), (0, 1));
    }

    #[test]
    fn next_channel_pair_increments_from_last_track() {
        let first = ClientTransportContext::tcp(MediaRef::new("video", "96"), 0, 1, 1, true);
        assert_eq!(ClientTransportContext::next_channel_pair(&[first]), (2, 3));
    }

    #[test]
    fn next_channel_pair_increments_across_udp_tracks_too() {
        let first = ClientTransportContext::udp(
            MediaRef::new("video", "96"),
            "1.2.3.4:5000".parse().unwrap(),
            5000,
            5001,
            6000,
            6001,
            0,
            1,
            1,
            true,
        );
        let second = ClientTransportContext::udp(
            MediaRef::new("audio", "97"),
            "1.2.3.4:5002".parse().unwrap(),
            5002,
            5003,
            6002,
            6003,
            2,
            3,
            2,
            true,
        );
        assert_eq!(
            ClientTransportContext::next_channel_pair(&[first, second]),
            (4, 5)
        );
    }
}
