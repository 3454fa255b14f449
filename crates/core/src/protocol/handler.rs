//! Method dispatch (`spec.md` §4.5): each RTSP method is handled by a
//! private method that reads the Source/Session Registries, mutates the
//! target `Session`, and returns a response. `handle` wraps every call
//! with the checks common to all eight methods (missing `CSeq`, version
//! too new, errors converted to responses) so individual handlers stay
//! straight-line per `spec.md` §5.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use rand::Rng;
use uuid::Uuid;

use crate::auth::{self, AuthScheme, DigestChallenge};
use crate::collab::{MediaClient, StubMediaClient};
use crate::config::ServerConfig;
use crate::error::{ParseErrorKind, Result, RtspError};
use crate::protocol::range::Range;
use crate::protocol::request::RtspRequest;
use crate::protocol::response::RtspResponse;
use crate::session::registry::SessionRegistry;
use crate::session::transport::{
    ClientTransportContext, MediaRef, RequestedTransport, SourceTransportContext,
    TransportProtocol,
};
use crate::session::{Session, SessionState};
use crate::source::{Source, SourceRegistry};

/// Handles RTSP requests for a single connection (TCP, UDP peer, or HTTP
/// tunnel pair). Owns the connection's primary [`Session`] and a
/// per-source digest-challenge cache so 401 → retry flows verify against
/// the nonce that was actually issued.
pub struct MethodHandler {
    sources: SourceRegistry,
    sessions: SessionRegistry,
    config: Arc<ServerConfig>,
    session: Arc<Session>,
    peer: SocketAddr,
    local_addr: SocketAddr,
    digest_challenges: HashMap<Uuid, DigestChallenge>,
    pending_www_authenticate: Option<String>,
}

impl MethodHandler {
    pub fn new(
        sources: SourceRegistry,
        sessions: SessionRegistry,
        config: Arc<ServerConfig>,
        session: Arc<Session>,
        peer: SocketAddr,
        local_addr: SocketAddr,
    ) -> Self {
        Self {
            sources,
            sessions,
            config,
            session,
            peer,
            local_addr,
            digest_challenges: HashMap::new(),
            pending_www_authenticate: None,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Handle one request, or return `None` when it is an exact CSeq
    /// retransmission — `spec.md` §4.4 has these dropped silently, with
    /// no response re-sent, rather than re-run or re-answered.
    pub fn handle(&mut self, request: &RtspRequest) -> Option<RtspResponse> {
        self.pending_www_authenticate = None;

        let Some(cseq) = request.cseq() else {
            return Some(RtspResponse::from_error(
                &RtspError::MalformedRequest {
                    kind: ParseErrorKind::InvalidHeader,
                },
                &self.config.server_name,
            ));
        };
        let cseq = cseq.to_string();

        if self.session.is_duplicate_cseq(cseq.parse().unwrap_or(-1)) {
            tracing::debug!(%cseq, "duplicate CSeq, dropping retransmission");
            return None;
        }

        if self.config.require_user_agent && request.get_header("User-Agent").is_none() {
            return Some(self.error_response(
                &RtspError::MalformedRequest {
                    kind: ParseErrorKind::InvalidHeader,
                },
                &cseq,
            ));
        }

        if version_exceeds_server(&request.version) {
            return Some(self.error_response(&RtspError::VersionNotSupported(request.version.clone()), &cseq));
        }

        self.session.touch();

        let result = match request.method.as_str() {
            "OPTIONS" => self.handle_options(request),
            "DESCRIBE" => self.handle_describe(request),
            "SETUP" => self.handle_setup(request),
            "PLAY" => self.handle_play(request),
            "PAUSE" => self.handle_pause(request),
            "TEARDOWN" => self.handle_teardown(request),
            "GET_PARAMETER" => self.handle_get_parameter(request),
            "SET_PARAMETER" => self.handle_set_parameter(request),
            other => Err(RtspError::MethodNotAllowed(other.to_string())),
        };

        Some(match result {
            Ok(resp) => resp.add_header("CSeq", &cseq),
            Err(err) => self.error_response(&err, &cseq),
        })
    }

    fn error_response(&self, err: &RtspError, cseq: &str) -> RtspResponse {
        let resp = RtspResponse::from_error(err, &self.config.server_name).add_header("CSeq", cseq);
        if matches!(err, RtspError::Unauthorized) {
            resp.maybe_header("WWW-Authenticate", self.pending_www_authenticate.as_deref())
        } else {
            resp
        }
    }

    /// Resolve which `Session` a request targets: normally the
    /// connection's own session, but a `Session:` header naming a
    /// different token reattaches to that session — verifying the
    /// requesting peer matches the one the session was created on
    /// (`spec.md` §7's cross-endpoint hijack defense).
    fn target_session(&self, request: &RtspRequest) -> Result<Arc<Session>> {
        match request.session_id() {
            Some(token) if Some(token.to_string()) != self.session.token() => {
                let found = self
                    .sessions
                    .find_by_token(token)
                    .ok_or_else(|| RtspError::SessionNotFound(token.to_string()))?;
                if found.peer() != self.peer {
                    tracing::warn!(token, peer = %self.peer, owner = %found.peer(), "session hijack attempt rejected");
                    return Err(RtspError::Unauthorized);
                }
                Ok(found)
            }
            _ => Ok(self.session.clone()),
        }
    }

    fn authenticate(&mut self, source: &Arc<Source>, request: &RtspRequest) -> Result<()> {
        if source.auth_scheme() == AuthScheme::None {
            return Ok(());
        }
        let Some(credential) = source.credential() else {
            return Ok(());
        };

        match request.get_header("Authorization") {
            None => {
                if let Some((header, issued)) =
                    auth::challenge(source.auth_scheme(), &credential.username, source.name())
                {
                    if let Some(issued) = issued {
                        self.digest_challenges.insert(source.id(), issued);
                    }
                    self.pending_www_authenticate = Some(header);
                }
                Err(RtspError::Unauthorized)
            }
            Some(header) => {
                let issued = self.digest_challenges.get(&source.id());
                let ok = auth::verify(
                    source.auth_scheme(),
                    credential,
                    header,
                    &request.method,
                    &request.uri,
                    issued,
                );
                if ok {
                    Ok(())
                } else {
                    Err(RtspError::Forbidden)
                }
            }
        }
    }

    fn handle_options(&mut self, request: &RtspRequest) -> Result<RtspResponse> {
        self.sources
            .resolve(&request.uri)
            .ok_or_else(|| RtspError::NotFound(request.uri.clone()))?;
        Ok(RtspResponse::ok(&self.config.server_name).add_header(
            "Public",
            "DESCRIBE, SETUP, PLAY, PAUSE, TEARDOWN, GET_PARAMETER",
        ))
    }

    fn handle_describe(&mut self, request: &RtspRequest) -> Result<RtspResponse> {
        if request.get_header("Accept").map(str::trim) != Some("application/sdp") {
            return Err(RtspError::MalformedRequest {
                kind: ParseErrorKind::InvalidHeader,
            });
        }

        let source = self
            .sources
            .resolve(&request.uri)
            .ok_or_else(|| RtspError::NotFound(request.uri.clone()))?;

        self.authenticate(&source, request)?;

        if !source.ready() {
            return Err(RtspError::MethodNotAllowed("source not ready".to_string()));
        }

        let description = source.description().unwrap_or_default();
        let host = self
            .config
            .public_host
            .clone()
            .unwrap_or_else(|| self.local_addr.ip().to_string());
        let body = description.render(
            &host,
            &self.config.sdp_username,
            &self.config.sdp_session_id,
            &self.config.sdp_session_version,
            source.name(),
        );
        let content_base = if request.uri.contains("/live/") {
            format!("rtsp://{host}/live/{}/", source.id())
        } else {
            request.uri.clone()
        };

        Ok(RtspResponse::ok(&self.config.server_name)
            .add_header("Content-Base", &content_base)
            .with_body(body, "application/sdp"))
    }

    fn handle_setup(&mut self, request: &RtspRequest) -> Result<RtspResponse> {
        let source = self
            .sources
            .resolve(&request.uri)
            .ok_or_else(|| RtspError::NotFound(request.uri.clone()))?;
        if !source.ready() {
            return Err(RtspError::PreconditionFailed("source not ready".to_string()));
        }

        let track = request
            .last_path_segment()
            .ok_or_else(|| RtspError::NotFound("missing track".to_string()))?;
        let description = source.description().unwrap_or_default();
        let media_desc = description
            .find_track(track)
            .ok_or_else(|| RtspError::NotFound(track.to_string()))?;
        let media = MediaRef::new(media_desc.media_type.clone(), media_desc.format.clone());
        let rtcp_enabled = !media_desc.rtcp_disabled;

        self.authenticate(&source, request)?;

        let transport_header = request.get_header("Transport").ok_or(RtspError::MalformedRequest {
            kind: ParseErrorKind::InvalidHeader,
        })?;
        let requested = RequestedTransport::parse(transport_header).ok_or(RtspError::MalformedRequest {
            kind: ParseErrorKind::InvalidHeader,
        })?;

        let session = self.target_session(request)?;

        let mut source_ctx = SourceTransportContext::new(media.clone(), rtcp_enabled);
        if let Some(existing) = source
            .transport_contexts()
            .into_iter()
            .find(|c| c.media == media)
        {
            source_ctx.ntp_timestamp = existing.ntp_timestamp;
            source_ctx.rtp_timestamp = existing.rtp_timestamp;
            source_ctx.sequence_number = existing.sequence_number;
        }

        let ssrc: u32 = rand::rng().random();

        let client_ctx = match requested {
            RequestedTransport::Udp {
                client_rtp_port,
                client_rtcp_port,
            } => {
                if source.force_tcp() {
                    return Err(RtspError::UnsupportedTransport(
                        "source requires interleaved TCP".to_string(),
                    ));
                }
                let (server_rtp_port, server_rtcp_port) = self.sessions.allocate_server_ports()?;
                if !session.has_media_client() {
                    let mut client: Box<dyn MediaClient> = Box::new(StubMediaClient::with_peer(self.peer));
                    client.connect()?;
                    client.set_transport_protocol(TransportProtocol::Udp);
                    session.set_media_client(client);
                }
                let (data_channel, control_channel) =
                    ClientTransportContext::next_channel_pair(&session.client_contexts());
                ClientTransportContext::udp(
                    media.clone(),
                    SocketAddr::new(self.peer.ip(), client_rtp_port),
                    client_rtp_port,
                    client_rtcp_port,
                    server_rtp_port,
                    server_rtcp_port,
                    data_channel,
                    control_channel,
                    ssrc,
                    rtcp_enabled,
                )
            }
            RequestedTransport::Tcp {
                data_channel,
                control_channel,
            } => {
                let currently_udp = session
                    .client_contexts()
                    .iter()
                    .any(|c| c.protocol == TransportProtocol::Udp);
                if currently_udp {
                    // Transport switch: drop the UDP-era contexts and
                    // reset the outgoing channel to TCP before
                    // reattaching this track (`spec.md` §4.5).
                    session.clear_contexts();
                    session.with_media_client(|c| c.set_transport_protocol(TransportProtocol::Tcp));
                }
                if !session.has_media_client() {
                    let mut client: Box<dyn MediaClient> = Box::new(StubMediaClient::with_peer(self.peer));
                    client.connect()?;
                    client.set_transport_protocol(TransportProtocol::Tcp);
                    session.set_media_client(client);
                }
                ClientTransportContext::tcp(media.clone(), data_channel, control_channel, ssrc, rtcp_enabled)
            }
        };

        session.add_client_context(client_ctx.clone());
        session.add_source_context(source_ctx.clone());
        session.with_media_client(|c| c.add_context(source_ctx.clone()));
        session.attach_source(source.id());

        session.ensure_token();
        if session.state() == SessionState::New {
            session.set_state(SessionState::Ready);
        }

        let header_value = client_ctx.to_header(&self.local_addr.ip().to_string());
        Ok(RtspResponse::ok(&self.config.server_name)
            .add_header("Transport", &header_value)
            .add_header("Session", &session.session_header_value()))
    }

    fn handle_play(&mut self, request: &RtspRequest) -> Result<RtspResponse> {
        let session = self.target_session(request)?;
        let source_id = session
            .attached_source()
            .ok_or_else(|| RtspError::PreconditionFailed("no track attached".to_string()))?;
        let source = self
            .sources
            .get(source_id)
            .ok_or_else(|| RtspError::NotFound(source_id.to_string()))?;
        if !source.ready() {
            return Err(RtspError::PreconditionFailed("source not ready".to_string()));
        }
        self.authenticate(&source, request)?;

        let range_header = request.get_header("Range");
        if self.config.require_range_header && range_header.is_none() {
            return Err(RtspError::MalformedRequest {
                kind: ParseErrorKind::InvalidHeader,
            });
        }
        let range = range_header.and_then(Range::parse).unwrap_or(Range { start: 0.0, end: None });
        let range_value = match range.end {
            Some(end) => format!("npt={:.3}-{:.3}", range.start, end),
            None => format!("npt={:.3}-", range.start),
        };

        let description = source.description().unwrap_or_default();
        let source_ctxs = session.source_contexts();
        let base_url = request.uri.trim_end_matches('/');
        let rtp_info = session
            .client_contexts()
            .iter()
            .map(|ctx| {
                let control = description
                    .find_track_by_media(&ctx.media)
                    .map(|m| m.control.as_str())
                    .unwrap_or("");
                let (seq, rtptime) = source_ctxs
                    .iter()
                    .find(|c| c.media == ctx.media)
                    .map(|c| (c.sequence_number, c.rtp_timestamp))
                    .unwrap_or((0, 0));
                format!("url={base_url}/{control};seq={seq};rtptime={rtptime}")
            })
            .collect::<Vec<_>>()
            .join(",");

        session.with_media_client(|c| c.send_senders_reports());
        session.set_state(SessionState::Playing);

        Ok(RtspResponse::ok(&self.config.server_name)
            .add_header("Session", &session.session_header_value())
            .add_header("Range", &range_value)
            .add_header("RTP-Info", &rtp_info))
    }

    fn handle_pause(&mut self, request: &RtspRequest) -> Result<RtspResponse> {
        let session = self.target_session(request)?;
        let source_id = session
            .attached_source()
            .ok_or_else(|| RtspError::PreconditionFailed("no track attached".to_string()))?;
        let source = self
            .sources
            .get(source_id)
            .ok_or_else(|| RtspError::NotFound(source_id.to_string()))?;
        self.authenticate(&source, request)?;

        session.set_state(SessionState::Ready);
        Ok(RtspResponse::ok(&self.config.server_name).add_header("Session", &session.session_header_value()))
    }

    fn handle_teardown(&mut self, request: &RtspRequest) -> Result<RtspResponse> {
        let session = self.target_session(request)?;

        if let Some(source) = session.attached_source().and_then(|id| self.sources.get(id)) {
            self.authenticate(&source, request)?;
        }

        let specific_media = session
            .attached_source()
            .and_then(|id| self.sources.get(id))
            .and_then(|source| source.description())
            .and_then(|d| {
                request
                    .last_path_segment()
                    .and_then(|track| d.find_track(track))
                    .map(|m| MediaRef::new(m.media_type.clone(), m.format.clone()))
            });

        match specific_media {
            Some(media) => {
                session.remove_client_context_for_media(&media);
                session.remove_source_context_for_media(&media);
            }
            None => session.clear_contexts(),
        }

        if session.client_contexts().is_empty() {
            session.with_media_client(|c| c.send_goodbyes());
            session.disconnect_media_client();
            session.detach_source();
            session.set_state(SessionState::Closed);
            self.sessions.remove(session.id());
        }

        Ok(RtspResponse::ok(&self.config.server_name).add_header("Session", &session.session_header_value()))
    }

    fn handle_get_parameter(&mut self, request: &RtspRequest) -> Result<RtspResponse> {
        let session = self.target_session(request)?;
        session.touch();
        Ok(RtspResponse::ok(&self.config.server_name).add_header("Session", &session.session_header_value()))
    }

    fn handle_set_parameter(&mut self, request: &RtspRequest) -> Result<RtspResponse> {
        match request.session_id() {
            Some(_) => {
                let session = self.target_session(request)?;
                Ok(RtspResponse::ok(&self.config.server_name).add_header("Session", &session.session_header_value()))
            }
            None => Ok(RtspResponse::ok(&self.config.server_name)),
        }
    }
}

/// Whether `version`, as `RTSP/<major>.<minor>`, exceeds the single
/// version this server speaks (`RTSP/1.0`).
fn version_exceeds_server(version: &str) -> bool {
    let Some(rest) = version.strip_prefix("RTSP/") else {
        return false;
    };
    let Some((major, minor)) = rest.split_once('.') else {
        return false;
    };
    let major: u32 = major.parse().unwrap_or(1);
    let minor: u32 = minor.parse().unwrap_or(0);
    major > 1 || (major == 1 && minor > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::sdp::{MediaDescription, SessionDescription};

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn local() -> SocketAddr {
        "127.0.0.1:554".parse().unwrap()
    }

    fn handler_with_source() -> (MethodHandler, SourceRegistry, Arc<Source>) {
        let sources = SourceRegistry::new();
        let sessions = SessionRegistry::default();
        let config = Arc::new(ServerConfig::default());
        let session = Arc::new(Session::new(peer(), config.client_inactivity_timeout_seconds));
        sessions.add(session.clone());

        let source = Arc::new(
            Source::new("camera1").with_description(
                SessionDescription::new().with_media(MediaDescription::new("video", "96", "track1")),
            ),
        );
        source.start().unwrap();
        source.mark_ready();
        sources.add(source.clone()).unwrap();

        let handler = MethodHandler::new(sources.clone(), sessions, config, session, peer(), local());
        (handler, sources, source)
    }

    fn request(method: &str, cseq: u32, uri: &str, extra: &[(&str, &str)]) -> RtspRequest {
        let mut raw = format!("{method} {uri} RTSP/1.0\r\nCSeq: {cseq}\r\n");
        for (k, v) in extra {
            raw.push_str(&format!("{k}: {v}\r\n"));
        }
        raw.push_str("\r\n");
        RtspRequest::parse(&raw).unwrap()
    }

    #[test]
    fn options_on_known_source_returns_200() {
        let (mut handler, _sources, source) = handler_with_source();
        let req = request("OPTIONS", 1, &format!("rtsp://host/live/{}", source.id()), &[]);
        let resp = handler.handle(&req).unwrap();
        assert_eq!(resp.status_code, 200);
    }

    #[test]
    fn options_on_unknown_source_returns_404() {
        let (mut handler, _sources, _source) = handler_with_source();
        let req = request("OPTIONS", 1, "rtsp://host/live/nope", &[]);
        let resp = handler.handle(&req).unwrap();
        assert_eq!(resp.status_code, 404);
    }

    #[test]
    fn describe_requires_accept_header() {
        let (mut handler, _sources, source) = handler_with_source();
        let req = request("DESCRIBE", 1, &format!("rtsp://host/live/{}", source.id()), &[]);
        let resp = handler.handle(&req).unwrap();
        assert_eq!(resp.status_code, 400);
    }

    #[test]
    fn describe_returns_sdp_body() {
        let (mut handler, _sources, source) = handler_with_source();
        let req = request(
            "DESCRIBE",
            1,
            &format!("rtsp://host/live/{}", source.id()),
            &[("Accept", "application/sdp")],
        );
        let resp = handler.handle(&req).unwrap();
        assert_eq!(resp.status_code, 200);
        assert!(resp.body.unwrap().starts_with("v=0"));
    }

    #[test]
    fn repeated_cseq_is_silently_dropped() {
        let (mut handler, _sources, source) = handler_with_source();
        let req = request("OPTIONS", 7, &format!("rtsp://host/live/{}", source.id()), &[]);
        assert!(handler.handle(&req).is_some());
        assert!(handler.handle(&req).is_none());
    }

    #[test]
    fn setup_udp_then_play_returns_rtp_info() {
        let (mut handler, _sources, source) = handler_with_source();
        let uri = format!("rtsp://host/live/{}/track1", source.id());

        let setup_req = request(
            "SETUP",
            1,
            &uri,
            &[("Transport", "RTP/AVP;unicast;client_port=5000-5001")],
        );
        let setup_resp = handler.handle(&setup_req).unwrap();
        assert_eq!(setup_resp.status_code, 200);
        let session_header = setup_resp
            .headers
            .iter()
            .find(|(k, _)| k == "Session")
            .unwrap()
            .1
            .clone();
        let token = session_header.split(';').next().unwrap().to_string();

        let play_req = request(
            "PLAY",
            2,
            &format!("rtsp://host/live/{}", source.id()),
            &[("Session", &token), ("Range", "npt=0.000-")],
        );
        let play_resp = handler.handle(&play_req).unwrap();
        assert_eq!(play_resp.status_code, 200);
        assert!(
            play_resp
                .headers
                .iter()
                .any(|(k, v)| k == "RTP-Info" && v.contains("url="))
        );
    }

    #[test]
    fn setup_force_tcp_source_rejects_udp() {
        let (mut handler, _sources, _source) = handler_with_source();
        let forced = Arc::new(
            Source::new("forced")
                .with_description(
                    SessionDescription::new().with_media(MediaDescription::new("video", "96", "track1")),
                )
                .with_force_tcp(true),
        );
        forced.start().unwrap();
        forced.mark_ready();
        handler.sources.add(forced.clone()).unwrap();

        let uri = format!("rtsp://host/live/{}/track1", forced.id());
        let req = request("SETUP", 1, &uri, &[("Transport", "RTP/AVP;unicast;client_port=5000-5001")]);
        let resp = handler.handle(&req).unwrap();
        assert_eq!(resp.status_code, 461);
    }

    #[test]
    fn play_without_setup_returns_412() {
        let (mut handler, _sources, source) = handler_with_source();
        let req = request("PLAY", 1, &format!("rtsp://host/live/{}", source.id()), &[]);
        let resp = handler.handle(&req).unwrap();
        assert_eq!(resp.status_code, 412);
    }

    #[test]
    fn session_hijack_from_other_peer_is_rejected() {
        let (mut handler, _sources, source) = handler_with_source();
        let uri = format!("rtsp://host/live/{}/track1", source.id());
        let setup_req = request("SETUP", 1, &uri, &[("Transport", "RTP/AVP;unicast;client_port=5000-5001")]);
        let setup_resp = handler.handle(&setup_req).unwrap();
        let session_header = setup_resp
            .headers
            .iter()
            .find(|(k, _)| k == "Session")
            .unwrap()
            .1
            .clone();
        let token = session_header.split(';').next().unwrap().to_string();

        // A second handler on a different peer address tries to reuse the token.
        let sessions = handler.sessions.clone();
        let other_peer: SocketAddr = "10.0.0.9:4000".parse().unwrap();
        let other_session = Arc::new(Session::new(other_peer, 60));
        sessions.add(other_session.clone());
        let mut attacker = MethodHandler::new(
            handler.sources.clone(),
            sessions,
            handler.config.clone(),
            other_session,
            other_peer,
            local(),
        );

        let req = request(
            "GET_PARAMETER",
            1,
            &format!("rtsp://host/live/{}", source.id()),
            &[("Session", &token)],
        );
        let resp = attacker.handle(&req).unwrap();
        assert_eq!(resp.status_code, 401);
    }

    #[test]
    fn setup_second_track_gets_incremented_channel_pair() {
        let sources = SourceRegistry::new();
        let sessions = SessionRegistry::default();
        let config = Arc::new(ServerConfig::default());
        let session = Arc::new(Session::new(peer(), config.client_inactivity_timeout_seconds));
        sessions.add(session.clone());

        let source = Arc::new(
            Source::new("camera1").with_description(
                SessionDescription::new()
                    .with_media(MediaDescription::new("video", "96", "track1"))
                    .with_media(MediaDescription::new("audio", "97", "track2")),
            ),
        );
        source.start().unwrap();
        source.mark_ready();
        sources.add(source.clone()).unwrap();

        let mut handler = MethodHandler::new(
            sources.clone(),
            sessions,
            config,
            session.clone(),
            peer(),
            local(),
        );

        let setup_track1 = request(
            "SETUP",
            1,
            &format!("rtsp://host/live/{}/track1", source.id()),
            &[("Transport", "RTP/AVP;unicast;client_port=5000-5001")],
        );
        let setup_resp = handler.handle(&setup_track1).unwrap();
        assert_eq!(setup_resp.status_code, 200);
        let session_header = setup_resp
            .headers
            .iter()
            .find(|(k, _)| k == "Session")
            .unwrap()
            .1
            .clone();
        let token = session_header.split(';').next().unwrap().to_string();

        let setup_track2 = request(
            "SETUP",
            2,
            &format!("rtsp://host/live/{}/track2", source.id()),
            &[
                ("Transport", "RTP/AVP;unicast;client_port=5002-5003"),
                ("Session", &token),
            ],
        );
        assert_eq!(handler.handle(&setup_track2).unwrap().status_code, 200);

        let contexts = session.client_contexts();
        assert_eq!(contexts.len(), 2);
        assert_eq!(contexts[0].data_channel, Some(0));
        assert_eq!(contexts[0].control_channel, Some(1));
        assert_eq!(contexts[1].data_channel, Some(2));
        assert_eq!(contexts[1].control_channel, Some(3));
    }

    #[test]
    fn setup_tcp_after_udp_switches_session_to_tcp_with_empty_queues() {
        let (mut handler, _sources, source) = handler_with_source();
        let session = handler.session().clone();
        let uri = format!("rtsp://host/live/{}/track1", source.id());

        let setup_udp = request("SETUP", 1, &uri, &[("Transport", "RTP/AVP;unicast;client_port=5000-5001")]);
        let setup_resp = handler.handle(&setup_udp).unwrap();
        assert_eq!(setup_resp.status_code, 200);
        assert_eq!(session.client_contexts()[0].protocol, TransportProtocol::Udp);

        let session_header = setup_resp
            .headers
            .iter()
            .find(|(k, _)| k == "Session")
            .unwrap()
            .1
            .clone();
        let token = session_header.split(';').next().unwrap().to_string();

        let setup_tcp = request(
            "SETUP",
            2,
            &uri,
            &[("Transport", "RTP/AVP/TCP;unicast;interleaved=0-1"), ("Session", &token)],
        );
        let resp = handler.handle(&setup_tcp).unwrap();
        assert_eq!(resp.status_code, 200);

        let contexts = session.client_contexts();
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].protocol, TransportProtocol::Tcp);
        assert!(session.with_media_client(|c| c.queues_empty()).unwrap());
    }
}
