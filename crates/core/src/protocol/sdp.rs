//! Session description model and rendering (RFC 4566).
//!
//! `spec.md` §3 gives each `Source` a "session description once known".
//! This module models that description as a small in-memory structure
//! (rather than raw text) so method handlers can look up the media
//! description for a requested track (`SETUP`'s `a=control:` match) and
//! so `b=RR:0`/`b=RS:0` can toggle RTCP per track (`spec.md` §4.5).
//!
//! Building the full generality of SDP (RFC 4566) is out of scope — the
//! "session description" collaborator is named explicitly out of scope in
//! `spec.md` §1. This module only keeps what the control plane reads.

/// One `m=` media section plus its attribute lines.
#[derive(Debug, Clone)]
pub struct MediaDescription {
    /// `m=` media type, e.g. `"video"`, `"audio"`.
    pub media_type: String,
    /// `m=` format/payload type token, e.g. `"96"`.
    pub format: String,
    /// Value of `a=control:<track>` for this media section.
    pub control: String,
    /// Remaining `a=` attribute lines verbatim (rtpmap, fmtp, ...),
    /// without the `a=` prefix.
    pub attributes: Vec<String>,
    /// Set when `b=RR:0` and `b=RS:0` both appear under this media
    /// section, jointly disabling RTCP for the track (`spec.md` §4.5).
    pub rtcp_disabled: bool,
}

impl MediaDescription {
    pub fn new(
        media_type: impl Into<String>,
        format: impl Into<String>,
        control: impl Into<String>,
    ) -> Self {
        Self {
            media_type: media_type.into(),
            format: format.into(),
            control: control.into(),
            attributes: Vec::new(),
            rtcp_disabled: false,
        }
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attributes.push(attribute.into());
        self
    }

    pub fn with_rtcp_disabled(mut self) -> Self {
        self.rtcp_disabled = true;
        self
    }

    /// Whether the final URI segment identifies this track.
    ///
    /// `spec.md` §4.5: "Identify track from the final URI segment by
    /// matching against each media description's `a=control:<track>`
    /// attribute (equality or containment)."
    pub fn matches_track(&self, segment: &str) -> bool {
        self.control == segment
            || self.control.contains(segment)
            || segment.contains(&self.control)
    }

    fn render(&self, lines: &mut Vec<String>) {
        lines.push(format!("m={} 0 RTP/AVP {}", self.media_type, self.format));
        if self.rtcp_disabled {
            lines.push("b=RR:0".to_string());
            lines.push("b=RS:0".to_string());
        }
        for attr in &self.attributes {
            lines.push(format!("a={attr}"));
        }
        lines.push(format!("a=control:{}", self.control));
    }
}

/// A source's full session description: origin/session-level lines plus
/// one `MediaDescription` per track.
#[derive(Debug, Clone, Default)]
pub struct SessionDescription {
    pub media: Vec<MediaDescription>,
}

impl SessionDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_media(mut self, media: MediaDescription) -> Self {
        self.media.push(media);
        self
    }

    /// Find the media description whose `a=control:` matches `segment`.
    pub fn find_track(&self, segment: &str) -> Option<&MediaDescription> {
        self.media.iter().find(|m| m.matches_track(segment))
    }

    /// Find the media description a [`MediaRef`](crate::session::transport::MediaRef)
    /// was derived from, by media type + format.
    pub fn find_track_by_media(
        &self,
        media: &crate::session::transport::MediaRef,
    ) -> Option<&MediaDescription> {
        self.media
            .iter()
            .find(|m| m.media_type == media.media_type && m.format == media.format)
    }

    /// Render to SDP text for a DESCRIBE response body.
    pub fn render(
        &self,
        ip: &str,
        username: &str,
        session_id: &str,
        session_version: &str,
        session_name: &str,
    ) -> String {
        let mut lines: Vec<String> = Vec::new();
        lines.push("v=0".to_string());
        lines.push(format!(
            "o={username} {session_id} {session_version} IN IP4 {ip}"
        ));
        lines.push(format!("s={session_name}"));
        lines.push(format!("c=IN IP4 {ip}"));
        lines.push("t=0 0".to_string());
        lines.push("a=tool:rtsp-rs".to_string());
        lines.push("a=recvonly".to_string());

        for media in &self.media {
            media.render(&mut lines);
        }

        tracing::trace!(lines = lines.len(), "rendered session description");
        format!("{}\r\n", lines.join("\r\n"))
    }
}
