//! `Range:` header parsing for `PLAY` (RFC 2326 §12.29).
//!
//! RTSP's `Range` header borrows HTTP's name but not its meaning: it
//! names a playback position in one of three time formats, not a byte
//! range. This module only parses what a `PLAY` handler needs — a start
//! position and an optional end position, both in seconds relative to
//! the stream.

use chrono::{DateTime, Utc};

/// A parsed `Range:` header value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    /// Start position, in seconds from the beginning of the stream.
    pub start: f64,
    /// End position, in seconds from the beginning of the stream, if given.
    pub end: Option<f64>,
}

impl Range {
    /// Parse a `Range:` header value such as `npt=0.000-`, `npt=10-20`,
    /// `smpte=0:10:00-`, or `clock=20160101T000000Z-20160101T000100Z`.
    ///
    /// Returns `None` when the unit is unrecognized or the value cannot
    /// be parsed; callers fall back to playing from the current position.
    ///
    /// `clock=` with both ends in the future reproduces a known quirk:
    /// rather than parsing `end` independently, the same `start - now`
    /// offset is copied into `end` too, so `end` comes back equal to
    /// `start`. This is not a new design choice; it faithfully
    /// reproduces documented source behavior rather than "fixing" a
    /// result callers may already depend on.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Some(rest) = value.strip_prefix("npt=") {
            Self::parse_npt(rest)
        } else if let Some(rest) = value.strip_prefix("smpte=") {
            Self::parse_smpte(rest)
        } else if let Some(rest) = value.strip_prefix("clock=") {
            Self::parse_clock(rest)
        } else {
            None
        }
    }

    fn parse_npt(rest: &str) -> Option<Self> {
        if rest.trim() == "now" {
            // `npt=now` names the current position rather than a
            // concrete offset; both ends come back nil (`spec.md` §4.5).
            return Some(Self { start: 0.0, end: None });
        }
        let (start_s, end_s) = rest.split_once('-')?;
        let start = parse_npt_time(start_s)?;
        let end = if end_s.is_empty() {
            None
        } else {
            parse_npt_time(end_s)
        };
        Some(Self { start, end })
    }

    fn parse_smpte(rest: &str) -> Option<Self> {
        let (start_s, end_s) = rest.split_once('-')?;
        let start = parse_smpte_time(start_s)?;
        let end = if end_s.is_empty() {
            None
        } else {
            parse_smpte_time(end_s)
        };
        Some(Self { start, end })
    }

    fn parse_clock(rest: &str) -> Option<Self> {
        let (start_s, end_s) = rest.split_once('-')?;
        let start_ts = parse_clock_time(start_s)?;
        let now = Utc::now();
        let start = (start_ts - now).num_milliseconds() as f64 / 1000.0;

        if end_s.is_empty() {
            return Some(Self { start, end: None });
        }

        let end_ts = parse_clock_time(end_s)?;
        let end = if start_ts > now && end_ts > now {
            // Documented quirk: both ends in the future copies the same
            // `start_ts - now` offset into `end` rather than computing
            // `end_ts - now` independently, so `end` equals `start`.
            Some(start)
        } else {
            Some((end_ts - now).num_milliseconds() as f64 / 1000.0)
        };
        Some(Self { start, end })
    }
}

fn parse_npt_time(s: &str) -> Option<f64> {
    if s.contains(':') {
        // npt-hhmmss: H:MM:SS(.frac)
        let mut parts = s.split(':');
        let h: f64 = parts.next()?.parse().ok()?;
        let m: f64 = parts.next()?.parse().ok()?;
        let sec: f64 = parts.next()?.parse().ok()?;
        Some(h * 3600.0 + m * 60.0 + sec)
    } else {
        s.parse().ok()
    }
}

fn parse_smpte_time(s: &str) -> Option<f64> {
    let mut parts = s.split(':');
    let h: f64 = parts.next()?.parse().ok()?;
    let m: f64 = parts.next()?.parse().ok()?;
    let rest = parts.next()?;
    let (sec, frames) = rest.split_once(':').unwrap_or((rest, "0"));
    let sec: f64 = sec.parse().ok()?;
    let frames: f64 = frames.parse().unwrap_or(0.0);
    // SMPTE 25 fps is the common case for this server's sources.
    Some(h * 3600.0 + m * 60.0 + sec + frames / 25.0)
}

fn parse_clock_time(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim_end_matches('Z');
    let naive = chrono::NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S").ok()?;
    Some(DateTime::from_naive_utc_and_offset(naive, Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_open_ended_npt() {
        let r = Range::parse("npt=0.000-").unwrap();
        assert_eq!(r.start, 0.0);
        assert_eq!(r.end, None);
    }

    #[test]
    fn parses_bounded_npt() {
        let r = Range::parse("npt=10-20").unwrap();
        assert_eq!(r.start, 10.0);
        assert_eq!(r.end, Some(20.0));
    }

    #[test]
    fn parses_npt_hhmmss() {
        let r = Range::parse("npt=0:00:10-0:00:20").unwrap();
        assert_eq!(r.start, 10.0);
        assert_eq!(r.end, Some(20.0));
    }

    #[test]
    fn parses_smpte_timecode() {
        let r = Range::parse("smpte=0:10:20:05-").unwrap();
        assert!((r.start - (10.0 * 60.0 + 20.0 + 5.0 / 25.0)).abs() < 1e-6);
    }

    #[test]
    fn clock_both_ends_in_the_past_computes_independently() {
        let r = Range::parse("clock=20200101T000000Z-20200101T000100Z").unwrap();
        // Both timestamps are far in the past: end - start should be 60s.
        assert!((r.end.unwrap() - r.start - 60.0).abs() < 1.0);
    }

    #[test]
    fn clock_both_ends_in_the_future_copies_start_offset_into_end() {
        let far_future = Utc::now() + chrono::Duration::days(3650);
        let start = far_future.format("%Y%m%dT%H%M%SZ").to_string();
        let end = (far_future + chrono::Duration::minutes(5)).format("%Y%m%dT%H%M%SZ").to_string();
        let r = Range::parse(&format!("clock={start}-{end}")).unwrap();
        // Documented quirk: end is copied from the start offset, not
        // computed independently from end_ts, so end == start even
        // though end_ts is 5 minutes later than start_ts.
        assert_eq!(r.end, Some(r.start));
    }

    #[test]
    fn unrecognized_unit_returns_none() {
        assert!(Range::parse("bytes=0-100").is_none());
    }

    #[test]
    fn npt_now_has_no_end() {
        let r = Range::parse("npt=now").unwrap();
        assert_eq!(r.end, None);
    }
}
