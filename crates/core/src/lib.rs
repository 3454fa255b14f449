//! # rtsp-relay — RTSP aggregator/relay server library
//!
//! An RTSP 1.0 server (RFC 2326) that aggregates one or more upstream RTP
//! media sources and re-publishes them to many downstream RTSP clients.
//! Clients discover, describe, set up, play, pause, and tear down media
//! sessions; the server mediates transport negotiation (RTP over UDP or
//! interleaved over TCP), and enforces per-session liveness.
//!
//! This crate builds the **RTSP control plane and session lifecycle
//! core** — request parsing, method dispatch, the per-session state
//! machine (including transport negotiation and mid-session UDP→TCP
//! switching), the source-to-client attachment graph, Basic/Digest
//! authentication, and the concurrency/timeout regime that keeps all of
//! this safe under many simultaneous clients. Actual RTP/RTCP packet I/O,
//! SR/RR generation, jitter buffering, pulling media from an origin
//! camera, and codec-specific framing are represented as the
//! [`collab::SourceBackend`] and [`collab::MediaClient`] trait interfaces
//! rather than implemented here.
//!
//! ## Protocol references
//!
//! | RFC | Topic | How this crate uses it |
//! |-----|-------|----------------------|
//! | [RFC 2326](https://tools.ietf.org/html/rfc2326) | RTSP 1.0 | Request/response parsing, session lifecycle, transport negotiation |
//! | [RFC 2617](https://tools.ietf.org/html/rfc2617) | HTTP Digest Auth | Basic/Digest challenge and verification |
//! | [RFC 3550](https://tools.ietf.org/html/rfc3550) | RTP | SSRC, sequence/timestamp fields carried in transport contexts |
//! | [RFC 4566](https://tools.ietf.org/html/rfc4566) | SDP | Session description model used by DESCRIBE/SETUP |
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │  Server              — orchestrator, start/stop lifecycle │
//! ├───────────────────────────────────────────────────────┤
//! │  Transport            — tcp / udp / http acceptors       │
//! ├───────────────────────────────────────────────────────┤
//! │  protocol::handler     — method dispatch (8 RTSP methods) │
//! │  auth                  — Basic / Digest challenge+verify  │
//! ├───────────────────────────────────────────────────────┤
//! │  source::SourceRegistry — upstream sources, by id/alias   │
//! │  session::SessionRegistry — client sessions, by id/token  │
//! ├───────────────────────────────────────────────────────┤
//! │  protocol::{request,response,sdp,range,tunnel} — wire codec │
//! │  collab                — SourceBackend / MediaClient traits │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use rtsp_relay::{Server, ServerConfig};
//! use rtsp_relay::source::Source;
//! use std::sync::Arc;
//!
//! let mut server = Server::new(ServerConfig::default());
//! server.add_source(Arc::new(Source::new("camera1"))).unwrap();
//! server.start().unwrap();
//! ```
//!
//! ## Crate layout
//!
//! - [`server`] — [`Server`] orchestrator and [`ServerConfig`].
//! - [`source`] — [`source::Source`] and [`source::SourceRegistry`].
//! - [`session`] — [`session::Session`] state machine and [`session::registry::SessionRegistry`].
//! - [`protocol`] — RTSP request/response parsing, method handling, SDP, Range, HTTP tunnel codec.
//! - [`auth`] — Basic and Digest (RFC 2617) challenge/verify.
//! - [`transport`] — TCP, UDP, and HTTP tunnel acceptors.
//! - [`maintenance`] — periodic inactivity sweep and faulted-source restart.
//! - [`collab`] — [`collab::SourceBackend`] / [`collab::MediaClient`] collaborator interfaces.
//! - [`error`] — [`RtspError`] enum and [`Result`] alias.

pub mod auth;
pub mod collab;
pub mod config;
pub mod error;
pub mod maintenance;
pub mod protocol;
pub mod server;
pub mod session;
pub mod source;
pub mod transport;

pub use config::ServerConfig;
pub use error::{Result, RtspError};
pub use server::Server;
