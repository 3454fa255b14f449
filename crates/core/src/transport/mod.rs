//! Acceptor / Transport Bridge (`spec.md` §4.7): three ways bytes reach
//! the same [`MethodHandler`](crate::protocol::handler::MethodHandler)
//! dispatch.
//!
//! - [`tcp`]: mandatory TCP control connections, one worker thread per
//!   accepted connection, bounded by `ServerConfig.maximum_clients`.
//! - [`udp`]: optional UDP RTSP signaling, one `Session` seeded per peer.
//! - [`http`]: optional HTTP tunnel, one synchronous POST per RTSP
//!   request.
//!
//! RTP/RTCP media delivery itself is outside this spec's scope — it lives
//! behind the [`collab::MediaClient`](crate::collab::MediaClient)
//! collaborator, not in this module.

pub mod http;
pub mod tcp;
pub mod udp;
