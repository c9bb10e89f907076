//! Socket transport for the ccnd forwarder.
//!
//! Binds TCP, UDP and a Unix-domain local control socket, feeds decoded
//! wire messages to `ccnd-core::Daemon`, and carries its outbound replies
//! back onto the wire. Replaces the teacher's QUIC/TLS transport outright
//! (spec §6: "TCP, UDP, and a local Unix-domain control channel"); there is
//! no certificate handling or ALPN negotiation here, `ccnd` speaks plain
//! framed NDN TLV.

mod face;
mod fragmentation;
mod listener;
mod packet;
mod transport;

pub use face::FaceEvent;
pub use listener::BoundSocket;
pub use transport::Transport;

/// Maximum single wire element size (spec §6 `CCND_MTU` clamp ceiling,
/// matching RFC 8609's 8800-byte recommendation).
pub const MAX_PACKET_SIZE: usize = 8800;

/// Default listen port for `CCN_LOCAL_PORT` (spec §6), kept for callers
/// that want it without constructing a `CcndConfig`.
pub const DEFAULT_LOCAL_PORT: u16 = 9695;
