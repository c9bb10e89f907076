//! Blocking connection to a running `ccnd` daemon.
//!
//! Grounded on `ccnd-transport/src/packet.rs`'s streaming TLV decoder
//! (peek-then-consume against a cloned cursor), reworked from the daemon's
//! non-blocking `mio` socket into a single blocking request/response call,
//! since the CLI is a short-lived process making one round trip per
//! invocation rather than a long-running poll loop.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use bytes::{Buf, BytesMut};
use ccnd_common::ndn::NdnPacket;
use ccnd_common::tlv::TlvElement;

/// Where to reach the daemon's control plane: a TCP address (its normal
/// face-accepting listener) or the local Unix-domain control socket.
#[derive(Debug, Clone)]
pub enum Target {
    Tcp(String),
    Unix(PathBuf),
}

enum Conn {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl Conn {
    fn connect(target: &Target, connect_timeout: Duration) -> Result<Self> {
        match target {
            Target::Tcp(addr) => {
                let resolved = addr
                    .parse()
                    .map_err(|_| anyhow!("not a socket address: {addr}"))?;
                let stream = TcpStream::connect_timeout(&resolved, connect_timeout)?;
                Ok(Conn::Tcp(stream))
            }
            Target::Unix(path) => Ok(Conn::Unix(UnixStream::connect(path)?)),
        }
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match self {
            Conn::Tcp(s) => s.set_read_timeout(timeout)?,
            Conn::Unix(s) => s.set_read_timeout(timeout)?,
        }
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        match self {
            Conn::Tcp(s) => s.write_all(bytes)?,
            Conn::Unix(s) => s.write_all(bytes)?,
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Conn::Tcp(s) => s.read(buf),
            Conn::Unix(s) => s.read(buf),
        }
    }
}

/// Send one packet and wait up to `timeout` for exactly one reply packet.
/// Returns `Ok(None)` on timeout (not an error: the daemon may legitimately
/// never answer a request, e.g. an unrouted interest).
pub fn send_and_await(target: &Target, packet: &NdnPacket, timeout: Duration) -> Result<Option<NdnPacket>> {
    let mut conn = Conn::connect(target, timeout)?;
    conn.write_all(&packet.to_bytes())?;

    let deadline = Instant::now() + timeout;
    let mut buf = BytesMut::new();
    let mut chunk = [0u8; 4096];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(None);
        }
        conn.set_read_timeout(Some(remaining))?;

        let n = match conn.read(&mut chunk) {
            Ok(0) => return Ok(None), // peer closed without a full reply
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                return Ok(None)
            }
            Err(e) => return Err(e.into()),
        };
        buf.extend_from_slice(&chunk[..n]);

        let mut cursor = buf.clone().freeze();
        if TlvElement::decode(&mut cursor).is_ok() {
            let consumed = buf.len() - cursor.remaining();
            let reply = NdnPacket::from_bytes(&buf[..consumed])?;
            return Ok(Some(reply));
        }
    }
}

/// Fire-and-forget send with no reply expected (e.g. publishing an
/// unsolicited Content Object).
pub fn send_only(target: &Target, packet: &NdnPacket) -> Result<()> {
    let mut conn = Conn::connect(target, Duration::from_secs(5))?;
    conn.write_all(&packet.to_bytes())?;
    Ok(())
}
