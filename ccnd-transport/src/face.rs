//! Socket-level I/O for a face.
//!
//! Grounded on `rust-udcn-quic/src/face.rs`'s `Face`/`FaceEvent` vocabulary
//! (same two names are kept) but the QUIC `Connection`/bi-stream pair is
//! replaced by a plain mio socket: a `TcpStream`/`UnixStream` for
//! stream-oriented faces, or a shared `UdpSocket` plus a fixed peer address
//! for a datagram face (spec §3 "transport kind"). There is no per-face
//! async task here — `ccnd-core::reactor::Reactor` drives everything from
//! one thread, so reads and writes happen synchronously inside the
//! dispatch callback, never blocking past what the socket already has
//! buffered (spec §4.B, §5).

use std::io::{self, ErrorKind, Read, Write};
use std::net::SocketAddr;

use bytes::{Buf, BytesMut};
use ccnd_common::ndn::NdnPacket;
use mio::net::{TcpStream, UdpSocket, UnixStream};
use mio::Token;

use crate::packet;

/// Events surfaced to the transport's dispatch loop after servicing a
/// socket (spec §3 Face; same vocabulary as the teacher's `FaceEvent`,
/// carrying this crate's packet types instead of QUIC-specific ones).
#[derive(Debug)]
pub enum FaceEvent {
    InterestReceived(ccnd_common::ndn::Interest),
    ContentReceived(ccnd_common::ndn::ContentObject),
    Closed,
    WouldBlock,
}

/// The concrete socket backing a stream-oriented face.
pub enum StreamSocket {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl StreamSocket {
    fn as_source(&mut self) -> &mut dyn mio::event::Source {
        match self {
            StreamSocket::Tcp(s) => s,
            StreamSocket::Unix(s) => s,
        }
    }
}

impl Read for StreamSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            StreamSocket::Tcp(s) => s.read(buf),
            StreamSocket::Unix(s) => s.read(buf),
        }
    }
}

impl Write for StreamSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            StreamSocket::Tcp(s) => s.write(buf),
            StreamSocket::Unix(s) => s.write(buf),
        }
    }
    fn flush(&mut self) -> io::Result<()> {
        match self {
            StreamSocket::Tcp(s) => s.flush(),
            StreamSocket::Unix(s) => s.flush(),
        }
    }
}

pub fn register_stream(
    registry: &mio::Registry,
    socket: &mut StreamSocket,
    token: Token,
) -> io::Result<()> {
    registry.register(socket.as_source(), token, mio::Interest::READABLE | mio::Interest::WRITABLE)
}

pub fn deregister_stream(registry: &mio::Registry, socket: &mut StreamSocket) -> io::Result<()> {
    registry.deregister(socket.as_source())
}

/// Drain whatever is currently readable from `socket` into `input_buf`,
/// then decode as many complete wire elements as are available. Returns
/// `Closed` once the peer has shut its write half and nothing remains
/// buffered (spec §4.B "Input path reassembles a complete wire element
/// using a streaming skeleton decoder").
pub fn pump_stream_read(
    socket: &mut StreamSocket,
    input_buf: &mut BytesMut,
) -> (Vec<NdnPacket>, bool) {
    let mut packets = Vec::new();
    let mut closed = false;
    let mut chunk = [0u8; 8192];

    loop {
        match socket.read(&mut chunk) {
            Ok(0) => {
                closed = true;
                break;
            }
            Ok(n) => input_buf.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(_) => {
                closed = true;
                break;
            }
        }
    }

    loop {
        match packet::try_decode_one(input_buf) {
            Ok(Some(pkt)) => packets.push(pkt),
            Ok(None) => break,
            Err(_) => {
                // a malformed element desyncs the stream; drop everything
                // buffered rather than spin on the same bad bytes.
                input_buf.clear();
                break;
            }
        }
    }

    (packets, closed && input_buf.is_empty())
}

/// Write as much of `output_buf` as the socket accepts right now. Leaves
/// any unwritten remainder in place for the next writable event (spec §3
/// "Deferred-output buffer used when a send would block").
pub fn pump_stream_write(socket: &mut StreamSocket, output_buf: &mut BytesMut) -> io::Result<()> {
    while !output_buf.is_empty() {
        match socket.write(output_buf) {
            Ok(0) => return Err(io::Error::new(ErrorKind::WriteZero, "socket accepted 0 bytes")),
            Ok(n) => output_buf.advance(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Receive every datagram currently queued on a shared `UdpSocket`,
/// decoding each as one complete wire element (spec §3 "one recv() carries
/// exactly one wire element"). Returns `(peer_addr, packet)` pairs so the
/// caller can intern or look up a per-peer face.
pub fn drain_datagrams(socket: &UdpSocket) -> Vec<(SocketAddr, io::Result<NdnPacket>)> {
    let mut out = Vec::new();
    let mut buf = [0u8; 9000];
    loop {
        match socket.recv_from(&mut buf) {
            Ok((n, addr)) => {
                let decoded = packet::decode_datagram(&buf[..n])
                    .map_err(|e| io::Error::new(ErrorKind::InvalidData, e.to_string()));
                out.push((addr, decoded));
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    out
}

pub fn send_datagram(socket: &UdpSocket, addr: SocketAddr, bytes: &[u8]) -> io::Result<()> {
    socket.send_to(bytes, addr).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use ccnd_common::ndn::{Interest, Name};

    #[test]
    fn stream_read_decodes_multiple_queued_elements() {
        // exercised indirectly through packet::try_decode_one; this just
        // checks the loop terminates cleanly on a buffer with two elements
        // and a trailing partial one.
        let i1 = NdnPacket::Interest(Interest::new(Name::from_string("/a")).with_nonce(Bytes::from_static(b"n1")));
        let i2 = NdnPacket::Interest(Interest::new(Name::from_string("/b")).with_nonce(Bytes::from_static(b"n2")));
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&packet::encode(&i1));
        buf.extend_from_slice(&packet::encode(&i2));
        buf.extend_from_slice(&[0x07]); // partial trailing element

        let mut decoded = Vec::new();
        loop {
            match packet::try_decode_one(&mut buf) {
                Ok(Some(p)) => decoded.push(p),
                Ok(None) => break,
                Err(_) => break,
            }
        }
        assert_eq!(decoded.len(), 2);
        assert_eq!(buf.len(), 1);
    }
}
