//! High-level orchestration: owns every bound socket, the `ccnd-core`
//! `Daemon`, and the mio event loop tying them together.
//!
//! Grounded on `rust-udcn-quic/src/transport.rs`'s `NdnQuicTransport`
//! (single struct owning client/server/faces/events), but rebuilt around
//! `ccnd_core::reactor::Reactor::run_once` instead of a tokio task per
//! connection, since the daemon crate mandates one thread, no locks, no
//! async runtime (spec §5).

use std::collections::HashMap;
use std::io::ErrorKind;

use ccnd_core::config::CcndConfig;
use ccnd_core::daemon::{Daemon, DispatchAction};
use ccnd_core::face_table::TransportKind;
use ccnd_common::types::{FaceFlags, FaceId};
use mio::net::{TcpListener, UdpSocket, UnixListener};
use mio::{Interest as MioInterest, Token};

use crate::face::{self, StreamSocket};
use crate::fragmentation;
use crate::listener::{self, BoundSocket};

enum Listener {
    Tcp(TcpListener),
    Unix(UnixListener),
}

/// Owns the whole forwarder process: listener sockets, connected faces,
/// and the `Daemon` that makes forwarding decisions.
pub struct Transport {
    pub daemon: Daemon,
    listeners: HashMap<Token, Listener>,
    streams: HashMap<Token, StreamSocket>,
    /// Shared UDP sockets, one per bound local address (spec §3: many
    /// datagram peer faces share one socket).
    datagrams: HashMap<Token, UdpSocket>,
    /// Maps a face's token back to the datagram socket it was learned on,
    /// so a reply can be sent from the same local address it arrived on.
    face_datagram_parent: HashMap<FaceId, Token>,
    next_token: usize,
}

impl Transport {
    pub fn new(config: CcndConfig, local_socket_path: Option<std::path::PathBuf>) -> anyhow::Result<Self> {
        let daemon = Daemon::new(config)?;
        let mut transport = Self {
            daemon,
            listeners: HashMap::new(),
            streams: HashMap::new(),
            datagrams: HashMap::new(),
            face_datagram_parent: HashMap::new(),
            next_token: 1,
        };
        transport.bind_configured(local_socket_path)?;
        transport.daemon.schedule_reapers();
        Ok(transport)
    }

    fn alloc_token(&mut self) -> Token {
        let t = Token(self.next_token);
        self.next_token += 1;
        t
    }

    fn bind_configured(&mut self, local_socket_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
        let cfg = self.daemon.config.clone();
        let bound = listener::bind_all(cfg.listen_addresses(), cfg.ccn_local_port, local_socket_path)
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;

        for sock in bound {
            let token = self.alloc_token();
            match sock {
                BoundSocket::Tcp(mut l) => {
                    self.daemon.reactor.register(&mut l, token, MioInterest::READABLE)?;
                    self.listeners.insert(token, Listener::Tcp(l));
                }
                BoundSocket::Unix(mut l) => {
                    self.daemon.reactor.register(&mut l, token, MioInterest::READABLE)?;
                    self.listeners.insert(token, Listener::Unix(l));
                }
                BoundSocket::Udp(mut u) => {
                    self.daemon.reactor.register(&mut u, token, MioInterest::READABLE)?;
                    self.datagrams.insert(token, u);
                }
            }
        }
        Ok(())
    }

    /// Run the event loop until the daemon is told to stop (spec §4.A).
    pub fn run(&mut self) -> anyhow::Result<()> {
        while self.daemon.is_running() {
            self.step()?;
        }
        Ok(())
    }

    /// Run a single reactor iteration; split out from `run` so tests and
    /// the `ccnd` binary can drive it under their own loop condition.
    pub fn step(&mut self) -> anyhow::Result<()> {
        let mut ready: Vec<(Token, bool, bool)> = Vec::new();
        self.daemon.reactor.run_once(|events| {
            for event in events.iter() {
                ready.push((event.token(), event.is_readable(), event.is_writable()));
            }
        })?;

        for (token, readable, writable) in ready {
            if self.listeners.contains_key(&token) {
                if readable {
                    self.accept_on(token)?;
                }
                continue;
            }
            if self.datagrams.contains_key(&token) {
                if readable {
                    self.service_datagram_socket(token);
                }
                continue;
            }
            if self.streams.contains_key(&token) {
                if readable {
                    self.service_stream_readable(token);
                }
                if writable {
                    self.service_stream_writable(token);
                }
            }
        }

        // Reaper rounds, interest retransmits and delivery-queue fires are
        // all timer-driven (spec §4.A step 5, §4.F, §4.H); `drain_pending`
        // is where their effects actually reach the wire.
        for (face, bytes) in self.daemon.drain_pending() {
            self.send_to_face(face, &bytes);
        }
        Ok(())
    }

    fn accept_on(&mut self, listener_token: Token) -> anyhow::Result<()> {
        loop {
            let accepted = match self.listeners.get_mut(&listener_token).unwrap() {
                Listener::Tcp(l) => match l.accept() {
                    Ok((stream, addr)) => Some((StreamSocket::Tcp(stream), Some(addr))),
                    Err(e) if e.kind() == ErrorKind::WouldBlock => None,
                    Err(_) => None,
                },
                Listener::Unix(l) => match l.accept() {
                    Ok((stream, _addr)) => Some((StreamSocket::Unix(stream), None)),
                    Err(e) if e.kind() == ErrorKind::WouldBlock => None,
                    Err(_) => None,
                },
            };
            let Some((mut sock, peer_addr)) = accepted else { break };

            let token = self.alloc_token();
            let registry = self.daemon.reactor.poll_registry();
            if face::register_stream(registry, &mut sock, token).is_err() {
                continue;
            }

            let flags = if peer_addr.map(|a| a.ip().is_loopback()).unwrap_or(true) {
                FaceFlags::LOCAL | FaceFlags::CONNECTED
            } else {
                FaceFlags::CONNECTED
            };
            match self.daemon.faces.record_connection(token, TransportKind::StreamUnicast, peer_addr, flags) {
                Ok(_) => {
                    self.streams.insert(token, sock);
                }
                Err(_) => {
                    let registry = self.daemon.reactor.poll_registry();
                    let _ = face::deregister_stream(registry, &mut sock);
                }
            }
        }
        Ok(())
    }

    fn service_datagram_socket(&mut self, token: Token) {
        let Some(socket) = self.datagrams.get(&token) else { return };
        let received = face::drain_datagrams(socket);

        for (addr, decoded) in received {
            let Ok(packet) = decoded else { continue };
            let faceid = match self.daemon.faces.get_dgram_source(token, addr) {
                Ok(id) => id,
                Err(_) => continue,
            };
            self.face_datagram_parent.insert(faceid, token);
            if let Some(face) = self.daemon.faces.get_mut(faceid) {
                face.recv_count_since_reap += 1;
            }

            let raw = crate::packet::encode(&packet);
            let action = self.daemon.dispatch(faceid, packet, raw);
            self.handle_action(faceid, action);
        }
    }

    fn service_stream_readable(&mut self, token: Token) {
        let Some(faceid) = self.daemon.faces.by_token(token) else { return };
        let Some(socket) = self.streams.get_mut(&token) else { return };
        let mut input_buf = self.daemon.faces.get_mut(faceid).map(|f| std::mem::take(&mut f.input_buf)).unwrap_or_default();

        let (packets, closed) = face::pump_stream_read(socket, &mut input_buf);
        if let Some(face) = self.daemon.faces.get_mut(faceid) {
            face.input_buf = input_buf;
            face.recv_count_since_reap += packets.len() as u32;
        }

        for packet in packets {
            let raw = crate::packet::encode(&packet);
            let action = self.daemon.dispatch(faceid, packet, raw);
            self.handle_action(faceid, action);
        }

        if closed {
            self.close_stream(token, faceid);
        }
    }

    fn service_stream_writable(&mut self, token: Token) {
        let Some(faceid) = self.daemon.faces.by_token(token) else { return };
        let Some(socket) = self.streams.get_mut(&token) else { return };
        let mut output_buf = self.daemon.faces.get_mut(faceid).map(|f| std::mem::take(&mut f.output_buf)).unwrap_or_default();
        let result = face::pump_stream_write(socket, &mut output_buf);
        if let Some(face) = self.daemon.faces.get_mut(faceid) {
            face.output_buf = output_buf;
            if result.is_err() {
                face.flags |= FaceFlags::SEND_BLOCKED;
            } else {
                face.flags.remove(FaceFlags::SEND_BLOCKED);
            }
        }
    }

    fn close_stream(&mut self, token: Token, faceid: FaceId) {
        if let Some(mut socket) = self.streams.remove(&token) {
            let registry = self.daemon.reactor.poll_registry();
            let _ = face::deregister_stream(registry, &mut socket);
        }
        let _ = self.daemon.faces.destroy_face(faceid);
    }

    /// Deliver whatever the daemon decided onto the wire (spec §4.F/§4.H
    /// "send now or queue"). `SendNow` is the content-store fast path and
    /// management replies, sent inline; `Scheduled` means the daemon has
    /// already armed reactor timers for the real work (interest
    /// retransmits, delivery-queue fires) and their sends surface through
    /// `drain_pending` at the end of `step`, not here.
    fn handle_action(&mut self, _origin: FaceId, action: DispatchAction) {
        if let DispatchAction::SendNow { face, bytes } = action {
            self.send_to_face(face, &bytes);
        }
    }

    pub fn send_to_face(&mut self, face: FaceId, bytes: &[u8]) {
        if let Some(&token) = self.face_datagram_parent.get(&face) {
            if let (Some(socket), Some(peer)) = (
                self.datagrams.get(&token),
                self.daemon.faces.get(face).and_then(|f| f.peer_addr),
            ) {
                let mtu = self.daemon.config.ccnd_mtu;
                if fragmentation::exceeds_mtu(bytes.len(), mtu) {
                    log::warn!("dropping oversized datagram payload for {face}: {} bytes", bytes.len());
                    return;
                }
                let _ = face::send_datagram(socket, peer, bytes);
                return;
            }
        }

        let token = self.daemon.faces.get(face).map(|f| f.token);
        if let Some(token) = token {
            if let Some(socket) = self.streams.get_mut(&token) {
                if let Some(f) = self.daemon.faces.get_mut(face) {
                    f.output_buf.extend_from_slice(bytes);
                }
                let mut output_buf = self.daemon.faces.get_mut(face).map(|f| std::mem::take(&mut f.output_buf)).unwrap_or_default();
                let _ = face::pump_stream_write(socket, &mut output_buf);
                if let Some(f) = self.daemon.faces.get_mut(face) {
                    f.output_buf = output_buf;
                }
            }
        }
    }
}

