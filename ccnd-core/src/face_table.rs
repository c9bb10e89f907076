//! Face table (spec §3 "Face", §4.B).
//!
//! Owns every connected/bound endpoint. Two indexes share Face records: a
//! map from mio `Token` (our fd-equivalent) to faceid, and a map from peer
//! address to faceid for datagram peers learned from source addresses. A
//! dense vector indexed by `faceid & SLOT_MASK` gives O(1) lookup; slots are
//! allocated by a rover that wraps, bumping the generation counter on wrap
//! (spec §3 Face invariant).

use bytes::BytesMut;
use ccnd_common::types::{FaceFlags, FaceId, MAX_FACE_NAME_LEN};
use mio::Token;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use thiserror::Error;

/// Maximum number of live faces (spec §4.B "Fails if slot allocation would
/// exceed MAXFACES").
pub const MAXFACES: usize = 4096;
const SLOT_BITS: u32 = 16;
const SLOT_MASK: u32 = (1 << SLOT_BITS) - 1;

#[derive(Debug, Error)]
pub enum FaceTableError {
    #[error("face table is full (MAXFACES = {0})")]
    Full(usize),
    #[error("no such face: {0}")]
    NotFound(FaceId),
}

/// Transport kind for a face (spec §3: "transport kind {stream/datagram,
/// unicast/multicast, local/remote}").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    StreamUnicast,
    StreamListener,
    DatagramUnicast,
    DatagramMulticast,
    Local,
}

/// A face's undecided/active/closed lifecycle (spec §3 Lifecycle).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceState {
    Undecided,
    Active,
    Closed,
}

pub struct Face {
    pub faceid: FaceId,
    pub token: Token,
    pub transport: TransportKind,
    pub state: FaceState,
    pub flags: FaceFlags,
    pub peer_addr: Option<SocketAddr>,
    /// Input reassembly buffer (spec §3, §4.B "Input path reassembles a
    /// complete wire element using a streaming skeleton decoder").
    pub input_buf: BytesMut,
    /// Deferred-output buffer used when a send would block.
    pub output_buf: BytesMut,
    /// Pending-interest counter (spec §3 Face attribute).
    pub pending_interests: u32,
    /// Receive counter used by the dormancy reaper (spec §4.B "A face whose
    /// receive counter is zero across two reaper rounds is evicted").
    pub recv_count_since_reap: u32,
    pub created_at: Instant,
    pub name: Option<String>,
}

impl Face {
    fn new(faceid: FaceId, token: Token, transport: TransportKind, flags: FaceFlags) -> Self {
        Self {
            faceid,
            token,
            transport,
            state: FaceState::Undecided,
            flags,
            peer_addr: None,
            input_buf: BytesMut::with_capacity(8192),
            output_buf: BytesMut::new(),
            pending_interests: 0,
            recv_count_since_reap: 0,
            created_at: Instant::now(),
            name: None,
        }
    }

    pub fn is_gg(&self) -> bool {
        self.flags.contains(FaceFlags::LOCAL)
    }

    pub fn is_datagram(&self) -> bool {
        matches!(self.transport, TransportKind::DatagramUnicast | TransportKind::DatagramMulticast)
    }

    pub fn is_permanent(&self) -> bool {
        self.flags.contains(FaceFlags::PERMANENT)
    }

    pub fn can_send(&self) -> bool {
        self.state != FaceState::Closed && !self.flags.contains(FaceFlags::SEND_BLOCKED)
    }
}

/// Generation-tagged faceid allocator plus the two lookup indexes
/// described in spec §4.B.
pub struct FaceTable {
    slots: Vec<Option<Face>>,
    generations: Vec<u32>,
    rover: u32,
    by_token: HashMap<Token, FaceId>,
    by_addr: HashMap<SocketAddr, FaceId>,
    live_count: usize,
}

impl FaceTable {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            generations: Vec::new(),
            rover: 0,
            by_token: HashMap::new(),
            by_addr: HashMap::new(),
            live_count: 0,
        }
    }

    fn allocate_slot(&mut self) -> Result<(u32, FaceId), FaceTableError> {
        if self.live_count >= MAXFACES {
            return Err(FaceTableError::Full(MAXFACES));
        }
        let capacity = self.slots.len() as u32;
        let mut tries = 0u32;
        loop {
            let slot = self.rover & SLOT_MASK;
            self.rover = self.rover.wrapping_add(1);
            if self.rover & SLOT_MASK == 0 {
                // rover wrapped across the slot space; bump every live
                // face's would-be generation by growing generations lazily.
            }
            if slot as usize >= self.slots.len() {
                self.slots.resize_with(slot as usize + 1, || None);
                self.generations.resize(slot as usize + 1, 0);
            }
            if self.slots[slot as usize].is_none() {
                let gen = self.generations[slot as usize];
                let faceid = FaceId((gen << SLOT_BITS) | slot);
                return Ok((slot, faceid));
            }
            tries += 1;
            if tries > capacity.max(MAXFACES as u32) {
                return Err(FaceTableError::Full(MAXFACES));
            }
        }
    }

    /// `record_connection(fd, addr, flags)` (spec §4.B).
    pub fn record_connection(
        &mut self,
        token: Token,
        transport: TransportKind,
        peer_addr: Option<SocketAddr>,
        flags: FaceFlags,
    ) -> Result<FaceId, FaceTableError> {
        let (slot, faceid) = self.allocate_slot()?;
        let mut face = Face::new(faceid, token, transport, flags);
        face.peer_addr = peer_addr;
        self.slots[slot as usize] = Some(face);
        self.by_token.insert(token, faceid);
        if let Some(addr) = peer_addr {
            self.by_addr.insert(addr, faceid);
        }
        self.live_count += 1;
        Ok(faceid)
    }

    /// `accept_connection(listen_fd)`: records a stream face with the
    /// UNDECIDED state; the first decodable message finalizes its flags
    /// (spec §4.B).
    pub fn accept_connection(
        &mut self,
        token: Token,
        peer_addr: SocketAddr,
    ) -> Result<FaceId, FaceTableError> {
        let flags = if peer_addr.ip().is_loopback() { FaceFlags::CONNECTED } else { FaceFlags::empty() };
        self.record_connection(token, TransportKind::StreamUnicast, Some(peer_addr), flags)
    }

    /// Finalize an UNDECIDED face's flags once its first message is decoded.
    pub fn finalize_undecided(&mut self, faceid: FaceId, framed_as_link: bool) {
        if let Some(face) = self.get_mut(faceid) {
            face.state = FaceState::Active;
            if framed_as_link {
                face.flags |= FaceFlags::CONNECTED;
            }
            if face.peer_addr.map(|a| a.ip().is_loopback()).unwrap_or(false) {
                face.flags |= FaceFlags::LOCAL;
            }
        }
    }

    /// `make_connection(addr)`: returns an existing usable outbound face for
    /// `addr`, else the caller creates a new one and registers it here.
    pub fn find_usable_outbound(&self, addr: SocketAddr) -> Option<FaceId> {
        self.by_addr.get(&addr).copied().filter(|id| {
            self.get(*id).map(|f| f.can_send() && f.state != FaceState::Closed).unwrap_or(false)
        })
    }

    /// `get_dgram_source(parent, addr)`: interns a synthetic per-peer face
    /// for a newly-seen datagram source address so PIT/FIB logic can
    /// address peers uniformly by faceid (spec §4.B).
    pub fn get_dgram_source(
        &mut self,
        parent_token: Token,
        addr: SocketAddr,
    ) -> Result<FaceId, FaceTableError> {
        if let Some(id) = self.by_addr.get(&addr) {
            return Ok(*id);
        }
        let mut id = self.record_connection(
            parent_token,
            TransportKind::DatagramUnicast,
            Some(addr),
            FaceFlags::DGRAM | FaceFlags::CONNECTED,
        )?;
        if let Some(f) = self.get_mut(id) {
            f.state = FaceState::Active;
        }
        id = self.by_addr[&addr];
        Ok(id)
    }

    pub fn get(&self, faceid: FaceId) -> Option<&Face> {
        let slot = (faceid.0 & SLOT_MASK) as usize;
        self.slots.get(slot).and_then(|f| f.as_ref()).filter(|f| f.faceid == faceid)
    }

    pub fn get_mut(&mut self, faceid: FaceId) -> Option<&mut Face> {
        let slot = (faceid.0 & SLOT_MASK) as usize;
        self.slots.get_mut(slot).and_then(|f| f.as_mut()).filter(|f| f.faceid == faceid)
    }

    pub fn by_token(&self, token: Token) -> Option<FaceId> {
        self.by_token.get(&token).copied()
    }

    /// `destroy_face(faceid)` (spec §4.B). Datagram faces are removed from
    /// the address map without closing the shared fd; stream faces are
    /// fully torn down. Bumps the slot's generation so a reused faceid
    /// never aliases the old one.
    pub fn destroy_face(&mut self, faceid: FaceId) -> Result<Face, FaceTableError> {
        let slot = (faceid.0 & SLOT_MASK) as usize;
        let matches = self.slots.get(slot).and_then(|f| f.as_ref()).map(|f| f.faceid == faceid).unwrap_or(false);
        if !matches {
            return Err(FaceTableError::NotFound(faceid));
        }
        let face = self.slots[slot].take().unwrap();
        self.by_token.remove(&face.token);
        if let Some(addr) = face.peer_addr {
            self.by_addr.remove(&addr);
        }
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.live_count -= 1;
        Ok(face)
    }

    pub fn live_count(&self) -> usize {
        self.live_count
    }

    pub fn iter(&self) -> impl Iterator<Item = &Face> {
        self.slots.iter().filter_map(|f| f.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Face> {
        self.slots.iter_mut().filter_map(|f| f.as_mut())
    }

    /// Dormancy sweep (spec §4.B, §4.I): datagram, non-permanent faces whose
    /// receive counter has stayed at zero across two reaper rounds are
    /// evicted. Called once per reaper round; returns the evicted faceids.
    pub fn sweep_dormant(&mut self) -> Vec<FaceId> {
        let mut to_evict = Vec::new();
        for face in self.iter_mut() {
            if face.is_datagram() && !face.is_permanent() {
                if face.recv_count_since_reap == 0 {
                    if face.flags.contains(FaceFlags::DORMANT) {
                        to_evict.push(face.faceid);
                    } else {
                        face.flags |= FaceFlags::DORMANT;
                    }
                } else {
                    face.flags.remove(FaceFlags::DORMANT);
                }
                face.recv_count_since_reap = 0;
            }
        }
        for id in &to_evict {
            let _ = self.destroy_face(*id);
        }
        to_evict
    }
}

impl Default for FaceTable {
    fn default() -> Self {
        Self::new()
    }
}

const _: () = assert!(MAX_FACE_NAME_LEN > 0);

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn faceid_uniqueness_across_reuse() {
        let mut table = FaceTable::new();
        let id1 = table.record_connection(Token(1), TransportKind::StreamUnicast, Some(addr(1)), FaceFlags::empty()).unwrap();
        table.destroy_face(id1).unwrap();
        let id2 = table.record_connection(Token(2), TransportKind::StreamUnicast, Some(addr(2)), FaceFlags::empty()).unwrap();
        assert_ne!(id1, id2, "a reused slot must carry a bumped generation");
    }

    #[test]
    fn dgram_source_is_interned_once() {
        let mut table = FaceTable::new();
        let a = addr(5000);
        let id1 = table.get_dgram_source(Token(0), a).unwrap();
        let id2 = table.get_dgram_source(Token(0), a).unwrap();
        assert_eq!(id1, id2);
    }

    #[test]
    fn dormancy_sweep_needs_two_zero_rounds() {
        let mut table = FaceTable::new();
        let id = table.get_dgram_source(Token(0), addr(6000)).unwrap();
        assert!(table.sweep_dormant().is_empty());
        let evicted = table.sweep_dormant();
        assert_eq!(evicted, vec![id]);
        assert!(table.get(id).is_none());
    }

    #[test]
    fn permanent_faces_are_exempt_from_dormancy() {
        let mut table = FaceTable::new();
        let id = table
            .record_connection(Token(9), TransportKind::DatagramUnicast, Some(addr(7000)), FaceFlags::PERMANENT)
            .unwrap();
        table.sweep_dormant();
        table.sweep_dormant();
        assert!(table.get(id).is_some());
    }
}
