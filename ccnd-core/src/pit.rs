//! Pending Interest Table (spec §3 "PIT Entry", §4.E).
//!
//! Generalizes `rust-udcn-common::types::{PitKey, PitValue}` — an eBPF map
//! entry keyed by name-hash + nonce — into a `HashMap<Bytes, PitEntry>`
//! keyed on the full nonce, with the owning prefix expressed as a
//! prefix-entry key rather than list membership through raw pointers (§9
//! design note: handles instead of a pointer graph).

use bitflags::bitflags;
use bytes::Bytes;
use ccnd_common::types::FaceId;
use std::collections::HashMap;
use std::time::Instant;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PitEntryFlags: u16 {
        const UNSENT             = 0b0000_0001;
        const WAITED_ONCE        = 0b0000_0010;
        const STUFFED_ONCE       = 0b0000_0100;
        const TAP                = 0b0000_1000;
        /// An equivalent, more-recent PIT entry now serves this interest
        /// (spec §4.F "mark the older entry EQV").
        const SUBSUMED_EQUIVALENT = 0b0001_0000;
        const SCOPE_0            = 0b0010_0000;
        const SCOPE_1            = 0b0100_0000;
        const SCOPE_2            = 0b1000_0000;
    }
}

/// Ordered outbound face plan plus the "sent" cursor (spec §3 "PIT Entry").
pub struct PitEntry {
    pub nonce: Bytes,
    /// The prefix key this entry is linked into (spec §4.E "simultaneously
    /// linked into the propagation list of one Name-Prefix Entry").
    pub prefix_key: Bytes,
    pub origin_face: FaceId,
    pub outbound_plan: Vec<FaceId>,
    pub sent: usize,
    pub usec_to_expiry: i64,
    pub flags: PitEntryFlags,
    pub forward_generation: u64,
    pub extra_delay_usec: i64,
    /// `None` once the entry is consumed (content matched or expired); the
    /// nonce key remains in the table briefly afterward for duplicate
    /// suppression (spec §4.E "PIT entry consume").
    pub interest_bytes: Option<Bytes>,
    pub created_at: Instant,
    /// Incremented once per reaper pass after consumption; the entry is
    /// dropped from the table after two passes (spec §3, §4.I).
    pub reap_rounds_since_consumed: u8,
}

impl PitEntry {
    pub fn is_consumed(&self) -> bool {
        self.interest_bytes.is_none()
    }

    /// Two entries are "similar" per §4.F if everything but the nonce matches.
    pub fn next_unsent_face(&self) -> Option<FaceId> {
        self.outbound_plan.get(self.sent).copied()
    }
}

pub struct PendingInterestTable {
    by_nonce: HashMap<Bytes, PitEntry>,
    next_sequence: u64,
}

impl PendingInterestTable {
    pub fn new() -> Self {
        Self { by_nonce: HashMap::new(), next_sequence: 0 }
    }

    pub fn contains_nonce(&self, nonce: &[u8]) -> bool {
        self.by_nonce.contains_key(nonce)
    }

    pub fn get(&self, nonce: &[u8]) -> Option<&PitEntry> {
        self.by_nonce.get(nonce)
    }

    pub fn get_mut(&mut self, nonce: &[u8]) -> Option<&mut PitEntry> {
        self.by_nonce.get_mut(nonce)
    }

    /// Insert a freshly-accepted interest (spec §4.E step 4 onward). The
    /// caller is responsible for having already checked `contains_nonce`
    /// (spec §4.E step 2: a duplicate nonce is never inserted again).
    pub fn insert(
        &mut self,
        nonce: Bytes,
        prefix_key: Bytes,
        origin_face: FaceId,
        interest_bytes: Bytes,
        lifetime_usec: i64,
        flags: PitEntryFlags,
    ) {
        self.next_sequence += 1;
        self.by_nonce.insert(
            nonce.clone(),
            PitEntry {
                nonce,
                prefix_key,
                origin_face,
                outbound_plan: Vec::new(),
                sent: 0,
                usec_to_expiry: lifetime_usec,
                flags,
                forward_generation: 0,
                extra_delay_usec: 0,
                interest_bytes: Some(interest_bytes),
                created_at: Instant::now(),
                reap_rounds_since_consumed: 0,
            },
        );
    }

    /// "Consume": free the interest bytes and outbound vector, but leave the
    /// nonce key in the hash for duplicate suppression until the reaper
    /// sweeps it (spec §4.E "PIT entry consume").
    pub fn consume(&mut self, nonce: &[u8]) {
        if let Some(entry) = self.by_nonce.get_mut(nonce) {
            entry.interest_bytes = None;
            entry.outbound_plan.clear();
            entry.sent = 0;
        }
    }

    /// Two-round reaper sweep (spec §3, §4.I): consumed entries are dropped
    /// from the table after two reaper passes.
    pub fn reap(&mut self) -> Vec<Bytes> {
        let mut expired = Vec::new();
        self.by_nonce.retain(|nonce, entry| {
            if entry.is_consumed() {
                entry.reap_rounds_since_consumed += 1;
                if entry.reap_rounds_since_consumed >= 2 {
                    expired.push(nonce.clone());
                    return false;
                }
            }
            true
        });
        expired
    }

    /// Expire all entries whose `usec_to_expiry` has reached zero or below,
    /// returning their nonces so the caller can notify origin faces.
    pub fn expire_due(&mut self, elapsed_usec: i64) -> Vec<Bytes> {
        let mut due = Vec::new();
        for (nonce, entry) in self.by_nonce.iter_mut() {
            if entry.is_consumed() {
                continue;
            }
            entry.usec_to_expiry -= elapsed_usec;
            if entry.usec_to_expiry <= 0 {
                due.push(nonce.clone());
            }
        }
        for nonce in &due {
            self.consume(nonce);
        }
        due
    }

    /// All live (not-yet-consumed) entries filed under `prefix_key`, used
    /// by the content engine's PIT match (spec §4.G step 6).
    pub fn entries_with_prefix(&self, prefix_key: &[u8]) -> Vec<(Bytes, &PitEntry)> {
        self.by_nonce
            .iter()
            .filter(|(_, e)| !e.is_consumed() && e.prefix_key.as_ref() == prefix_key)
            .map(|(n, e)| (n.clone(), e))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_nonce.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_nonce.is_empty()
    }
}

impl Default for PendingInterestTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_dedup_at_most_one_entry() {
        let mut pit = PendingInterestTable::new();
        let nonce = Bytes::from_static(b"N1");
        assert!(!pit.contains_nonce(&nonce));
        pit.insert(nonce.clone(), Bytes::from_static(b"/a"), FaceId(1), Bytes::new(), 4_000_000, PitEntryFlags::UNSENT);
        assert!(pit.contains_nonce(&nonce));
        assert_eq!(pit.len(), 1);
    }

    #[test]
    fn consumed_entry_survives_two_reaper_rounds_then_drops() {
        let mut pit = PendingInterestTable::new();
        let nonce = Bytes::from_static(b"N2");
        pit.insert(nonce.clone(), Bytes::new(), FaceId(1), Bytes::new(), 1000, PitEntryFlags::empty());
        pit.consume(&nonce);
        assert!(pit.contains_nonce(&nonce));
        assert!(pit.reap().is_empty());
        assert!(pit.contains_nonce(&nonce));
        let expired = pit.reap();
        assert_eq!(expired, vec![nonce.clone()]);
        assert!(!pit.contains_nonce(&nonce));
    }

    #[test]
    fn expiry_consumes_entry_when_usec_reaches_zero() {
        let mut pit = PendingInterestTable::new();
        let nonce = Bytes::from_static(b"N3");
        pit.insert(nonce.clone(), Bytes::new(), FaceId(1), Bytes::from_static(b"data"), 500, PitEntryFlags::empty());
        let due = pit.expire_due(1000);
        assert_eq!(due, vec![nonce.clone()]);
        assert!(pit.get(&nonce).unwrap().is_consumed());
    }
}
