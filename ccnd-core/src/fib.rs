//! Name-Prefix Table (spec §3 "Name-Prefix Entry"/"Forwarding Entry", §4.D).
//!
//! Generalizes `rust-udcn-common::types::{FibKey, FibValue}` — a fixed-size
//! eBPF map entry of prefix-hash → faceid — into an owned, growable
//! `HashMap<Bytes, PrefixEntry>` keyed by the raw concatenated component
//! bytes, since this is a userspace table with parent links and a
//! propagation list the eBPF map entry never tracked.

use bitflags::bitflags;
use bytes::Bytes;
use ccnd_common::types::{FaceId, PitId};
use std::collections::HashMap;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ForwardingFlags: u16 {
        const ACTIVE        = 0b0000_0001;
        const CHILD_INHERIT = 0b0000_0010;
        const ADVERTISE     = 0b0000_0100;
        const LAST          = 0b0000_1000;
        const CAPTURE       = 0b0001_0000;
        const LOCAL         = 0b0010_0000;
        const TAP           = 0b0100_0000;
        const REFRESHED     = 0b1000_0000;
    }
}

/// A single next-hop within a prefix entry's FIB list (spec §3 "Forwarding Entry").
#[derive(Debug, Clone)]
pub struct ForwardingEntry {
    pub faceid: FaceId,
    pub flags: ForwardingFlags,
    /// Remaining lifetime in seconds; aged every 5s by the FIB ager (§4.I).
    pub remaining_seconds: u32,
}

const RESPONSE_TIME_MIN_USEC: u32 = 127;
const RESPONSE_TIME_MAX_USEC: u32 = 1_000_000;

/// A prefix entry keyed by the raw concatenated component bytes of a name
/// prefix (spec §3 "Name-Prefix Entry").
pub struct PrefixEntry {
    pub key: Bytes,
    pub parent: Option<Bytes>,
    pub child_count: u32,
    pub fib: Vec<ForwardingEntry>,
    /// Cached forward-to vector and its generation stamp (§4.D).
    pub forward_to: Vec<FaceId>,
    pub tap_faces: Vec<FaceId>,
    pub fgen: u64,
    /// Response-time predictor, microseconds (§4.D).
    pub usec: u32,
    pub src: Option<FaceId>,
    pub osrc: Option<FaceId>,
    pub namespace_flags: ForwardingFlags,
    /// Sentinel-headed intrusive list of PIT entry ids pending on this
    /// prefix, stored as a plain `Vec` per §9's arena/handle note (the
    /// sentinel-doubly-linked-list from the source collapses to "owned by
    /// value in an indexed map" here).
    pub pending: Vec<PitId>,
}

impl PrefixEntry {
    fn new(key: Bytes, parent: Option<Bytes>) -> Self {
        Self {
            key,
            parent,
            child_count: 0,
            fib: Vec::new(),
            forward_to: Vec::new(),
            tap_faces: Vec::new(),
            fgen: 0,
            usec: 100_000,
            src: None,
            osrc: None,
            namespace_flags: ForwardingFlags::empty(),
            pending: Vec::new(),
        }
    }

    /// Nudge the response-time predictor down on a successful match
    /// (factor ≈ 1 − 2⁻⁷, spec §4.D).
    pub fn predictor_nudge_down(&mut self) {
        let delta = self.usec >> 7;
        self.usec = self.usec.saturating_sub(delta).clamp(RESPONSE_TIME_MIN_USEC, RESPONSE_TIME_MAX_USEC);
    }

    /// Nudge the response-time predictor up on a new pending-interest
    /// attempt (factor ≈ 1 + 2⁻³, spec §4.D).
    pub fn predictor_nudge_up(&mut self) {
        let delta = self.usec >> 3;
        self.usec = self.usec.saturating_add(delta).clamp(RESPONSE_TIME_MIN_USEC, RESPONSE_TIME_MAX_USEC);
    }

    /// Record a content match's source face, rotating `src` into `osrc` if
    /// it changed (spec §4.D).
    pub fn record_source(&mut self, faceid: FaceId) {
        if self.src != Some(faceid) {
            self.osrc = self.src;
            self.src = Some(faceid);
        }
    }

    pub fn is_empty_for_reap(&self) -> bool {
        self.fib.is_empty() && self.child_count == 0 && self.pending.is_empty() && self.src.is_none()
    }
}

/// Splits a concatenated key into its TLV-framed component spans, used to
/// walk a key's ancestor prefixes one component at a time.
fn component_boundaries(key: &[u8]) -> Vec<usize> {
    let mut bounds = vec![0];
    let mut rest = Bytes::copy_from_slice(key);
    let mut offset = 0;
    while !rest.is_empty() {
        let start_len = rest.len();
        match ccnd_common::tlv::TlvElement::decode(&mut rest) {
            Ok(_) => {
                offset += start_len - rest.len();
                bounds.push(offset);
            }
            Err(_) => break,
        }
    }
    bounds
}

pub struct NamePrefixTable {
    entries: HashMap<Bytes, PrefixEntry>,
    pub forward_to_gen: u64,
}

impl NamePrefixTable {
    pub fn new() -> Self {
        Self { entries: HashMap::new(), forward_to_gen: 0 }
    }

    /// `seek`: walks the key progressively from 0 components up, creating
    /// any missing ancestors, setting each parent link to the
    /// immediate-shorter entry created on the same walk (spec §4.D).
    pub fn seek(&mut self, key: &[u8]) -> &mut PrefixEntry {
        let bounds = component_boundaries(key);
        let mut parent_key: Option<Bytes> = None;
        for &b in bounds.iter().skip(1) {
            let sub = Bytes::copy_from_slice(&key[..b]);
            if !self.entries.contains_key(&sub) {
                let entry = PrefixEntry::new(sub.clone(), parent_key.clone());
                self.entries.insert(sub.clone(), entry);
                if let Some(p) = &parent_key {
                    if let Some(parent_entry) = self.entries.get_mut(p) {
                        parent_entry.child_count += 1;
                    }
                }
            }
            parent_key = Some(sub);
        }
        if parent_key.is_none() {
            let root = Bytes::new();
            self.entries.entry(root.clone()).or_insert_with(|| PrefixEntry::new(root.clone(), None));
            parent_key = Some(root);
        }
        self.entries.get_mut(parent_key.as_ref().unwrap()).unwrap()
    }

    pub fn get(&self, key: &[u8]) -> Option<&PrefixEntry> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut PrefixEntry> {
        self.entries.get_mut(key)
    }

    /// Longest-existing-prefix walk toward the root, for FIB lookups during
    /// matching (spec §4.D, §4.F).
    pub fn longest_existing_prefix(&self, key: &[u8]) -> Option<&PrefixEntry> {
        let bounds = component_boundaries(key);
        for &b in bounds.iter().rev() {
            let sub = &key[..b];
            if let Some(entry) = self.entries.get(sub) {
                return Some(entry);
            }
        }
        self.entries.get(&Bytes::new()[..])
    }

    /// Recompute `forward_to` from an entry and all its ancestors (spec
    /// §4.D "On use, if the entry's fgen is stale, forward_to is
    /// recomputed").
    pub fn refresh_forward_to(&mut self, key: &[u8], alive: impl Fn(FaceId) -> bool) {
        let chain = self.ancestor_chain(key);
        let mut forward = Vec::new();
        let mut taps = Vec::new();
        let mut last_faces = Vec::new();
        let mut child_inherit_cutoff = false;
        let mut namespace_flags = ForwardingFlags::empty();

        for k in chain.iter().rev() {
            let Some(entry) = self.entries.get(k) else { continue };
            namespace_flags |= entry.namespace_flags;
            let is_deepest = k == chain.first().unwrap();
            for fwd in &entry.fib {
                if !fwd.flags.contains(ForwardingFlags::ACTIVE) || !alive(fwd.faceid) {
                    continue;
                }
                if !is_deepest && !fwd.flags.contains(ForwardingFlags::CHILD_INHERIT) {
                    continue;
                }
                if child_inherit_cutoff && !is_deepest {
                    continue;
                }
                if fwd.flags.contains(ForwardingFlags::TAP) {
                    taps.push(fwd.faceid);
                } else if fwd.flags.contains(ForwardingFlags::LAST) {
                    last_faces.push(fwd.faceid);
                } else {
                    forward.push(fwd.faceid);
                }
            }
            if entry.fib.iter().any(|f| f.flags.contains(ForwardingFlags::CAPTURE)) {
                child_inherit_cutoff = true;
            }
        }
        forward.extend(last_faces);

        let gen = self.forward_to_gen;
        if let Some(entry) = self.entries.get_mut(key) {
            entry.forward_to = forward;
            entry.tap_faces = taps;
            entry.fgen = gen;
            entry.namespace_flags = namespace_flags;
        }
    }

    fn ancestor_chain(&self, key: &[u8]) -> Vec<Bytes> {
        let bounds = component_boundaries(key);
        bounds.iter().map(|&b| Bytes::copy_from_slice(&key[..b])).collect()
    }

    pub fn bump_generation(&mut self) {
        self.forward_to_gen += 1;
    }

    /// FIB ager (spec §4.I): decrements each forwarding entry's remaining
    /// seconds by `elapsed_secs`, retiring not-refreshed ones.
    pub fn age_fib(&mut self, elapsed_secs: u32) {
        let mut changed = false;
        for entry in self.entries.values_mut() {
            entry.fib.retain_mut(|fwd| {
                if !fwd.flags.contains(ForwardingFlags::REFRESHED) {
                    fwd.remaining_seconds = fwd.remaining_seconds.saturating_sub(elapsed_secs);
                    if fwd.remaining_seconds == 0 {
                        changed = true;
                        return false;
                    }
                } else {
                    fwd.flags.remove(ForwardingFlags::REFRESHED);
                }
                true
            });
        }
        if changed {
            self.bump_generation();
        }
    }

    /// Reaper pass: removes prefix entries with no FIB, no children, no
    /// pending interests and no recent source (spec §3 lifecycle, §4.I).
    pub fn reap_empty(&mut self) {
        let empty_keys: Vec<Bytes> =
            self.entries.values().filter(|e| e.is_empty_for_reap() && !e.key.is_empty()).map(|e| e.key.clone()).collect();
        for key in empty_keys {
            if let Some(entry) = self.entries.remove(&key) {
                if let Some(parent) = &entry.parent {
                    if let Some(p) = self.entries.get_mut(parent) {
                        p.child_count = p.child_count.saturating_sub(1);
                    }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for NamePrefixTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccnd_common::ndn::Name;

    #[test]
    fn seek_creates_parent_chain() {
        let mut table = NamePrefixTable::new();
        let name = Name::from_string("/a/b/c");
        table.seek(&name.key_bytes());

        let a = Name::from_string("/a").key_bytes();
        let ab = Name::from_string("/a/b").key_bytes();
        let abc = Name::from_string("/a/b/c").key_bytes();
        assert!(table.get(&a).is_some());
        assert!(table.get(&ab).is_some());
        assert!(table.get(&abc).is_some());
        assert_eq!(table.get(&abc).unwrap().parent.as_deref(), Some(ab.as_ref()));
    }

    #[test]
    fn predictor_clamped_to_bounds() {
        let mut entry = PrefixEntry::new(Bytes::new(), None);
        entry.usec = RESPONSE_TIME_MIN_USEC;
        entry.predictor_nudge_down();
        assert_eq!(entry.usec, RESPONSE_TIME_MIN_USEC);
        entry.usec = RESPONSE_TIME_MAX_USEC;
        entry.predictor_nudge_up();
        assert_eq!(entry.usec, RESPONSE_TIME_MAX_USEC);
    }

    #[test]
    fn reap_removes_empty_leaf_and_decrements_parent() {
        let mut table = NamePrefixTable::new();
        let name = Name::from_string("/a/b");
        table.seek(&name.key_bytes());
        table.reap_empty();
        let a = Name::from_string("/a").key_bytes();
        // /a/b had no fib/children/pending/src, so it (and then /a) reap away.
        assert!(table.get(&a).is_none() || table.get(&a).unwrap().child_count == 0);
    }
}
