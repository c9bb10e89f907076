//! Interest Engine: acceptance (spec §4.E) and propagation (spec §4.F).
//!
//! Grounded on `rust-udcn-quic/src/face.rs::express_interest`'s
//! send-then-await-with-timeout shape, reworked from a per-call future into
//! a scheduled-callback state machine, since the engine here is driven by
//! the reactor's timer callbacks rather than an awaited future.

use bytes::Bytes;
use ccnd_common::metrics::CcndMetrics;
use ccnd_common::ndn::{AnswerOriginKind, ChildSelector, Interest, Scope};
use ccnd_common::types::FaceId;
use rand::RngCore;

use crate::content_store::MatchOptions;
use crate::face_table::FaceTable;
use crate::fib::NamePrefixTable;
use crate::pit::{PendingInterestTable, PitEntryFlags};

/// Outcome of accepting an incoming interest, used by the caller (the
/// daemon's dispatch loop) to decide what to do next.
pub enum AcceptOutcome {
    /// A flood duplicate; the arriving face was pruned from the original
    /// entry's outbound plan if present (spec §4.E step 2).
    DuplicateNonce,
    /// Content-store hit; caller should enqueue `accession` to `origin`.
    SatisfiedByContentStore { accession: u32 },
    /// Dropped per namespace/scope policy; reason is for logging only.
    Dropped(&'static str),
    /// Newly accepted and should be propagated (spec §4.F).
    Accept,
}

pub struct InterestEngine;

impl InterestEngine {
    /// First-send delay per spec §4.F "Scheduling": `(random & 0xFFF) + 1 +
    /// extra_delay`, reduced to `(random & 0xFF) + 1` if the first
    /// destination equals the prefix's `src`. TAP destinations fire at 1 µs.
    pub fn first_send_delay_usec(rng: &mut impl RngCore, is_tap: bool, matches_src: bool, extra_delay: i64) -> i64 {
        if is_tap {
            return 1;
        }
        let base = if matches_src { (rng.next_u32() & 0xFF) + 1 } else { (rng.next_u32() & 0xFFF) + 1 };
        base as i64 + extra_delay
    }

    /// Scope check (spec §4.E step 1).
    fn scope_allows(interest: &Interest, origin_is_gg: bool) -> bool {
        match interest.scope {
            Scope::LocalOnly => false, // satisfied locally only, never forwarded
            Scope::ThisHostOnly => origin_is_gg,
            Scope::ThisNetworkOnly => true,
        }
    }

    /// Accept an incoming interest on `origin` (spec §4.E "Interest
    /// acceptance", steps 1-6). Step 7 (propagate) is the caller's
    /// responsibility via `Accept`.
    #[allow(clippy::too_many_arguments)]
    pub fn accept(
        faces: &FaceTable,
        fib: &mut NamePrefixTable,
        pit: &mut PendingInterestTable,
        content_store: &crate::content_store::ContentStore,
        metrics: &CcndMetrics,
        origin: FaceId,
        interest: &Interest,
        interest_bytes: Bytes,
        rng: &mut impl RngCore,
    ) -> AcceptOutcome {
        let origin_face = faces.get(origin);
        let origin_is_gg = origin_face.map(|f| f.is_gg()).unwrap_or(false);

        if matches!(interest.scope, Scope::LocalOnly) {
            // Scope 0 may still be satisfied locally (content-store only);
            // it is simply never added to any outbound plan (§8 property).
        } else if !Self::scope_allows(interest, origin_is_gg) {
            metrics.interests_dropped.increment();
            return AcceptOutcome::Dropped("scope");
        }

        if pit.contains_nonce(&interest.nonce) {
            if let Some(entry) = pit.get_mut(&interest.nonce) {
                if let Some(pos) = entry.outbound_plan.iter().position(|f| *f == origin) {
                    entry.outbound_plan.remove(pos);
                    if entry.sent > pos {
                        entry.sent -= 1;
                    }
                }
            }
            metrics.interests_dropped.increment();
            return AcceptOutcome::DuplicateNonce;
        }

        let prefix_key = interest.name.key_bytes();
        let prefix = fib.seek(&prefix_key);

        if prefix.namespace_flags.contains(crate::fib::ForwardingFlags::LOCAL) && !origin_is_gg {
            metrics.interests_dropped.increment();
            return AcceptOutcome::Dropped("local-namespace");
        }

        if interest.answer_origin_kind.contains(AnswerOriginKind::ACCEPT_CONTENT_STORE) {
            let accept_stale = interest.answer_origin_kind.contains(AnswerOriginKind::ACCEPT_STALE);
            let search_key = match interest.exclude.leading_excluded_component() {
                Some(c) => {
                    let mut buf = bytes::BytesMut::from(prefix_key.as_ref());
                    c.to_tlv().encode(&mut buf);
                    // A sentinel higher than any real TLV type byte, so the
                    // skiplist walk lands past every stored key that
                    // continues past this excluded component (§4.C
                    // fast-exclude), not merely before it.
                    buf.extend_from_slice(&[0xFF]);
                    buf.freeze()
                }
                None => prefix_key.clone(),
            };
            let opts = MatchOptions {
                min_suffix_components: interest.min_suffix_components,
                max_suffix_components: interest.max_suffix_components,
                publisher_public_key_digest: interest.publisher_public_key_digest.as_ref(),
                exclude: &interest.exclude,
                child_selector: interest.child_selector,
                accept_stale,
            };
            if let Some(entry) = content_store.find_match(&search_key, &prefix_key, &opts) {
                fib.get_mut(&prefix_key).unwrap().predictor_nudge_down();
                return AcceptOutcome::SatisfiedByContentStore { accession: entry.accession };
            }
        }

        pit.insert(
            interest.nonce.clone(),
            prefix_key.clone(),
            origin,
            interest_bytes,
            interest.lifetime_ms() as i64 * 1000,
            pit_flags_for(interest),
        );
        if let Some(prefix) = fib.get_mut(&prefix_key) {
            prefix.pending.push(ccnd_common::types::PitId(pit.len() as u32));
            prefix.predictor_nudge_up();
        }

        AcceptOutcome::Accept
    }

    /// Outbound set computation (spec §4.F "Outbound set computation" +
    /// "Outbound ordering"): longest-existing prefix's refreshed
    /// `forward_to`, scope-masked, origin removed, reordered
    /// `[tap…, src, osrc, others…]`.
    pub fn compute_outbound_plan(
        fib: &mut NamePrefixTable,
        faces: &FaceTable,
        prefix_key: &[u8],
        interest: &Interest,
        origin: FaceId,
    ) -> Vec<FaceId> {
        fib.refresh_forward_to(prefix_key, |id| faces.get(id).map(|f| f.can_send()).unwrap_or(false));
        let Some(entry) = fib.get(prefix_key) else { return Vec::new() };

        let mut plan: Vec<FaceId> = entry
            .forward_to
            .iter()
            .copied()
            .filter(|&f| f != origin)
            .filter(|&f| Self::face_allowed_by_scope(faces, f, interest, origin))
            .collect();

        let src = entry.src;
        let osrc = entry.osrc;
        if let Some(osrc) = osrc {
            if let Some(pos) = plan.iter().position(|f| *f == osrc) {
                let f = plan.remove(pos);
                plan.insert(0, f);
            }
        }
        if let Some(src) = src {
            if let Some(pos) = plan.iter().position(|f| *f == src) {
                let f = plan.remove(pos);
                plan.insert(0, f);
            }
        }
        let mut result: Vec<FaceId> = entry.tap_faces.iter().copied().filter(|&f| f != origin).collect();
        result.extend(plan);
        result
    }

    fn face_allowed_by_scope(faces: &FaceTable, faceid: FaceId, interest: &Interest, origin: FaceId) -> bool {
        let Some(face) = faces.get(faceid) else { return false };
        match interest.scope {
            Scope::LocalOnly => false,
            Scope::ThisHostOnly => face.is_gg(),
            Scope::ThisNetworkOnly => {
                let origin_local = faces.get(origin).map(|f| f.is_gg()).unwrap_or(false);
                !(origin_local == face.is_gg() && face.is_gg())
            }
        }
    }
}

fn pit_flags_for(interest: &Interest) -> PitEntryFlags {
    let mut flags = PitEntryFlags::UNSENT;
    match interest.scope {
        Scope::LocalOnly => flags |= PitEntryFlags::SCOPE_0,
        Scope::ThisHostOnly => flags |= PitEntryFlags::SCOPE_1,
        Scope::ThisNetworkOnly => flags |= PitEntryFlags::SCOPE_2,
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccnd_common::ndn::Name;
    use rand::rngs::mock::StepRng;

    #[test]
    fn scope_zero_never_allowed_outbound() {
        let interest = Interest::new(Name::from_string("/a")).with_scope(Scope::LocalOnly);
        assert!(!InterestEngine::scope_allows(&interest, true));
        assert!(!InterestEngine::scope_allows(&interest, false));
    }

    #[test]
    fn tap_gets_fixed_one_microsecond_delay() {
        let mut rng = StepRng::new(0, 1);
        assert_eq!(InterestEngine::first_send_delay_usec(&mut rng, true, false, 500), 1);
    }
}
