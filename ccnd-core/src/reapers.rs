//! Reapers (spec §4.I): three scheduled periodic tasks hardened against
//! cancel. Grounded on the reactor's scheduled-event mechanism (§4.A); no
//! teacher analogue, built fresh using the same `ScheduledEvent` abstraction
//! as everything else in the loop.

use std::time::Duration;

use crate::content_store::{ContentFlags, ContentStore};
use crate::face_table::FaceTable;
use crate::fib::NamePrefixTable;
use crate::pit::PendingInterestTable;
use ccnd_common::metrics::CcndMetrics;

/// Face/PIT reaper interval: ~2x the default interest lifetime (spec §4.I).
pub fn face_pit_reaper_interval(default_interest_lifetime: Duration) -> Duration {
    default_interest_lifetime * 2
}

pub const FIB_AGER_INTERVAL: Duration = Duration::from_secs(5);
pub const STORE_CLEANER_INTERVAL_IDLE: Duration = Duration::from_secs(15);
/// Aggressive re-schedule when the store is over capacity (spec §4.I "Store
/// cleaner ... aggressive sub-second re-schedule when over").
pub const STORE_CLEANER_INTERVAL_BUSY: Duration = Duration::from_millis(200);
/// Entries examined per cleaner fire while over capacity, so the loop stays
/// responsive (spec §4.I "batches of 500 entries per fire").
pub const STORE_CLEANER_BATCH: usize = 500;
/// PIT expiry ticker: how often `PendingInterestTable::expire_due` is
/// driven, independent of the coarser face/PIT reaper sweep (spec §4.F
/// "Scheduling" relies on expiry running well inside one interest lifetime).
pub const PIT_EXPIRY_INTERVAL: Duration = Duration::from_millis(250);

/// Face/PIT reaper round (spec §4.I "Face/PIT reaper"): sweeps dormant
/// datagram faces, expires PIT nonces past two passes, retires empty prefix
/// entries whose `src` and FIB are both empty.
pub fn run_face_pit_reaper(
    faces: &mut FaceTable,
    pit: &mut PendingInterestTable,
    fib: &mut NamePrefixTable,
    metrics: &CcndMetrics,
) {
    let evicted = faces.sweep_dormant();
    metrics.faces_dormant_evicted.add(evicted.len() as u64);

    let expired = pit.reap();
    metrics.pit_expirations.add(expired.len() as u64);

    fib.reap_empty();

    metrics.reaper_rounds.increment();
    metrics.faces_active.set(faces.live_count() as u64);
    metrics.pit_size.set(pit.len() as u64);
    metrics.fib_size.set(fib.len() as u64);
}

/// FIB ager round (spec §4.I "FIB ager"): decrements each forwarding
/// entry's remaining seconds, retires not-refreshed ones, bumps
/// `forward_to_gen`.
pub fn run_fib_ager(fib: &mut NamePrefixTable) {
    fib.age_fib(FIB_AGER_INTERVAL.as_secs() as u32);
}

/// Store cleaner round (spec §4.I "Store cleaner", §4.C "Staleness and
/// cleanup"): first drops unsolicited entries, then scans accession-ordered
/// STALE entries (bounded per round), then as a last resort marks the
/// oldest non-precious entries stale. Returns whether the store is still
/// over capacity (the caller uses this to pick the next interval).
pub fn run_store_cleaner(store: &mut ContentStore, metrics: &CcndMetrics) -> bool {
    if !store.is_over_capacity() {
        metrics.cs_size.set(store.len() as u64);
        return false;
    }

    let mut examined = 0usize;
    let mut accession = 0u32;
    while store.is_over_capacity() && examined < STORE_CLEANER_BATCH {
        let Some(entry) = store.get_by_accession(accession) else {
            accession = accession.wrapping_add(1);
            examined += 1;
            if accession == 0 {
                break; // wrapped with nothing found; avoid infinite loop
            }
            continue;
        };
        let key = entry.object.expanded_name().key_bytes();
        let is_unsolicited = entry.flags.contains(ContentFlags::UNSOLICITED);
        let is_stale = entry.flags.contains(ContentFlags::STALE);
        let is_precious = entry.flags.contains(ContentFlags::PRECIOUS);

        if is_unsolicited && !is_precious {
            store.remove_by_key(&key);
            metrics.cs_evictions.increment();
        } else if is_stale && !is_precious {
            store.remove_by_key(&key);
            metrics.cs_evictions.increment();
        } else if !is_precious {
            if let Some(entry) = store.get_by_key_mut(&key) {
                entry.flags |= ContentFlags::STALE;
            }
        }

        accession = accession.wrapping_add(1);
        examined += 1;
    }

    metrics.cs_size.set(store.len() as u64);
    store.is_over_capacity()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use ccnd_common::ndn::{ContentObject, Name};

    #[test]
    fn cleaner_evicts_unsolicited_first() {
        let mut store = ContentStore::new(1, 3);
        let metrics = CcndMetrics::new();

        let o1 = ContentObject::new(Name::from_string("/a/1"), Bytes::from_static(b"x"));
        let k1 = o1.expanded_name().key_bytes();
        let acc1 = store.insert(k1.clone(), o1, false);
        store.get_by_key_mut(&k1).unwrap().flags |= ContentFlags::UNSOLICITED;

        let o2 = ContentObject::new(Name::from_string("/a/2"), Bytes::from_static(b"y"));
        let k2 = o2.expanded_name().key_bytes();
        store.insert(k2.clone(), o2, false);

        assert!(store.is_over_capacity());
        run_store_cleaner(&mut store, &metrics);
        assert!(store.get_by_accession(acc1).is_none());
        assert!(store.get_by_key(&k2).is_some());
    }
}
