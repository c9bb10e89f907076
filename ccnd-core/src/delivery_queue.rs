//! Delivery Queues (spec §3 "Content Queue", §4.H).
//!
//! Grounded on `rust-udcn-quic/src/fragmentation.rs`'s chunking helpers
//! (reused for the "stuffing" MTU-budget calculation in the interest
//! engine) and the teacher's `Counter`/`Gauge` metrics style for queue
//! depth instrumentation.

use ccnd_common::types::FaceId;
use std::collections::VecDeque;
use std::time::Duration;

/// Per-face delay class (spec §3 "Content Queue", §4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DelayClass {
    Asap,
    Normal,
    Slow,
}

/// Derive the delay class for a face from its transport/flags (spec §4.H
/// "Class is chosen from face flags").
pub fn delay_class_for_face(face: &crate::face_table::Face) -> DelayClass {
    use crate::face_table::TransportKind;
    match face.transport {
        TransportKind::Local => DelayClass::Asap,
        TransportKind::DatagramMulticast | TransportKind::StreamListener => {
            if face.flags.contains(ccnd_common::types::FaceFlags::SEND_BLOCKED) {
                DelayClass::Slow
            } else {
                DelayClass::Normal
            }
        }
        TransportKind::DatagramUnicast => DelayClass::Normal,
        TransportKind::StreamUnicast => DelayClass::Normal,
    }
}

/// Pacing floor/jitter/burst parameters for a delay class, given the face
/// type and the tunable `data_pause` (spec §4.H "Per-queue pacing
/// parameters depend on face type").
pub struct PacingParams {
    pub min_usec: u64,
    pub rand_usec: u64,
    pub burst_nsec_per_kib: u64,
}

pub fn pacing_params(face: &crate::face_table::Face, class: DelayClass, data_pause_usec: u64) -> PacingParams {
    use crate::face_table::TransportKind;
    let (min_usec, rand_usec) = match face.transport {
        TransportKind::Local => (5, 5),
        _ if face.peer_addr.map(|a| a.ip().is_loopback()).unwrap_or(false) => (100, 100),
        TransportKind::DatagramUnicast => (500, 500),
        TransportKind::DatagramMulticast | TransportKind::StreamListener | TransportKind::StreamUnicast => {
            (data_pause_usec, data_pause_usec)
        }
    };
    let shift = if class == DelayClass::Slow { 1 } else { 0 };
    PacingParams {
        min_usec: min_usec << shift,
        rand_usec: rand_usec << shift,
        burst_nsec_per_kib: 100,
    }
}

pub struct QueueEntry {
    pub accession: u32,
    pub size: usize,
    pub ready: bool,
}

/// One of a face's three delay-class queues (spec §3 "Content Queue").
pub struct DeliveryQueue {
    pub face: FaceId,
    pub class: DelayClass,
    entries: VecDeque<QueueEntry>,
    pub nrun: u32,
    pub has_scheduled_sender: bool,
}

const MAX_BUDGET_NSEC: u64 = 1_000_000;
const MAX_DEQUEUE_PER_FIRE: usize = 2;
const PREFERRED_PROVIDER_RANGE: std::ops::Range<u32> = 12..120;

impl DeliveryQueue {
    pub fn new(face: FaceId, class: DelayClass) -> Self {
        Self { face, class, entries: VecDeque::new(), nrun: 0, has_scheduled_sender: false }
    }

    /// Enqueue checks all *other* classes on the same face first (done by
    /// the caller, which owns all three queues for a face); this method
    /// itself just appends if `accession` is not already present.
    pub fn enqueue(&mut self, accession: u32, size: usize) -> bool {
        if self.entries.iter().any(|e| e.accession == accession) {
            return false;
        }
        self.entries.push_back(QueueEntry { accession, size, ready: false });
        true
    }

    pub fn contains(&self, accession: u32) -> bool {
        self.entries.iter().any(|e| e.accession == accession)
    }

    pub fn mark_ready(&mut self, accession: u32) {
        if let Some(e) = self.entries.iter_mut().find(|e| e.accession == accession) {
            e.ready = true;
        }
    }

    pub fn ready_count(&self) -> usize {
        self.entries.iter().filter(|e| e.ready).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sender-fire logic (spec §4.H "Sender event"): dequeue up to 2 ready
    /// entries, each consuming `burst_nsec_per_kib * ceil(size/1024)` of
    /// budget, capped at 1_000_000 ns per fire. Returns the dequeued
    /// accessions plus the delay before the queue should fire again.
    pub fn fire(&mut self, params: &PacingParams, rng_usec: u64) -> (Vec<u32>, Duration) {
        let mut sent = Vec::new();
        let mut budget = 0u64;
        while sent.len() < MAX_DEQUEUE_PER_FIRE && budget < MAX_BUDGET_NSEC {
            let Some(front) = self.entries.front() else { break };
            if !front.ready {
                break;
            }
            let entry = self.entries.pop_front().unwrap();
            let cost = params.burst_nsec_per_kib * ((entry.size as u64 + 1023) / 1024).max(1);
            budget += cost;
            sent.push(entry.accession);
        }

        if !sent.is_empty() {
            self.nrun += 1;
        } else {
            self.nrun = 0;
        }

        let preferred_provider = PREFERRED_PROVIDER_RANGE.contains(&self.nrun);
        let delay = if preferred_provider {
            Duration::from_micros(1)
        } else if self.ready_count() > 0 {
            Duration::from_micros(10)
        } else {
            Duration::from_micros(params.min_usec + (rng_usec % params.rand_usec.max(1)))
        };
        (sent, delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_is_idempotent_per_accession() {
        let mut q = DeliveryQueue::new(FaceId(1), DelayClass::Normal);
        assert!(q.enqueue(7, 100));
        assert!(!q.enqueue(7, 100));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn fire_only_dequeues_ready_entries_up_to_two() {
        let mut q = DeliveryQueue::new(FaceId(1), DelayClass::Normal);
        q.enqueue(1, 100);
        q.enqueue(2, 100);
        q.enqueue(3, 100);
        q.mark_ready(1);
        q.mark_ready(2);
        q.mark_ready(3);
        let params = PacingParams { min_usec: 500, rand_usec: 500, burst_nsec_per_kib: 100 };
        let (sent, _) = q.fire(&params, 0);
        assert_eq!(sent, vec![1, 2]);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn not_ready_front_blocks_dequeue() {
        let mut q = DeliveryQueue::new(FaceId(1), DelayClass::Normal);
        q.enqueue(1, 100);
        let params = PacingParams { min_usec: 500, rand_usec: 500, burst_nsec_per_kib: 100 };
        let (sent, _) = q.fire(&params, 0);
        assert!(sent.is_empty());
    }
}
