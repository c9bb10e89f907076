//! Metrics collection for ccnd.
//!
//! The reactor (§5) owns exactly one `CcndMetrics` and never shares it
//! across a thread boundary, so these counters use plain `Cell`s rather
//! than atomics — the single-threaded, lock-free, atomic-free design the
//! forwarding engine commits to for its whole hot path applies here too.

use std::cell::Cell;
use std::time::{Duration, Instant};

/* ---------------------------------------------------------------- *
 * Simple Counter
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct Counter {
    value: Cell<u64>,
}

impl Counter {
    pub fn new() -> Self {
        Self { value: Cell::new(0) }
    }

    pub fn increment(&self) {
        self.value.set(self.value.get() + 1);
    }

    pub fn add(&self, value: u64) {
        self.value.set(self.value.get() + value);
    }

    pub fn value(&self) -> u64 {
        self.value.get()
    }

    pub fn reset(&self) {
        self.value.set(0);
    }
}

impl Clone for Counter {
    fn clone(&self) -> Self {
        Self { value: Cell::new(self.value.get()) }
    }
}

/* ---------------------------------------------------------------- *
 * Gauge
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct Gauge {
    value: Cell<u64>,
}

impl Gauge {
    pub fn new() -> Self {
        Self { value: Cell::new(0) }
    }

    pub fn set(&self, value: u64) {
        self.value.set(value);
    }

    pub fn increment(&self) {
        self.value.set(self.value.get() + 1);
    }

    pub fn decrement(&self) {
        self.value.set(self.value.get().saturating_sub(1));
    }

    pub fn value(&self) -> u64 {
        self.value.get()
    }
}

impl Clone for Gauge {
    fn clone(&self) -> Self {
        Self { value: Cell::new(self.value.get()) }
    }
}

/* ---------------------------------------------------------------- *
 * Histogram
 * ---------------------------------------------------------------- */

#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<Cell<u64>>,
    boundaries: Vec<u64>,
    underflow: Cell<u64>,
    overflow: Cell<u64>,
    sum: Cell<u64>,
    count: Cell<u64>,
}

impl Histogram {
    pub fn new(boundaries: Vec<u64>) -> Self {
        let buckets = (0..boundaries.len()).map(|_| Cell::new(0)).collect();
        Self {
            buckets,
            boundaries,
            underflow: Cell::new(0),
            overflow: Cell::new(0),
            sum: Cell::new(0),
            count: Cell::new(0),
        }
    }

    pub fn exponential(min: u64, max: u64, buckets: usize) -> Self {
        assert!(min < max && buckets > 1);
        let factor = (max as f64 / min as f64).powf(1.0 / (buckets as f64 - 1.0));
        let mut boundaries = Vec::with_capacity(buckets);
        let mut value = min;
        for _ in 0..buckets {
            boundaries.push(value);
            value = (value as f64 * factor).ceil() as u64;
        }
        Self::new(boundaries)
    }

    pub fn observe(&self, value: u64) {
        self.sum.set(self.sum.get() + value);
        self.count.set(self.count.get() + 1);

        if value < self.boundaries[0] {
            self.underflow.set(self.underflow.get() + 1);
            return;
        }

        let mut idx = self.boundaries.len();
        for (i, &b) in self.boundaries.iter().enumerate() {
            if value <= b {
                idx = i;
                break;
            }
        }

        if idx < self.buckets.len() {
            self.buckets[idx].set(self.buckets[idx].get() + 1);
        } else {
            self.overflow.set(self.overflow.get() + 1);
        }
    }

    pub fn average(&self) -> f64 {
        let c = self.count.get();
        if c == 0 {
            0.0
        } else {
            self.sum.get() as f64 / c as f64
        }
    }

    pub fn counts(&self) -> Vec<(u64, u64)> {
        self.boundaries.iter().zip(self.buckets.iter()).map(|(&b, bucket)| (b, bucket.get())).collect()
    }

    pub fn count(&self) -> u64 {
        self.count.get()
    }

    pub fn sum(&self) -> u64 {
        self.sum.get()
    }
}

impl Clone for Histogram {
    fn clone(&self) -> Self {
        Self {
            buckets: self.buckets.iter().map(|b| Cell::new(b.get())).collect(),
            boundaries: self.boundaries.clone(),
            underflow: Cell::new(self.underflow.get()),
            overflow: Cell::new(self.overflow.get()),
            sum: Cell::new(self.sum.get()),
            count: Cell::new(self.count.get()),
        }
    }
}

/* ---------------------------------------------------------------- *
 * Timer
 * ---------------------------------------------------------------- */

#[derive(Debug)]
pub struct Timer {
    start: Option<Instant>,
    histogram: Histogram,
}

impl Timer {
    pub fn new() -> Self {
        let boundaries = vec![10, 100, 1_000, 10_000, 100_000, 1_000_000, 10_000_000];
        Self { start: None, histogram: Histogram::new(boundaries) }
    }

    pub fn with_buckets(boundaries: Vec<u64>) -> Self {
        Self { start: None, histogram: Histogram::new(boundaries) }
    }

    pub fn start(&mut self) {
        self.start = Some(Instant::now());
    }

    pub fn stop(&mut self) -> Duration {
        if let Some(s) = self.start.take() {
            let elapsed = s.elapsed();
            self.histogram.observe(elapsed.as_micros() as u64);
            elapsed
        } else {
            Duration::from_secs(0)
        }
    }

    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Timer {
    fn clone(&self) -> Self {
        Self { start: None, histogram: self.histogram.clone() }
    }
}

/* ---------------------------------------------------------------- *
 * Aggregate metrics for ccnd
 * ---------------------------------------------------------------- */

#[derive(Debug, Default, Clone)]
pub struct CcndMetrics {
    // Interest/Content packet counters (§4.B, §4.F, §4.G)
    pub interests_received: Counter,
    pub interests_satisfied: Counter,
    pub interests_timed_out: Counter,
    pub interests_sent: Counter,
    pub interests_forwarded: Counter,
    pub interests_dropped: Counter,
    pub content_received: Counter,
    pub content_sent: Counter,
    pub content_unsolicited: Counter,

    // Content store metrics (§4.C)
    pub cs_hits: Counter,
    pub cs_misses: Counter,
    pub cs_inserts: Counter,
    pub cs_evictions: Counter,
    pub cs_size: Gauge,

    // PIT metrics (§4.E)
    pub pit_inserts: Counter,
    pub pit_hits: Counter,
    pub pit_misses: Counter,
    pub pit_expirations: Counter,
    pub pit_size: Gauge,

    // Name-Prefix Table / FIB metrics (§4.D)
    pub fib_hits: Counter,
    pub fib_misses: Counter,
    pub fib_size: Gauge,

    // Face table metrics (§4.A, §4.I)
    pub faces_created: Counter,
    pub faces_closed: Counter,
    pub faces_dormant_evicted: Counter,
    pub faces_active: Gauge,

    // Periodic maintenance (§4.I)
    pub reaper_rounds: Counter,

    // Performance metrics
    pub interest_processing_time: Timer,
    pub content_processing_time: Timer,

    // Transport metrics
    pub bytes_received: Counter,
    pub bytes_sent: Counter,
}

impl CcndMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}
