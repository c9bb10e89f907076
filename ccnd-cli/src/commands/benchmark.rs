//! Benchmark command: fire a batch of interests under a prefix and report
//! hit/timeout/RTT stats.
//!
//! Grounded on `rust-udcn-cli/src/commands/benchmark.rs`'s batched,
//! concurrent-workers shape; `tokio::spawn` + `futures::join_all` are
//! replaced with plain `std::thread` workers, since [`crate::client`]'s
//! connection is blocking and this crate carries no async runtime.

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use bytes::Bytes;
use ccnd_common::ndn::{Interest, Name, NdnPacket};
use rand::RngCore;

use crate::client::{self, Target};
use crate::utils::{format_duration, Timer};

enum Outcome {
    Hit(Duration),
    Miss,
    Timeout,
}

pub fn run_benchmark(target: &Target, count: usize, prefix: String, concurrent: usize, timeout: Duration) -> Result<()> {
    println!("Benchmark: {count} interests under {prefix}, {concurrent} concurrent worker(s)");

    let concurrent = concurrent.max(1);
    let batch_size = count.div_ceil(concurrent);
    let (tx, rx) = mpsc::channel();
    let timer = Timer::new("benchmark");

    let mut handles = Vec::new();
    for worker in 0..concurrent {
        let lo = worker * batch_size;
        let hi = (lo + batch_size).min(count);
        if lo >= hi {
            break;
        }
        let target = target.clone();
        let prefix = prefix.clone();
        let tx = tx.clone();
        handles.push(thread::spawn(move || {
            for i in lo..hi {
                let name = Name::from_string(&format!("{prefix}/{i}"));
                let mut nonce = [0u8; 8];
                rand::thread_rng().fill_bytes(&mut nonce);
                let interest = Interest::new(name).with_nonce(Bytes::copy_from_slice(&nonce));

                let request_start = Instant::now();
                let outcome = match client::send_and_await(&target, &NdnPacket::Interest(interest), timeout) {
                    Ok(Some(NdnPacket::ContentObject(_))) => Outcome::Hit(request_start.elapsed()),
                    Ok(_) => Outcome::Timeout,
                    Err(_) => Outcome::Miss,
                };
                let _ = tx.send(outcome);
            }
        }));
    }
    drop(tx);

    let mut hits = 0usize;
    let mut misses = 0usize;
    let mut timeouts = 0usize;
    let mut total_rtt = Duration::ZERO;
    let mut min_rtt = None;
    let mut max_rtt = Duration::ZERO;

    for outcome in rx {
        match outcome {
            Outcome::Hit(rtt) => {
                hits += 1;
                total_rtt += rtt;
                min_rtt = Some(min_rtt.map_or(rtt, |m: Duration| m.min(rtt)));
                max_rtt = max_rtt.max(rtt);
            }
            Outcome::Miss => misses += 1,
            Outcome::Timeout => timeouts += 1,
        }
    }
    for handle in handles {
        let _ = handle.join();
    }

    let elapsed = timer.elapsed();
    println!();
    println!("Results");
    println!("=======");
    println!("Hits:     {hits} ({:.1}%)", hits as f64 / count as f64 * 100.0);
    println!("Timeouts: {timeouts} ({:.1}%)", timeouts as f64 / count as f64 * 100.0);
    println!("Errors:   {misses} ({:.1}%)", misses as f64 / count as f64 * 100.0);
    println!("Total time: {}", format_duration(elapsed));
    if hits > 0 {
        println!("Min RTT: {}", format_duration(min_rtt.unwrap_or_default()));
        println!("Max RTT: {}", format_duration(max_rtt));
        println!("Avg RTT: {}", format_duration(total_rtt / hits as u32));
    }

    Ok(())
}
