//! Stats command: an ambient-observability convenience, not a named
//! management operation.
//!
//! Grounded on `rust-udcn-cli/src/commands/xdp.rs`'s `show_xdp_stats`
//! texture: attempt a live query, fall back to an honest disclaimer when
//! the daemon has nothing to answer with rather than fabricating numbers.

use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use ccnd_common::ndn::{Interest, Name, NdnPacket};
use rand::RngCore;

use crate::client::{self, Target};

pub fn show_stats(target: &Target, ccnd_id: &str, timeout: Duration) -> Result<()> {
    let mut nonce = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut nonce);
    let name = Name::from_string(&format!("/ccnx/{ccnd_id}/stats"));
    let interest = Interest::new(name).with_nonce(Bytes::copy_from_slice(&nonce));

    match client::send_and_await(target, &NdnPacket::Interest(interest), timeout)? {
        Some(NdnPacket::ContentObject(object)) => {
            println!("Daemon stats:");
            if let Ok(text) = std::str::from_utf8(&object.content) {
                println!("{text}");
            } else {
                println!("{} bytes (binary)", object.content.len());
            }
        }
        _ => {
            println!("No stats reply from the daemon within {}ms.", timeout.as_millis());
            println!("Counters (cs_hits, pit_size, fib_size, ...) are only visible in the daemon's own logs in this build.");
        }
    }
    Ok(())
}
