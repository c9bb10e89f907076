//! Interest sending command.
//!
//! Grounded on `rust-udcn-cli/src/commands/interest.rs`'s send-and-print
//! shape, with the QUIC `express_interest` future replaced by a blocking
//! round trip over [`crate::client`] against a real content-store lookup.

use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use ccnd_common::ndn::{Interest, Name, NdnPacket};
use log::info;
use rand::RngCore;

use crate::client::{self, Target};
use crate::utils::format_bytes;

pub fn send_interest(target: &Target, name_str: String, timeout_ms: u64, lifetime_ms: u32) -> Result<()> {
    info!("sending interest: name={name_str}, timeout={timeout_ms}ms");

    let name = Name::from_string(&name_str);
    let mut nonce = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut nonce);
    let interest = Interest::new(name).with_nonce(Bytes::copy_from_slice(&nonce)).with_lifetime_ms(lifetime_ms);

    println!("Interest: {name_str}  (timeout {timeout_ms}ms, lifetime {lifetime_ms}ms)");

    let timeout = Duration::from_millis(timeout_ms);
    match client::send_and_await(target, &NdnPacket::Interest(interest), timeout)? {
        Some(NdnPacket::ContentObject(object)) => {
            println!("Content received:");
            println!("  Name: {}", object.name);
            println!("  Freshness: {:?} s", object.signed_info.freshness_seconds);
            let content = object.content;
            if content.len() <= 100 {
                if let Ok(text) = std::str::from_utf8(&content) {
                    println!("  Content ({} bytes): {text}", content.len());
                } else {
                    println!("  Content ({} bytes): {:?}", content.len(), content.as_ref());
                }
            } else {
                println!("  Content: {} (first 100 bytes: {:?})", format_bytes(content.len()), &content[..100]);
            }
        }
        Some(NdnPacket::Interest(_)) => {
            println!("Unexpected reply: another Interest, not Content.");
        }
        None => {
            println!("No Content received within {timeout_ms}ms.");
        }
    }

    Ok(())
}
