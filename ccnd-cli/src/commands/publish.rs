//! Data publishing command.
//!
//! Grounded on `rust-udcn-cli/src/commands/publish.rs`'s build-then-send
//! shape; the QUIC producer-server loop is dropped since this daemon has no
//! "register as producer, serve forever" mode (the forwarder's content
//! store holds whatever is published and answers matching interests
//! itself). Signing is left as a zero-length placeholder, matching the rest
//! of this build's stance on cryptographic operations.

use anyhow::Result;
use bytes::Bytes;
use ccnd_common::ndn::{ContentObject, ContentType, Name, NdnPacket};
use log::info;

use crate::client::{self, Target};

pub fn publish_data(target: &Target, name_str: String, content: String, freshness_seconds: u32) -> Result<()> {
    info!("publishing: name={name_str}, content_len={}, freshness={freshness_seconds}s", content.len());

    let name = Name::from_string(&name_str);
    let object = ContentObject::new(name, Bytes::from(content.clone()))
        .with_freshness_seconds(freshness_seconds)
        .with_content_type(ContentType::Data);

    println!("Publishing:");
    println!("  Name: {name_str}");
    println!("  Freshness: {freshness_seconds}s");
    if content.len() > 32 {
        println!("  Content ({}): {}...", content.len(), &content[..30]);
    } else {
        println!("  Content ({}): {}", content.len(), content);
    }

    client::send_only(target, &NdnPacket::ContentObject(object))?;
    println!("Sent (unsolicited Content Objects get no reply; they land in the content store and satisfy any matching pending interest).");
    Ok(())
}
