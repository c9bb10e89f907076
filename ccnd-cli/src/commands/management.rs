//! Face and FIB management commands: `newface`, `destroyface`, `prefixreg`,
//! `selfreg`, `unreg`.
//!
//! Grounded on `rust-udcn-cli/src/commands/fib.rs`'s add/remove/show shape,
//! rebuilt around the management namespace's actual wire contract: each
//! operation is an Interest under `/ccnx/<ccnd-id>/<op>` carrying the
//! request as its trailing name component, answered (if at all) by a
//! Content Object reply. Request payloads are plain `key=value;...` ASCII
//! rather than a signed FaceInstance, since signing key material is not
//! part of this build.

use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use ccnd_common::ndn::{Interest, Name, NameComponent, NdnPacket, Scope};
use log::info;
use rand::RngCore;

use crate::client::{self, Target};
use crate::utils::print_reply;

fn management_interest(ccnd_id: &str, op: &str, arg: String) -> Interest {
    let mut nonce = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut nonce);
    let name = Name::from_string(&format!("/ccnx/{ccnd_id}/{op}")).with_component(NameComponent::new(arg.into_bytes()));
    Interest::new(name).with_nonce(Bytes::copy_from_slice(&nonce)).with_scope(Scope::ThisHostOnly)
}

fn run(target: &Target, ccnd_id: &str, op: &str, arg: String, timeout: Duration) -> Result<()> {
    info!("sending {op} request: {arg}");
    let interest = management_interest(ccnd_id, op, arg);
    let reply = client::send_and_await(target, &NdnPacket::Interest(interest), timeout)?;
    print_reply(op, reply);
    Ok(())
}

pub fn new_face(target: &Target, ccnd_id: &str, protocol: String, address: String, port: u16, timeout: Duration) -> Result<()> {
    let arg = format!("protocol={protocol};address={address};port={port}");
    run(target, ccnd_id, "newface", arg, timeout)
}

pub fn destroy_face(target: &Target, ccnd_id: &str, faceid: u32, timeout: Duration) -> Result<()> {
    run(target, ccnd_id, "destroyface", format!("faceid={faceid}"), timeout)
}

pub fn prefix_reg(target: &Target, ccnd_id: &str, prefix: String, faceid: u32, flags: u8, lifetime_secs: u32, timeout: Duration) -> Result<()> {
    let arg = format!("prefix={prefix};faceid={faceid};flags={flags};lifetime={lifetime_secs}");
    run(target, ccnd_id, "prefixreg", arg, timeout)
}

pub fn self_reg(target: &Target, ccnd_id: &str, prefix: String, lifetime_secs: u32, timeout: Duration) -> Result<()> {
    let arg = format!("prefix={prefix};lifetime={lifetime_secs}");
    run(target, ccnd_id, "selfreg", arg, timeout)
}

pub fn unreg(target: &Target, ccnd_id: &str, prefix: String, faceid: u32, timeout: Duration) -> Result<()> {
    let arg = format!("prefix={prefix};faceid={faceid}");
    run(target, ccnd_id, "unreg", arg, timeout)
}
