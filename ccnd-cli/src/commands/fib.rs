//! FIB convenience commands: thin wrappers over `prefixreg`/`unreg`.
//!
//! Grounded on `rust-udcn-cli/src/commands/fib.rs`'s add/remove/show
//! structure; `show` keeps that file's honest not-fully-implemented
//! disclaimer since this daemon has no wire query for FIB contents (spec
//! leaves the internal-client surface at the message-contract level).

use std::time::Duration;

use anyhow::Result;

use crate::client::Target;
use crate::commands::management;

pub enum FibAction {
    Add { prefix: String, faceid: u32, lifetime_secs: u32 },
    Remove { prefix: String, faceid: u32 },
    Show,
}

pub fn handle(target: &Target, ccnd_id: &str, action: FibAction, timeout: Duration) -> Result<()> {
    match action {
        FibAction::Add { prefix, faceid, lifetime_secs } => {
            management::prefix_reg(target, ccnd_id, prefix, faceid, 0, lifetime_secs, timeout)
        }
        FibAction::Remove { prefix, faceid } => management::unreg(target, ccnd_id, prefix, faceid, timeout),
        FibAction::Show => {
            println!("FIB listing has no wire query in this build; use `ccnd-cli stats` for aggregate table sizes.");
            println!();
            println!("  Add a route:    ccnd-cli fib add <prefix> <faceid> [--lifetime <secs>]");
            println!("  Remove a route: ccnd-cli fib remove <prefix> <faceid>");
            Ok(())
        }
    }
}
