//! Command-line management client for `ccnd`.
//!
//! Grounded on `rust-udcn-cli/src/main.rs`'s `Cli`/`Subcommand` layout and
//! dispatch shape, pointed at `ccnd`'s actual control surface: face/FIB
//! management over the wire (spec §6) plus interest/publish/fib/stats
//! convenience commands, instead of the teacher's XDP/QUIC operations.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod client;
mod commands;
mod utils;

use client::Target;
use commands::fib::FibAction;

/// Management client for a running ccnd daemon.
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Increase log verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    /// TCP address of the daemon's listener, "host:port"
    #[clap(long, global = true, default_value = "127.0.0.1:9695")]
    addr: String,

    /// Unix-domain control socket path; overrides --addr when set
    #[clap(long, global = true)]
    socket: Option<PathBuf>,

    /// ccnd-id component of the management namespace this daemon answers
    /// under. Real deployments derive this from the daemon's public key
    /// digest (spec §6); this build has no signing key material, so it
    /// defaults to a fixed placeholder and can be overridden per-daemon.
    #[clap(long, global = true, default_value = "local")]
    ccnd_id: String,

    /// Reply timeout in milliseconds
    #[clap(short, long, global = true, default_value = "4000")]
    timeout: u64,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an outbound face (spec §6 "newface")
    NewFace {
        /// "tcp" or "udp"
        protocol: String,
        address: String,
        port: u16,
    },

    /// Destroy a face by id (spec §6 "destroyface")
    DestroyFace { faceid: u32 },

    /// Register a prefix to a face (spec §6 "prefixreg")
    PrefixReg {
        prefix: String,
        faceid: u32,
        #[clap(long, default_value = "0")]
        flags: u8,
        #[clap(long, default_value = "300")]
        lifetime: u32,
    },

    /// Register a prefix to the requester's own face (spec §6 "selfreg")
    SelfReg {
        prefix: String,
        #[clap(long, default_value = "300")]
        lifetime: u32,
    },

    /// Remove a (prefix, face) FIB entry (spec §6 "unreg")
    Unreg { prefix: String, faceid: u32 },

    /// Send an Interest and print the Content Object reply, if any
    Interest {
        name: String,
        #[clap(long, default_value = "4000")]
        lifetime: u32,
    },

    /// Publish a Content Object
    Publish {
        name: String,
        content: String,
        #[clap(long, default_value = "60")]
        freshness: u32,
    },

    /// FIB convenience commands (thin wrappers over prefixreg/unreg)
    Fib {
        #[clap(subcommand)]
        cmd: FibCommands,
    },

    /// Query the daemon's stats, if it answers
    Stats,

    /// Send a batch of interests under a prefix and report hit/timeout rates
    Benchmark {
        #[clap(long, default_value = "1000")]
        count: usize,
        #[clap(long, default_value = "/benchmark")]
        prefix: String,
        #[clap(long, default_value = "1")]
        concurrent: usize,
    },
}

#[derive(Subcommand)]
enum FibCommands {
    Add {
        prefix: String,
        faceid: u32,
        #[clap(long, default_value = "300")]
        lifetime: u32,
    },
    Remove {
        prefix: String,
        faceid: u32,
    },
    Show,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "info" }),
    )
    .init();

    let target = match &cli.socket {
        Some(path) => Target::Unix(path.clone()),
        None => Target::Tcp(cli.addr.clone()),
    };
    let timeout = Duration::from_millis(cli.timeout);

    match cli.command {
        Commands::NewFace { protocol, address, port } => {
            commands::management::new_face(&target, &cli.ccnd_id, protocol, address, port, timeout)?
        }
        Commands::DestroyFace { faceid } => commands::management::destroy_face(&target, &cli.ccnd_id, faceid, timeout)?,
        Commands::PrefixReg { prefix, faceid, flags, lifetime } => {
            commands::management::prefix_reg(&target, &cli.ccnd_id, prefix, faceid, flags, lifetime, timeout)?
        }
        Commands::SelfReg { prefix, lifetime } => commands::management::self_reg(&target, &cli.ccnd_id, prefix, lifetime, timeout)?,
        Commands::Unreg { prefix, faceid } => commands::management::unreg(&target, &cli.ccnd_id, prefix, faceid, timeout)?,
        Commands::Interest { name, lifetime } => commands::interest::send_interest(&target, name, cli.timeout, lifetime)?,
        Commands::Publish { name, content, freshness } => commands::publish::publish_data(&target, name, content, freshness)?,
        Commands::Fib { cmd } => {
            let action = match cmd {
                FibCommands::Add { prefix, faceid, lifetime } => FibAction::Add { prefix, faceid, lifetime_secs: lifetime },
                FibCommands::Remove { prefix, faceid } => FibAction::Remove { prefix, faceid },
                FibCommands::Show => FibAction::Show,
            };
            commands::fib::handle(&target, &cli.ccnd_id, action, timeout)?
        }
        Commands::Stats => commands::stats::show_stats(&target, &cli.ccnd_id, timeout)?,
        Commands::Benchmark { count, prefix, concurrent } => {
            commands::benchmark::run_benchmark(&target, count, prefix, concurrent, timeout)?
        }
    }

    Ok(())
}
