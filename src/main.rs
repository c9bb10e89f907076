//! The `ccnd` daemon binary: parses arguments, loads configuration, and
//! drives the transport/forwarding loop until signalled to stop.

use std::path::PathBuf;

use clap::Parser;
use ccnd_core::config::CcndConfig;
use ccnd_transport::Transport;

/// Content-centric networking forwarder daemon.
#[derive(Parser, Debug)]
#[command(name = "ccnd", version, about)]
struct Args {
    /// Optional TOML config file layered under environment variables.
    #[arg(long)]
    config_file: Option<String>,

    /// Unix-domain socket path for the local control channel.
    #[arg(long, default_value = "/tmp/.ccnd.sock")]
    local_socket: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = CcndConfig::load(args.config_file.as_deref())?;
    log::info!(
        "starting ccnd: cap={} mtu={} local_port={}",
        config.ccnd_cap,
        config.ccnd_mtu,
        config.ccn_local_port
    );

    let mut transport = Transport::new(config, Some(args.local_socket))?;
    transport.run()
}
