//! Address parsing and socket binding.
//!
//! Grounded on `rust-udcn-quic/src/config.rs`'s `ServerOptions`/
//! `configure_server` shape (parse options, build one concrete listener),
//! but with the TLS cert/key loading stripped out entirely: spec.md has no
//! certificate requirement, `CCND_LISTEN_ON` names plain addresses, not
//! TLS endpoints.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use ccnd_common::Error;
use mio::net::{TcpListener, UdpSocket, UnixListener};

/// A bound, not-yet-registered socket, ready to be handed to the reactor.
pub enum BoundSocket {
    Tcp(TcpListener),
    Udp(UdpSocket),
    Unix(UnixListener),
}

/// Resolve `CCND_LISTEN_ON` (or its absence, meaning "bind the wildcard
/// address") plus the local control socket path into the set of sockets
/// the daemon should bind at startup (spec §6 "CCND_LISTEN_ON").
pub fn bind_all(
    listen_on: Option<Vec<String>>,
    port: u16,
    local_socket_path: Option<PathBuf>,
) -> Result<Vec<BoundSocket>, Error> {
    let mut sockets = Vec::new();

    let addrs: Vec<SocketAddr> = match listen_on {
        Some(hosts) => hosts
            .iter()
            .map(|h| parse_host(h, port))
            .collect::<Result<Vec<_>, _>>()?,
        None => vec![
            SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
            SocketAddr::new(IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED), port),
        ],
    };

    for addr in addrs {
        match UdpSocket::bind(addr) {
            Ok(sock) => sockets.push(BoundSocket::Udp(sock)),
            Err(e) if addr.is_ipv6() => {
                log::debug!("skipping ipv6 udp bind on {addr}: {e}");
            }
            Err(e) => return Err(Error::Io(e)),
        }
        match TcpListener::bind(addr) {
            Ok(sock) => sockets.push(BoundSocket::Tcp(sock)),
            Err(e) if addr.is_ipv6() => {
                log::debug!("skipping ipv6 tcp bind on {addr}: {e}");
            }
            Err(e) => return Err(Error::Io(e)),
        }
    }

    if let Some(path) = local_socket_path {
        let _ = std::fs::remove_file(&path);
        let unix = UnixListener::bind(&path).map_err(Error::Io)?;
        sockets.push(BoundSocket::Unix(unix));
    }

    Ok(sockets)
}

fn parse_host(host: &str, default_port: u16) -> Result<SocketAddr, Error> {
    if let Ok(addr) = host.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, default_port));
    }
    Err(Error::Config(format!("unparseable CCND_LISTEN_ON entry: {host}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_ip_gets_default_port() {
        let addr = parse_host("10.0.0.5", 9695).unwrap();
        assert_eq!(addr, "10.0.0.5:9695".parse().unwrap());
    }

    #[test]
    fn ip_with_explicit_port_is_kept() {
        let addr = parse_host("10.0.0.5:7000", 9695).unwrap();
        assert_eq!(addr.port(), 7000);
    }

    #[test]
    fn garbage_entry_is_rejected() {
        assert!(parse_host("not-an-address", 9695).is_err());
    }
}
