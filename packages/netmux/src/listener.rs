use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::{TcpListener, TcpSocket};
use tracing::{debug, info};

use crate::error::RelayError;

/// How the listening socket is set up.
#[derive(Clone, Copy, Debug)]
pub struct ListenOptions {
    /// Bind only this address; `None` tries the IPv6 wildcard, then IPv4.
    pub host: Option<IpAddr>,
    pub backlog: u32,
}

impl Default for ListenOptions {
    fn default() -> Self {
        Self {
            host: None,
            backlog: 10,
        }
    }
}

/// Bind `port` on the first candidate address that accepts it and start listening.
///
/// Must be called from within a tokio runtime.
pub fn bind_and_listen(port: u16, options: &ListenOptions) -> Result<TcpListener, RelayError> {
    let candidates: Vec<IpAddr> = match options.host {
        Some(host) => vec![host],
        None => vec![
            IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        ],
    };

    let mut last_error = None;
    for ip in candidates {
        let addr = SocketAddr::new(ip, port);
        match bind_one(addr) {
            Ok(socket) => {
                let listener = socket
                    .listen(options.backlog)
                    .map_err(|source| RelayError::Listen { addr, source })?;
                let local = listener.local_addr().unwrap_or(addr);
                info!("Listening on {}", local);
                return Ok(listener);
            }
            Err(e) => {
                debug!("Could not bind {}: {}", addr, e);
                last_error = Some(e);
            }
        }
    }

    Err(RelayError::Bind {
        port,
        source: last_error
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no address")),
    })
}

fn bind_one(addr: SocketAddr) -> io::Result<TcpSocket> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    // lose the "address already in use" error after a quick restart
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    Ok(socket)
}

/// Human-readable peer address: the IP only, IPv4-mapped peers shown as IPv4.
pub fn format_peer_address(addr: SocketAddr) -> String {
    addr.ip().to_canonical().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapped_ipv4_peers_format_as_ipv4() {
        let mapped: SocketAddr = "[::ffff:127.0.0.1]:50000".parse().unwrap();
        assert_eq!(format_peer_address(mapped), "127.0.0.1");

        let v4: SocketAddr = "10.1.2.3:9".parse().unwrap();
        assert_eq!(format_peer_address(v4), "10.1.2.3");

        let v6: SocketAddr = "[2001:db8::1]:443".parse().unwrap();
        assert_eq!(format_peer_address(v6), "2001:db8::1");
    }

    #[tokio::test]
    async fn explicit_host_binds_ephemeral_port() {
        let options = ListenOptions {
            host: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            backlog: 10,
        };
        let listener = bind_and_listen(0, &options).unwrap();
        let local = listener.local_addr().unwrap();
        assert_eq!(local.ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_ne!(local.port(), 0);
    }

    #[tokio::test]
    async fn wildcard_accepts_loopback_connections() {
        let listener = bind_and_listen(0, &ListenOptions::default()).unwrap();
        let port = listener.local_addr().unwrap().port();

        let connect = tokio::net::TcpStream::connect((Ipv4Addr::LOCALHOST, port));
        let (accepted, client) = tokio::join!(listener.accept(), connect);
        let (_stream, peer) = accepted.unwrap();
        client.unwrap();
        assert_eq!(format_peer_address(peer), "127.0.0.1");
    }

    #[tokio::test]
    async fn port_in_use_is_a_bind_error() {
        let options = ListenOptions {
            host: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            backlog: 10,
        };
        let first = bind_and_listen(0, &options).unwrap();
        let port = first.local_addr().unwrap().port();

        let err = bind_and_listen(port, &options).unwrap_err();
        assert!(matches!(err, RelayError::Bind { port: p, .. } if p == port));
        assert_eq!(err.exit_code(), 2);
    }
}
