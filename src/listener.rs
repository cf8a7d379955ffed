use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{Config, Family};
use crate::logger::Logger;

/// Smallest backlog handed to the OS when the caller supplies a
/// non-positive value.
const MIN_BACKLOG: i32 = 5;

#[derive(Debug, Error)]
pub enum BindError {
    #[error("port {0} is outside the valid range 1-65535")]
    InvalidPort(u16),
    #[error("unable to create server socket on port {port}")]
    Io {
        port: u16,
        #[source]
        source: io::Error,
    },
}

/// Create one bound, passively listening honeypot socket.
///
/// The socket listens on the wildcard address of `family`. Address reuse is
/// best-effort: some platforms restrict it, so a failure to set it is logged
/// as a warning rather than treated as fatal.
pub fn create(
    port: u16,
    family: Family,
    backlog: i32,
    logger: &Logger,
) -> Result<TcpListener, BindError> {
    if port == 0 {
        return Err(BindError::InvalidPort(port));
    }
    let backlog = if backlog <= 0 { MIN_BACKLOG } else { backlog };
    let wrap = |source: io::Error| BindError::Io { port, source };

    let domain = match family {
        Family::V4 => Domain::IPV4,
        Family::V6 => Domain::IPV6,
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP)).map_err(wrap)?;

    if let Err(e) = socket.set_reuse_address(true) {
        logger.warn(&format!("Unable to make the address reusable; {e}"));
    }

    let wildcard: SocketAddr = match family {
        Family::V4 => (Ipv4Addr::UNSPECIFIED, port).into(),
        Family::V6 => (Ipv6Addr::UNSPECIFIED, port).into(),
    };
    socket.bind(&wildcard.into()).map_err(wrap)?;
    socket.listen(backlog).map_err(wrap)?;
    socket.set_nonblocking(true).map_err(wrap)?;

    TcpListener::from_std(socket.into()).map_err(wrap)
}

#[derive(Debug)]
struct Entry {
    port: u16,
    listener: TcpListener,
}

/// The full set of honeypot listeners, one per configured port, in
/// configuration order.
#[derive(Debug)]
pub struct ListenerSet {
    entries: Vec<Entry>,
}

impl ListenerSet {
    /// Bind every configured port, all-or-nothing.
    ///
    /// The first port that cannot be bound aborts startup; no partial
    /// listener set is ever left running silently.
    pub fn bind(config: &Config, logger: &Logger) -> Result<Self, BindError> {
        let mut entries = Vec::with_capacity(config.ports.len());
        for &port in &config.ports {
            let listener = create(port, config.family, config.backlog, logger)?;
            logger.info(&format!("Listening to any address on port {port}"));
            entries.push(Entry { port, listener });
        }
        Ok(Self { entries })
    }

    /// Listeners with their configured ports, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &TcpListener)> {
        self.entries.iter().map(|e| (e.port, &e.listener))
    }

    /// Close every socket exactly once, in registration order.
    pub fn close(self, logger: &Logger) {
        for entry in self.entries {
            drop(entry.listener);
            logger.debug(&format!("Closed listener on port {}", entry.port));
        }
    }
}
