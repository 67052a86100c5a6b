//! Fire-and-forget delivery of encoded commands.
//!
//! A [`CommandSink`] accepts a [`Command`] and never reports failure to the
//! caller: a dropped datagram must not interrupt input processing. Sinks that
//! can fail expose a `try_send` returning [`TransportError`] and implement
//! [`CommandSink::send`] as a logged no-op on error.

pub mod channel;
pub mod udp;

pub use channel::ChannelSink;
pub use udp::UdpTransport;

use crate::protocol::Command;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use tracing::debug;

/// Destination of outgoing commands.
pub trait CommandSink: Send {
    /// Best-effort, non-blocking send.
    fn send(&mut self, command: &Command);

    /// Re-point the sink. `None` leaves it unconfigured, which turns every
    /// send into a no-op.
    fn set_destination(&mut self, destination: Option<SocketAddr>);
}

impl<T: CommandSink + ?Sized> CommandSink for Box<T> {
    fn send(&mut self, command: &Command) {
        (**self).send(command)
    }

    fn set_destination(&mut self, destination: Option<SocketAddr>) {
        (**self).set_destination(destination)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("No destination configured")]
    NoDestination,

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Empty host")]
    EmptyHost,

    #[error("Could not resolve {0}")]
    Unresolvable(String),

    #[error("No socket for the address family of {0}")]
    UnsupportedFamily(SocketAddr),

    #[error("Socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// Host and port of the peer as entered in the connect step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub host: String,
    pub port: u16,
}

impl Default for Destination {
    fn default() -> Self {
        Self {
            host: "192.168.1.5".to_string(),
            port: 5000,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl Destination {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Builds a destination from free-form text fields.
    pub fn parse(host: &str, port: &str) -> Result<Self, TransportError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(TransportError::EmptyHost);
        }
        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|_| TransportError::InvalidPort(port.to_string()))?;
        Ok(Self::new(host, port))
    }

    /// Resolves without touching DNS: empty hosts fail and IP literals map
    /// straight to an address. `None` means a lookup is needed.
    pub fn resolve_now(&self) -> Option<Result<SocketAddr, TransportError>> {
        let host = self.host.trim();
        if host.is_empty() {
            return Some(Err(TransportError::EmptyHost));
        }
        let literal = host.trim_start_matches('[').trim_end_matches(']');
        literal
            .parse::<IpAddr>()
            .ok()
            .map(|ip| Ok(SocketAddr::new(ip, self.port)))
    }

    /// Resolves the host, preferring an IPv4 address when it has both.
    pub async fn resolve(&self) -> Result<SocketAddr, TransportError> {
        if let Some(resolved) = self.resolve_now() {
            return resolved;
        }
        let addrs: Vec<SocketAddr> =
            tokio::net::lookup_host((self.host.trim(), self.port)).await?.collect();
        let chosen = addrs
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| addrs.first())
            .copied();
        match chosen {
            Some(addr) => {
                debug!("Resolved {} to {}", self, addr);
                Ok(addr)
            }
            None => Err(TransportError::Unresolvable(self.to_string())),
        }
    }
}
