use super::{CommandSink, TransportError};
use crate::protocol::{encode, Command};
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// One datagram per command over non-blocking UDP sockets.
///
/// An IPv4 socket is always bound; an IPv6 socket is bound when the host
/// supports it. The destination's family picks the socket.
#[derive(Debug)]
pub struct UdpTransport {
    v4: UdpSocket,
    v6: Option<UdpSocket>,
    destination: Option<SocketAddr>,
    sent: u64,
    dropped: u64,
}

impl UdpTransport {
    /// Binds ephemeral local ports. Must run inside a tokio runtime.
    pub async fn bind() -> Result<Self, TransportError> {
        let v4 = bind_ready("0.0.0.0:0").await?;
        let v6 = match bind_ready("[::]:0").await {
            Ok(socket) => Some(socket),
            Err(e) => {
                warn!("No IPv6 socket, IPv6 destinations will be dropped: {}", e);
                None
            }
        };
        Ok(Self {
            v4,
            v6,
            destination: None,
            sent: 0,
            dropped: 0,
        })
    }

    pub fn destination(&self) -> Option<SocketAddr> {
        self.destination
    }

    /// Number of datagrams handed to the OS and number dropped.
    pub fn stats(&self) -> (u64, u64) {
        (self.sent, self.dropped)
    }

    /// Sends without waiting. A full socket buffer surfaces as `WouldBlock`.
    pub fn try_send(&self, command: &Command) -> Result<usize, TransportError> {
        let target = self.destination.ok_or(TransportError::NoDestination)?;
        let socket = match target {
            SocketAddr::V4(_) => &self.v4,
            SocketAddr::V6(_) => self
                .v6
                .as_ref()
                .ok_or(TransportError::UnsupportedFamily(target))?,
        };
        let payload = encode(command);
        Ok(socket.try_send_to(payload.as_bytes(), target)?)
    }
}

// tokio only attempts `try_send_to` once the socket has been seen writable.
async fn bind_ready(addr: &str) -> Result<UdpSocket, TransportError> {
    let socket = UdpSocket::bind(addr).await?;
    socket.writable().await?;
    info!("UDP transport bound to {}", socket.local_addr()?);
    Ok(socket)
}

impl CommandSink for UdpTransport {
    fn send(&mut self, command: &Command) {
        match self.try_send(command) {
            Ok(bytes) => {
                self.sent += 1;
                debug!("Sent {} ({} bytes)", command, bytes);
            }
            Err(TransportError::NoDestination) => {
                self.dropped += 1;
                debug!("Dropped {}: no destination configured", command);
            }
            Err(e) => {
                self.dropped += 1;
                warn!("Dropped {}: {}", command, e);
            }
        }
    }

    fn set_destination(&mut self, destination: Option<SocketAddr>) {
        info!("UDP destination set to {:?}", destination);
        self.destination = destination;
    }
}
