//! Connected UDP endpoint for a voice call
//!
//! One datagram carries one audio block, with no header or sequencing;
//! the datagram boundary itself is the framing. The endpoint is used in
//! both directions by two different threads, but each performs only its
//! own directional operation, so no locking is involved.

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use crate::error::NetworkError;

/// Outcome of one bounded receive attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum RecvOutcome {
    /// A datagram of this many bytes landed in the buffer.
    Datagram(usize),
    /// Nothing arrived within the configured timeout.
    TimedOut,
}

/// A connected, timeout-configured UDP socket.
pub struct CallEndpoint {
    socket: UdpSocket,
}

impl CallEndpoint {
    /// Resolve `server`, bind an ephemeral local socket of the matching
    /// address family, connect, and arm the receive timeout.
    pub fn connect(server: &str, recv_timeout: Duration) -> Result<Self, NetworkError> {
        let addr = server
            .to_socket_addrs()
            .map_err(|e| NetworkError::Resolve {
                addr: server.to_string(),
                reason: e.to_string(),
            })?
            .next()
            .ok_or_else(|| NetworkError::Resolve {
                addr: server.to_string(),
                reason: "no addresses returned".to_string(),
            })?;

        let local: SocketAddr = if addr.is_ipv4() {
            "0.0.0.0:0".parse().expect("literal addr")
        } else {
            "[::]:0".parse().expect("literal addr")
        };

        let socket = UdpSocket::bind(local).map_err(NetworkError::Bind)?;
        socket.connect(addr).map_err(NetworkError::Connect)?;
        socket
            .set_read_timeout(Some(recv_timeout))
            .map_err(NetworkError::SocketOption)?;

        Ok(Self { socket })
    }

    /// Wrap an already configured socket. The caller is responsible for
    /// having connected it and set a read timeout.
    pub fn from_socket(socket: UdpSocket) -> Self {
        Self { socket }
    }

    /// Send one datagram, retrying when the call is interrupted by a
    /// signal. Any other failure surfaces to the caller.
    pub fn send_datagram(&self, payload: &[u8]) -> Result<(), NetworkError> {
        loop {
            match self.socket.send(payload) {
                Ok(_) => return Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(NetworkError::Send(e)),
            }
        }
    }

    /// Receive one datagram into `buf`, bounded by the configured
    /// timeout. Interrupted calls are retried; an elapsed timeout is a
    /// distinct, non-error outcome.
    pub fn recv_datagram(&self, buf: &mut [u8]) -> Result<RecvOutcome, NetworkError> {
        loop {
            match self.socket.recv(buf) {
                Ok(n) => return Ok(RecvOutcome::Datagram(n)),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    return Ok(RecvOutcome::TimedOut)
                }
                Err(e) => return Err(NetworkError::Recv(e)),
            }
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetworkError> {
        self.socket.local_addr().map_err(NetworkError::SocketOption)
    }

    pub fn peer_addr(&self) -> Result<SocketAddr, NetworkError> {
        self.socket.peer_addr().map_err(NetworkError::SocketOption)
    }
}
