//! UDP relay server
//!
//! Forwards every caller's datagrams to every other known caller, with
//! no inspection or mixing; the payload goes out exactly as it came in.
//! Three loops run behind one stop flag: ingress reads datagrams and
//! refreshes the registry, egress fans queued packets out, and prune
//! drops callers idle past the TTL. The socket read timeout doubles as
//! the stop-flag poll interval.

pub mod registry;

pub use registry::PeerRegistry;

use bytes::Bytes;
use crossbeam_channel::{bounded, RecvTimeoutError, TrySendError};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::RelayConfig;
use crate::error::{Error, NetworkError};
use crate::link::ShutdownFlag;

/// One datagram in flight through the relay.
pub struct RelayPacket {
    pub from: SocketAddr,
    pub payload: Bytes,
    pub received_at: Instant,
}

/// The relay server: a bound socket plus the caller registry.
pub struct RelayServer {
    config: RelayConfig,
    socket: UdpSocket,
    registry: PeerRegistry,
}

impl RelayServer {
    /// Resolve and bind the listen address, apply the OS receive buffer
    /// size when configured, and arm the read timeout.
    pub fn bind(config: RelayConfig) -> Result<Self, Error> {
        config.validate().map_err(Error::Config)?;

        let addr = config
            .listen
            .to_socket_addrs()
            .map_err(|e| {
                Error::Network(NetworkError::Resolve {
                    addr: config.listen.clone(),
                    reason: e.to_string(),
                })
            })?
            .next()
            .ok_or_else(|| {
                Error::Network(NetworkError::Resolve {
                    addr: config.listen.clone(),
                    reason: "no addresses returned".to_string(),
                })
            })?;

        let socket = socket2::Socket::new(
            socket2::Domain::for_address(addr),
            socket2::Type::DGRAM,
            Some(socket2::Protocol::UDP),
        )
        .map_err(|e| Error::Network(NetworkError::Bind(e)))?;

        if config.read_buffer_bytes > 0 {
            socket
                .set_recv_buffer_size(config.read_buffer_bytes)
                .map_err(|e| Error::Network(NetworkError::SocketOption(e)))?;
        }

        socket
            .bind(&addr.into())
            .map_err(|e| Error::Network(NetworkError::Bind(e)))?;

        let socket: UdpSocket = socket.into();
        socket
            .set_read_timeout(Some(config.read_timeout()))
            .map_err(|e| Error::Network(NetworkError::SocketOption(e)))?;

        Ok(Self {
            config,
            socket,
            registry: PeerRegistry::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        self.socket
            .local_addr()
            .map_err(|e| Error::Network(NetworkError::SocketOption(e)))
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// Run the ingress, egress and prune loops until the stop flag is
    /// raised.
    pub fn run(&self, stop: &ShutdownFlag) -> Result<(), Error> {
        let (packet_tx, packet_rx) = bounded::<RelayPacket>(self.config.queue_size);

        thread::scope(|s| -> Result<(), Error> {
            // A failed spawn raises the flag so already-running loops
            // wind down before the scope joins them
            let spawn_failed = |e| {
                stop.raise();
                Error::Io(e)
            };

            thread::Builder::new()
                .name("relay-ingress".to_string())
                .spawn_scoped(s, || self.ingress_loop(packet_tx, stop))
                .map_err(spawn_failed)?;

            thread::Builder::new()
                .name("relay-egress".to_string())
                .spawn_scoped(s, || self.egress_loop(packet_rx, stop))
                .map_err(spawn_failed)?;

            if let Some(ttl) = self.config.client_ttl() {
                thread::Builder::new()
                    .name("relay-prune".to_string())
                    .spawn_scoped(s, move || self.prune_loop(ttl, stop))
                    .map_err(spawn_failed)?;
            }

            Ok(())
        })?;

        tracing::info!("relay stopped");
        Ok(())
    }

    fn ingress_loop(&self, packet_tx: crossbeam_channel::Sender<RelayPacket>, stop: &ShutdownFlag) {
        let mut buf = vec![0u8; self.config.max_packet_size];
        let mut dropped: u64 = 0;

        while !stop.is_raised() {
            let (len, from) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut
                        || e.kind() == std::io::ErrorKind::Interrupted =>
                {
                    continue
                }
                Err(e) => {
                    tracing::warn!("udp read error: {e}");
                    continue;
                }
            };

            let now = Instant::now();
            self.registry.touch(from, now);

            let packet = RelayPacket {
                from,
                payload: Bytes::copy_from_slice(&buf[..len]),
                received_at: now,
            };

            match packet_tx.try_send(packet) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    dropped += 1;
                    tracing::debug!(dropped, "queue full, dropping packet");
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    fn egress_loop(&self, packet_rx: crossbeam_channel::Receiver<RelayPacket>, stop: &ShutdownFlag) {
        while !stop.is_raised() {
            let packet = match packet_rx.recv_timeout(self.config.read_timeout()) {
                Ok(packet) => packet,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return,
            };

            for peer in self.registry.peers() {
                if peer == packet.from {
                    continue;
                }
                if let Err(e) = self.socket.send_to(&packet.payload, peer) {
                    tracing::warn!(%peer, "udp write error: {e}");
                }
            }
        }
    }

    fn prune_loop(&self, ttl: Duration, stop: &ShutdownFlag) {
        let interval = self.config.cleanup_interval();
        let mut last_prune = Instant::now();

        while !stop.is_raised() {
            thread::sleep(Duration::from_millis(50));
            if last_prune.elapsed() < interval {
                continue;
            }
            last_prune = Instant::now();

            if let Some(cutoff) = last_prune.checked_sub(ttl) {
                let removed = self.registry.prune(cutoff);
                if removed > 0 {
                    tracing::info!(removed, "pruned inactive callers");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(listen: &str) -> RelayConfig {
        RelayConfig {
            listen: listen.to_string(),
            read_timeout_ms: 50,
            ..RelayConfig::default()
        }
    }

    fn client_socket(timeout: Duration) -> UdpSocket {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(timeout)).unwrap();
        socket
    }

    #[test]
    fn bind_rejects_invalid_config() {
        let mut config = test_config("127.0.0.1:0");
        config.queue_size = 0;
        assert!(RelayServer::bind(config).is_err());
    }

    #[test]
    fn forwards_to_every_caller_except_the_source() {
        let server = RelayServer::bind(test_config("127.0.0.1:0")).unwrap();
        let relay_addr = server.local_addr().unwrap();
        let stop = ShutdownFlag::new();

        let run_stop = stop.clone();
        thread::scope(|s| {
            s.spawn(move || server.run(&run_stop).unwrap());

            let a = client_socket(Duration::from_secs(2));
            let b = client_socket(Duration::from_secs(2));

            // First datagram registers a; nobody else hears it
            a.send_to(b"register-a", relay_addr).unwrap();
            thread::sleep(Duration::from_millis(100));

            // b's datagram registers b and is forwarded to a only
            b.send_to(b"from-b", relay_addr).unwrap();
            let mut buf = [0u8; 64];
            let (len, _) = a.recv_from(&mut buf).unwrap();
            assert_eq!(&buf[..len], b"from-b");

            // And the reverse direction reaches b, not a
            a.send_to(b"from-a", relay_addr).unwrap();
            let (len, _) = b.recv_from(&mut buf).unwrap();
            assert_eq!(&buf[..len], b"from-a");

            stop.raise();
        });
    }
}
