//! Known-caller registry
//!
//! The relay learns callers from the datagrams they send; there is no
//! join handshake. Each packet refreshes its sender's last-seen instant,
//! and callers idle past the TTL are pruned so dead addresses stop
//! receiving forwarded audio.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

/// Address set with last-seen tracking, shared between the relay loops.
#[derive(Default)]
pub struct PeerRegistry {
    peers: RwLock<HashMap<SocketAddr, Instant>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a caller.
    pub fn touch(&self, addr: SocketAddr, seen: Instant) {
        self.peers.write().insert(addr, seen);
    }

    /// Snapshot of all known caller addresses.
    pub fn peers(&self) -> Vec<SocketAddr> {
        self.peers.read().keys().copied().collect()
    }

    /// Remove every caller last seen before `cutoff`, returning how many
    /// were removed.
    pub fn prune(&self, cutoff: Instant) -> usize {
        let mut peers = self.peers.write();
        let before = peers.len();
        peers.retain(|_, last_seen| *last_seen >= cutoff);
        before - peers.len()
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn touch_registers_and_refreshes() {
        let registry = PeerRegistry::new();
        let now = Instant::now();

        registry.touch(addr(4000), now);
        registry.touch(addr(4001), now);
        registry.touch(addr(4000), now + Duration::from_secs(1));

        let mut peers = registry.peers();
        peers.sort();
        assert_eq!(peers, vec![addr(4000), addr(4001)]);
    }

    #[test]
    fn prune_removes_only_stale_peers() {
        let registry = PeerRegistry::new();
        let now = Instant::now();

        registry.touch(addr(4000), now);
        registry.touch(addr(4001), now + Duration::from_secs(10));

        let removed = registry.prune(now + Duration::from_secs(5));
        assert_eq!(removed, 1);
        assert_eq!(registry.peers(), vec![addr(4001)]);

        // Nothing left to prune at the same cutoff
        assert_eq!(registry.prune(now + Duration::from_secs(5)), 0);
    }
}
