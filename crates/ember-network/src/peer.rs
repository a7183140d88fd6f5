//! Connected peer registry.
//!
//! Each peer is represented by its outbound message channel; the
//! channel feeds a dedicated writer task, which serializes all writes
//! to that peer. Senders are cloned out of the lock before any await.

use crate::Message;
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::warn;

/// Per-peer connection state.
struct PeerEntry {
    /// Outbound message queue, drained by the peer's writer task.
    tx: mpsc::Sender<Message>,
    /// Peer's best height from its version message.
    height: u64,
}

/// All currently connected peers, keyed by remote address.
#[derive(Default)]
pub struct PeerRegistry {
    peers: RwLock<HashMap<String, PeerEntry>>,
}

impl PeerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly connected peer.
    pub fn insert(&self, addr: &str, tx: mpsc::Sender<Message>) {
        self.peers
            .write()
            .insert(addr.to_string(), PeerEntry { tx, height: 0 });
    }

    /// Remove a disconnected peer.
    pub fn remove(&self, addr: &str) {
        self.peers.write().remove(addr);
    }

    /// Record a peer's advertised best height.
    pub fn set_height(&self, addr: &str, height: u64) {
        if let Some(entry) = self.peers.write().get_mut(addr) {
            entry.height = height;
        }
    }

    /// A peer's last advertised height.
    pub fn height_of(&self, addr: &str) -> Option<u64> {
        self.peers.read().get(addr).map(|entry| entry.height)
    }

    /// Number of connected peers.
    pub fn count(&self) -> usize {
        self.peers.read().len()
    }

    /// Addresses of all connected peers.
    pub fn addresses(&self) -> Vec<String> {
        self.peers.read().keys().cloned().collect()
    }

    /// Queue a message for one peer.
    pub async fn send_to(&self, addr: &str, message: Message) {
        let tx = self.peers.read().get(addr).map(|entry| entry.tx.clone());
        if let Some(tx) = tx {
            if tx.send(message).await.is_err() {
                warn!(peer = addr, "peer channel closed, dropping message");
            }
        }
    }

    /// Queue a message for every peer.
    pub async fn broadcast(&self, message: Message) {
        self.broadcast_except(None, message).await;
    }

    /// Queue a message for every peer except an optional source.
    pub async fn broadcast_except(&self, source: Option<&str>, message: Message) {
        let targets: Vec<(String, mpsc::Sender<Message>)> = self
            .peers
            .read()
            .iter()
            .filter(|(addr, _)| Some(addr.as_str()) != source)
            .map(|(addr, entry)| (addr.clone(), entry.tx.clone()))
            .collect();

        for (addr, tx) in targets {
            if tx.send(message.clone()).await.is_err() {
                warn!(peer = %addr, "peer channel closed, dropping broadcast");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GetBlocksPayload, VerackPayload};

    #[tokio::test]
    async fn registry_tracks_peers() {
        let registry = PeerRegistry::new();
        let (tx, _rx) = mpsc::channel(8);

        registry.insert("127.0.0.1:1000", tx);
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.addresses(), vec!["127.0.0.1:1000".to_string()]);

        registry.set_height("127.0.0.1:1000", 9);
        assert_eq!(registry.height_of("127.0.0.1:1000"), Some(9));

        registry.remove("127.0.0.1:1000");
        assert_eq!(registry.count(), 0);
        assert_eq!(registry.height_of("127.0.0.1:1000"), None);
    }

    #[tokio::test]
    async fn broadcast_except_skips_source() {
        let registry = PeerRegistry::new();
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        registry.insert("a", tx_a);
        registry.insert("b", tx_b);

        registry
            .broadcast_except(Some("a"), Message::Verack(VerackPayload {}))
            .await;

        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), Message::Verack(VerackPayload {}));
    }

    #[tokio::test]
    async fn send_to_reaches_one_peer() {
        let registry = PeerRegistry::new();
        let (tx, mut rx) = mpsc::channel(8);
        registry.insert("a", tx);

        registry
            .send_to("a", Message::GetBlocks(GetBlocksPayload { from_height: 3 }))
            .await;
        assert_eq!(
            rx.try_recv().unwrap(),
            Message::GetBlocks(GetBlocksPayload { from_height: 3 })
        );
    }
}
