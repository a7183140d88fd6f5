//! The P2P node: listener, dialer, and per-peer tasks.
//!
//! On accept or dial each side immediately sends its `version`. A peer
//! that advertises a higher chain triggers a `getblocks` catch-up.
//! Valid gossiped blocks are applied and relayed to every other peer;
//! gossiped transactions go to the mempool, errors logged and dropped.

use crate::{
    GetBlocksPayload, Message, NetworkError, NetworkResult, PeerRegistry, VerackPayload,
    VersionPayload, MAX_MESSAGE_SIZE,
};
use ember_chain::Chain;
use ember_consensus::{Block, Transaction};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, warn};

/// Outbound connection timeout.
const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-peer outbound queue depth.
const PEER_QUEUE_DEPTH: usize = 64;

/// The P2P networking node.
pub struct P2pNode {
    chain: Arc<Chain>,
    peers: Arc<PeerRegistry>,
    protocol_version: u32,
    network_id: u32,
}

impl P2pNode {
    /// Create a node for a chain. Protocol parameters come from the
    /// chain's network config.
    pub fn new(chain: Arc<Chain>) -> Arc<Self> {
        let protocol_version = chain.config().protocol_version;
        let network_id = chain.config().network_id;
        Arc::new(Self {
            chain,
            peers: Arc::new(PeerRegistry::new()),
            protocol_version,
            network_id,
        })
    }

    /// Bind the listener and start accepting peers.
    ///
    /// Returns the bound address (useful when asking for port 0).
    pub async fn start(self: &Arc<Self>, port: u16) -> NetworkResult<SocketAddr> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "p2p listening");

        let node = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer_addr)) => {
                        let node = Arc::clone(&node);
                        tokio::spawn(node.handle_peer(stream, peer_addr.to_string()));
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                    }
                }
            }
        });

        Ok(local_addr)
    }

    /// Dial a remote peer.
    pub async fn connect(self: &Arc<Self>, addr: &str) -> NetworkResult<()> {
        let stream = tokio::time::timeout(DIAL_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| NetworkError::Timeout(format!("dial {addr}")))??;
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| addr.to_string());

        info!(peer = %peer_addr, "connected to peer");
        let node = Arc::clone(self);
        tokio::spawn(node.handle_peer(stream, peer_addr));
        Ok(())
    }

    /// Number of connected peers.
    pub fn peer_count(&self) -> usize {
        self.peers.count()
    }

    /// Addresses of connected peers.
    pub fn peer_addresses(&self) -> Vec<String> {
        self.peers.addresses()
    }

    /// Gossip a block to every peer.
    pub async fn broadcast_block(&self, block: &Block) {
        self.peers.broadcast(Message::Block(block.clone())).await;
    }

    /// Gossip a transaction to every peer.
    pub async fn broadcast_tx(&self, tx: &Transaction) {
        self.peers.broadcast(Message::Tx(tx.clone())).await;
    }

    /// Run one peer connection to completion.
    async fn handle_peer(self: Arc<Self>, stream: TcpStream, addr: String) {
        let codec = LinesCodec::new_with_max_length(MAX_MESSAGE_SIZE);
        let (mut sink, mut lines) = Framed::new(stream, codec).split();

        let (tx, mut rx) = mpsc::channel::<Message>(PEER_QUEUE_DEPTH);
        self.peers.insert(&addr, tx.clone());
        info!(peer = %addr, "peer connected");

        // Writer task: the only place this peer's socket is written.
        let writer_addr = addr.clone();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let line = match serde_json::to_string(&message) {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(peer = %writer_addr, error = %e, "unencodable message");
                        continue;
                    }
                };
                if let Err(e) = sink.send(line).await {
                    debug!(peer = %writer_addr, error = %e, "write failed");
                    break;
                }
            }
        });

        // Both ends open with their version.
        let version = Message::Version(VersionPayload {
            version: self.protocol_version,
            height: self.chain.best_height(),
            network_id: self.network_id,
        });
        let _ = tx.send(version).await;
        drop(tx);

        while let Some(result) = lines.next().await {
            let line = match result {
                Ok(line) => line,
                Err(e) => {
                    debug!(peer = %addr, error = %e, "read failed");
                    break;
                }
            };
            let message: Message = match serde_json::from_str(&line) {
                Ok(message) => message,
                Err(e) => {
                    debug!(peer = %addr, error = %e, "unparseable message, skipping");
                    continue;
                }
            };
            self.handle_message(&addr, message).await;
        }

        self.peers.remove(&addr);
        info!(peer = %addr, "peer disconnected");
    }

    /// Dispatch one inbound message.
    async fn handle_message(&self, peer_addr: &str, message: Message) {
        match message {
            Message::Version(version) => {
                debug!(
                    peer = peer_addr,
                    version = version.version,
                    height = version.height,
                    network_id = version.network_id,
                    "peer version"
                );
                self.peers.set_height(peer_addr, version.height);
                self.peers
                    .send_to(peer_addr, Message::Verack(VerackPayload {}))
                    .await;

                let local_height = self.chain.best_height();
                if version.height > local_height {
                    self.peers
                        .send_to(
                            peer_addr,
                            Message::GetBlocks(GetBlocksPayload {
                                from_height: local_height + 1,
                            }),
                        )
                        .await;
                }
            }

            Message::Verack(_) => {
                // Handshake complete.
            }

            Message::GetBlocks(request) => {
                self.send_blocks(peer_addr, request.from_height).await;
            }

            Message::Block(block) => {
                // No reorgs: anything at or below the tip is stale.
                if block.header.height <= self.chain.best_height() {
                    return;
                }
                match self.chain.add_block(&block) {
                    Ok(()) => {
                        self.peers
                            .broadcast_except(Some(peer_addr), Message::Block(block))
                            .await;
                    }
                    Err(e) => {
                        warn!(peer = peer_addr, error = %e, "block rejected");
                    }
                }
            }

            Message::Tx(tx) => {
                if let Err(e) = self.chain.add_to_mempool(tx) {
                    debug!(peer = peer_addr, error = %e, "gossiped tx not admitted");
                }
            }
        }
    }

    /// Stream blocks from a height to the tip, ascending.
    async fn send_blocks(&self, peer_addr: &str, from_height: u64) {
        let blocks = match self.chain.blocks_from(from_height) {
            Ok(blocks) => blocks,
            Err(e) => {
                warn!(peer = peer_addr, error = %e, "cannot load blocks for peer");
                return;
            }
        };
        info!(
            peer = peer_addr,
            from_height,
            count = blocks.len(),
            "sending catch-up blocks"
        );
        for block in blocks {
            self.peers.send_to(peer_addr, Message::Block(block)).await;
        }
    }
}
