//! P2P wire messages.
//!
//! Every message is one JSON object per line, shaped as
//! `{"type": ..., "payload": ...}`. Both ends send `version`
//! immediately after connecting; `verack` acknowledges it, `getblocks`
//! asks for catch-up, and `block`/`tx` carry gossip.

use ember_consensus::{Block, Transaction};
use serde::{Deserialize, Serialize};

/// Maximum size of a single wire message in bytes.
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Handshake payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionPayload {
    /// Protocol version.
    pub version: u32,
    /// Sender's best block height.
    pub height: u64,
    /// Network identifier; mismatched peers talk past each other.
    pub network_id: u32,
}

/// Empty `verack` payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerackPayload {}

/// Request for contiguous blocks starting at a height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBlocksPayload {
    /// First height wanted.
    pub from_height: u64,
}

/// A P2P message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum Message {
    /// Handshake, sent first by both ends.
    Version(VersionPayload),
    /// Handshake acknowledgement.
    Verack(VerackPayload),
    /// Block catch-up request.
    GetBlocks(GetBlocksPayload),
    /// Single block delivery.
    Block(Block),
    /// Mempool gossip.
    Tx(Transaction),
}

impl Message {
    /// The wire tag, for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::Version(_) => "version",
            Message::Verack(_) => "verack",
            Message::GetBlocks(_) => "getblocks",
            Message::Block(_) => "block",
            Message::Tx(_) => "tx",
        }
    }
}
