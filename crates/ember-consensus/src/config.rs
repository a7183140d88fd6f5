//! Network parameter manifest.
//!
//! Every deployable network (mainnet, testnet, local devnets) is
//! described by a JSON manifest. All fields are required except the
//! four late additions, which default for older manifests.

use crate::{ConsensusError, ConsensusResult};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Human-readable network name.
    pub name: String,
    /// Currency ticker symbol.
    pub ticker: String,
    /// Network identifier exchanged in the P2P handshake.
    pub network_id: u32,
    /// Hashing algorithm label (informational).
    pub algorithm: String,
    /// Consensus scheme label (informational).
    pub consensus_type: String,
    /// Target spacing between blocks in seconds.
    pub block_time_seconds: i64,
    /// Block reward before any halving.
    pub initial_reward: f64,
    /// Fraction of the reward paid to the miner.
    pub pow_reward_share: f64,
    /// Fraction of the reward distributed to stakers.
    pub pos_reward_share: f64,
    /// Blocks between reward halvings.
    pub halving_interval: u64,
    /// Hard cap on total minted supply.
    pub max_supply: f64,
    /// Blocks between difficulty retargets.
    #[serde(rename = "difficulty_adjustment_interval")]
    pub difficulty_adjust_interval: u64,
    /// Easiest allowed compact target.
    pub min_difficulty_bits: u32,
    /// Genesis timestamp, RFC 3339.
    pub genesis_timestamp: String,
    /// Message embedded in the genesis manifest.
    pub genesis_message: String,
    /// Default P2P listen port.
    pub p2p_port: u16,
    /// Default RPC/HTTP port.
    pub rpc_port: u16,
    /// Address prefix for wallets on this network.
    pub address_prefix: String,
    /// P2P protocol version.
    pub protocol_version: u32,
    /// Minimum amount for a single stake transaction.
    pub min_stake_amount: f64,
    /// Blocks a stake stays locked (informational for wallets).
    pub stake_lock_blocks: u64,
    /// Maximum serialized block size in bytes.
    #[serde(default = "default_max_block_size")]
    pub max_block_size: u64,
    /// Maximum transactions per block.
    #[serde(default = "default_max_block_transactions")]
    pub max_block_transactions: u64,
    /// Minimum total stake to participate in PoS rewards.
    #[serde(default = "default_pos_min_threshold")]
    pub pos_min_threshold: f64,
    /// Blocks per progressive-difficulty epoch.
    #[serde(default = "default_difficulty_epoch_blocks")]
    pub difficulty_epoch_blocks: u64,
}

fn default_max_block_size() -> u64 {
    8 * 1024 * 1024
}

fn default_max_block_transactions() -> u64 {
    10_000
}

fn default_pos_min_threshold() -> f64 {
    100.0
}

fn default_difficulty_epoch_blocks() -> u64 {
    500_000
}

impl NetworkConfig {
    /// Load a network configuration from a JSON manifest.
    pub fn load(path: impl AsRef<Path>) -> ConsensusResult<Self> {
        let data = std::fs::read(path)?;
        let mut cfg: NetworkConfig = serde_json::from_slice(&data)?;
        cfg.normalize();
        Ok(cfg)
    }

    /// Replace zeroed defaultable fields with their defaults. Older
    /// manifests encode "unset" as an explicit zero.
    fn normalize(&mut self) {
        if self.max_block_size == 0 {
            self.max_block_size = default_max_block_size();
        }
        if self.max_block_transactions == 0 {
            self.max_block_transactions = default_max_block_transactions();
        }
        if self.pos_min_threshold == 0.0 {
            self.pos_min_threshold = default_pos_min_threshold();
        }
        if self.difficulty_epoch_blocks == 0 {
            self.difficulty_epoch_blocks = default_difficulty_epoch_blocks();
        }
    }

    /// The genesis timestamp as Unix seconds.
    pub fn genesis_unix_timestamp(&self) -> ConsensusResult<i64> {
        DateTime::parse_from_rfc3339(&self.genesis_timestamp)
            .map(|dt| dt.timestamp())
            .map_err(|_| ConsensusError::InvalidTimestamp(self.genesis_timestamp.clone()))
    }
}
