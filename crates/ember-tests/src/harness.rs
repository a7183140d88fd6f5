//! Test harness: testnet parameters, temp-dir chains, and a nonce
//! search helper standing in for the external miner.

use ember_chain::Chain;
use ember_consensus::{check_proof_of_work, Block, NetworkConfig};
use std::sync::Arc;
use tempfile::TempDir;

/// Testnet parameters: one-minute blocks, 10-block retargets, halving
/// every 100 blocks, easy minimum difficulty.
pub fn testnet_config() -> NetworkConfig {
    serde_json::from_str(
        r#"{
            "name": "Ember Testnet",
            "ticker": "tEMB",
            "network_id": 2,
            "algorithm": "sha256d",
            "consensus_type": "pow+pos",
            "block_time_seconds": 60,
            "initial_reward": 50.0,
            "pow_reward_share": 0.6,
            "pos_reward_share": 0.4,
            "halving_interval": 100,
            "max_supply": 1000000.0,
            "difficulty_adjustment_interval": 10,
            "min_difficulty_bits": 520159231,
            "genesis_timestamp": "2026-02-24T00:00:00Z",
            "genesis_message": "ember testnet",
            "p2p_port": 18433,
            "rpc_port": 18432,
            "address_prefix": "te",
            "protocol_version": 1,
            "min_stake_amount": 1.0,
            "stake_lock_blocks": 10,
            "pos_min_threshold": 10.0,
            "difficulty_epoch_blocks": 1000
        }"#,
    )
    .expect("testnet config parses")
}

/// Search the nonce space until the header satisfies its own target.
/// The external miner's entire job, inlined for tests.
pub fn solve(mut block: Block) -> Block {
    loop {
        let hash = block.header.compute_hash();
        if check_proof_of_work(&hash, block.header.bits) {
            block.hash = hash;
            return block;
        }
        block.header.nonce += 1;
    }
}

/// A chain in a temporary data directory.
pub struct TestChain {
    /// The chain under test.
    pub chain: Arc<Chain>,
    dir: TempDir,
}

impl TestChain {
    /// Bootstrap a fresh testnet chain.
    pub fn new() -> Self {
        Self::with_config(testnet_config())
    }

    /// Bootstrap a chain with custom parameters.
    pub fn with_config(config: NetworkConfig) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let chain = Arc::new(Chain::open(config, dir.path()).expect("chain opens"));
        Self { chain, dir }
    }

    /// The chain's data directory.
    pub fn data_dir(&self) -> &std::path::Path {
        self.dir.path()
    }

    /// Reopen the chain from the same data directory.
    pub fn reopen(self) -> Self {
        let Self { chain, dir } = self;
        drop(chain);
        let chain = Arc::new(Chain::open(testnet_config(), dir.path()).expect("chain reopens"));
        Self { chain, dir }
    }

    /// Build a template, solve it, and apply it.
    pub fn mine_block(&self, miner: &str) -> Block {
        let template = self.chain.create_template(miner).expect("template");
        let block = solve(template);
        self.chain.add_block(&block).expect("block applies");
        block
    }

    /// Mine `count` blocks to the same miner.
    pub fn mine_blocks(&self, miner: &str, count: usize) -> Vec<Block> {
        (0..count).map(|_| self.mine_block(miner)).collect()
    }
}

impl Default for TestChain {
    fn default() -> Self {
        Self::new()
    }
}
