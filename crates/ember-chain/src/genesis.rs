//! Deterministic genesis construction.

use ember_consensus::{
    compute_merkle_root, Block, BlockHeader, NetworkConfig, Transaction, TxKind, TxOutput,
    ZERO_HASH_HEX,
};

/// Build the genesis block for a network.
///
/// Every field is derived from the manifest, so two nodes configured
/// for the same network always agree on the genesis hash.
pub fn create_genesis_block(config: &NetworkConfig) -> Block {
    let timestamp = config.genesis_unix_timestamp().unwrap_or_default();

    let mut coinbase = Transaction {
        txid: String::new(),
        kind: TxKind::Coinbase,
        from: None,
        to: Some("genesis".to_string()),
        amount: 0.0,
        fee: 0.0,
        timestamp,
        signature: None,
        outputs: vec![TxOutput {
            address: "genesis".to_string(),
            amount: 0.0,
        }],
    };
    coinbase.txid = coinbase.compute_txid();

    let merkle_root = compute_merkle_root(std::slice::from_ref(&coinbase));

    let header = BlockHeader {
        version: 1,
        prev_hash: ZERO_HASH_HEX.to_string(),
        merkle_root,
        timestamp,
        bits: config.min_difficulty_bits,
        nonce: 0,
        height: 0,
    };
    let hash = header.compute_hash();

    Block {
        header,
        transactions: vec![coinbase],
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn testnet() -> NetworkConfig {
        serde_json::from_str(
            r#"{
                "name": "Ember Testnet", "ticker": "EMB", "network_id": 2,
                "algorithm": "sha256d", "consensus_type": "pow+pos",
                "block_time_seconds": 60, "initial_reward": 50.0,
                "pow_reward_share": 0.6, "pos_reward_share": 0.4,
                "halving_interval": 100, "max_supply": 1000000.0,
                "difficulty_adjustment_interval": 10,
                "min_difficulty_bits": 520159231,
                "genesis_timestamp": "2026-02-24T00:00:00Z",
                "genesis_message": "ember rises",
                "p2p_port": 18333, "rpc_port": 18332, "address_prefix": "te",
                "protocol_version": 1, "min_stake_amount": 1.0,
                "stake_lock_blocks": 10
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn genesis_is_deterministic() {
        let a = create_genesis_block(&testnet());
        let b = create_genesis_block(&testnet());
        assert_eq!(a, b);
        assert_eq!(a.hash, a.header.compute_hash());
    }

    #[test]
    fn genesis_shape() {
        let genesis = create_genesis_block(&testnet());
        assert_eq!(genesis.header.height, 0);
        assert_eq!(genesis.header.version, 1);
        assert_eq!(genesis.header.nonce, 0);
        assert_eq!(genesis.header.prev_hash, ZERO_HASH_HEX);
        assert_eq!(genesis.header.bits, 0x1f00ffff);
        assert_eq!(genesis.header.timestamp, 1_771_891_200);
        assert_eq!(genesis.transactions.len(), 1);

        let coinbase = &genesis.transactions[0];
        assert_eq!(coinbase.kind, TxKind::Coinbase);
        assert_eq!(coinbase.to.as_deref(), Some("genesis"));
        assert_eq!(coinbase.amount, 0.0);
    }
}
