//! Store commit and crash-consistency tests.

use crate::harness::{solve, testnet_config, TestChain};
use ember_consensus::Transaction;
use ember_storage::{BlockCommit, ChainStore};
use std::collections::HashMap;
use tempfile::TempDir;

#[test]
fn chain_state_survives_reopen() {
    let node = TestChain::new();
    node.mine_blocks("alice", 2);
    node.chain
        .add_to_mempool(Transaction::transfer("alice", "bob", 7.0, 0.001, None, 1))
        .unwrap();
    node.mine_block("miner");
    let tip = node.chain.best_block().unwrap();

    let node = node.reopen();
    assert_eq!(node.chain.best_height(), 3);
    assert_eq!(node.chain.best_block().unwrap().hash, tip.hash);
    assert_eq!(node.chain.balance("bob"), 7.0);
    assert!((node.chain.total_minted() - 150.0).abs() < 1e-9);
    // The mempool is volatile by design.
    assert_eq!(node.chain.mempool_len(), 0);
}

#[test]
fn stakes_survive_reopen() {
    let node = TestChain::new();
    node.mine_blocks("alice", 2);
    node.chain
        .add_to_mempool(Transaction::staking(
            ember_consensus::TxKind::Stake,
            "alice",
            25.0,
            1,
        ))
        .unwrap();
    node.mine_block("miner");

    let node = node.reopen();
    assert_eq!(node.chain.staked_of("alice"), 25.0);
    assert_eq!(node.chain.total_staked(), 25.0);
}

#[test]
fn interrupted_commit_leaves_previous_tip() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("blockchain.db");

    {
        let store = ChainStore::open(&db_path).unwrap();
        store
            .commit_block(&BlockCommit {
                height: 0,
                hash: "genesis".to_string(),
                block_bytes: b"genesis-block".to_vec(),
                balances: HashMap::new(),
                stakes: HashMap::new(),
                txids: vec!["coinbase-0".to_string()],
                total_minted: 0.0,
            })
            .unwrap();

        // Height 1 is fully prepared but the process dies before the
        // transaction is written. Because the commit is one atomic
        // batch, "half-written" states cannot exist: either all of it
        // lands or none of it does.
        let _never_written = BlockCommit {
            height: 1,
            hash: "block-1".to_string(),
            block_bytes: b"block-1".to_vec(),
            balances: HashMap::from([("miner".to_string(), 50.0)]),
            stakes: HashMap::new(),
            txids: vec!["coinbase-1".to_string()],
            total_minted: 50.0,
        };
    }

    let store = ChainStore::open(&db_path).unwrap();
    assert_eq!(store.best_height().unwrap(), Some(0));
    // Neither lookup path knows about height 1.
    assert_eq!(store.block_by_height(1).unwrap(), None);
    assert_eq!(store.block_by_hash("block-1").unwrap(), None);
    assert_eq!(store.tx_height("coinbase-1").unwrap(), None);
    assert_eq!(store.balance("miner").unwrap(), 0.0);
    assert_eq!(store.total_minted().unwrap(), 0.0);
}

#[test]
fn legacy_json_chain_is_migrated_on_first_open() {
    use ember_chain::Chain;

    // Build a real one-block chain, then reshape its contents as the
    // legacy single-file format in a fresh directory.
    let source = TestChain::new();
    source.mine_block("alice");
    let blocks = source.chain.blocks_from(0).unwrap();

    let legacy_dir = TempDir::new().unwrap();
    let legacy = serde_json::json!({
        "blocks": blocks,
        "balances": { "alice": 50.0 },
        "stakes": {},
        "total_minted": 50.0
    });
    std::fs::write(
        legacy_dir.path().join("blockchain.json"),
        serde_json::to_vec(&legacy).unwrap(),
    )
    .unwrap();

    let chain = Chain::open(testnet_config(), legacy_dir.path()).unwrap();
    assert_eq!(chain.best_height(), 1);
    assert_eq!(chain.balance("alice"), 50.0);
    assert_eq!(chain.total_minted(), 50.0);
    assert_eq!(chain.best_block().unwrap().hash, blocks[1].hash);

    assert!(!legacy_dir.path().join("blockchain.json").exists());
    assert!(legacy_dir.path().join("blockchain.json.migrated").exists());

    // A second open must not re-migrate.
    drop(chain);
    let chain = Chain::open(testnet_config(), legacy_dir.path()).unwrap();
    assert_eq!(chain.best_height(), 1);
}

#[test]
fn block_lookups_agree_between_paths() {
    let node = TestChain::new();
    let mined = node.mine_block("miner");

    let by_height = node.chain.block_by_height(1).unwrap().unwrap();
    let by_hash = node.chain.block_by_hash(&mined.hash).unwrap().unwrap();
    assert_eq!(by_height, by_hash);
    assert_eq!(by_height.hash, mined.hash);

    assert!(node.chain.block_by_height(99).unwrap().is_none());
    assert!(node.chain.block_by_hash("no-such-hash").unwrap().is_none());

    // Solving twice from the same template gives the same block.
    let template = node.chain.create_template("miner").unwrap();
    assert_eq!(solve(template.clone()).hash, solve(template).hash);
}
