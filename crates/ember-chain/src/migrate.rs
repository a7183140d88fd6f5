//! Legacy JSON chain import.
//!
//! Early deployments persisted the whole chain as one `blockchain.json`
//! file. When the store is empty and that file is present, its blocks
//! are imported one commit at a time (full state rides on the final
//! commit) and the file is renamed with a `.migrated` suffix.

use crate::{ChainResult, Stake};
use ember_consensus::Block;
use ember_storage::{BlockCommit, ChainStore};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// The legacy on-disk chain format.
#[derive(Debug, Deserialize)]
pub(crate) struct LegacyChainData {
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub balances: HashMap<String, f64>,
    #[serde(default)]
    pub stakes: HashMap<String, Stake>,
    #[serde(default)]
    pub total_minted: f64,
}

/// Import a legacy `blockchain.json` into the store.
///
/// Returns the parsed legacy state when migration ran, `None` when
/// there was nothing to migrate.
pub(crate) fn migrate_legacy_json(
    data_dir: &Path,
    store: &ChainStore,
) -> ChainResult<Option<LegacyChainData>> {
    let json_path = data_dir.join("blockchain.json");
    let raw = match std::fs::read(&json_path) {
        Ok(raw) => raw,
        Err(_) => return Ok(None),
    };

    let data: LegacyChainData = match serde_json::from_slice(&raw) {
        Ok(data) => data,
        Err(e) => {
            warn!(path = %json_path.display(), error = %e, "legacy chain file unreadable, ignoring");
            return Ok(None);
        }
    };
    if data.blocks.is_empty() {
        return Ok(None);
    }

    info!(blocks = data.blocks.len(), "migrating legacy JSON chain");

    let last = data.blocks.len() - 1;
    for (i, block) in data.blocks.iter().enumerate() {
        let mut commit = BlockCommit {
            height: block.header.height,
            hash: block.hash.clone(),
            block_bytes: serde_json::to_vec(block)?,
            txids: block.transactions.iter().map(|tx| tx.txid.clone()).collect(),
            ..Default::default()
        };
        // State only needs to be durable once, with the tip.
        if i == last {
            commit.balances = data.balances.clone();
            commit.total_minted = data.total_minted;
            for (address, stake) in &data.stakes {
                commit
                    .stakes
                    .insert(address.clone(), Some(serde_json::to_vec(stake)?));
            }
        }
        store.commit_block(&commit)?;
    }

    let backup = json_path.with_extension("json.migrated");
    std::fs::rename(&json_path, &backup)?;
    info!(backup = %backup.display(), "legacy chain file renamed");

    Ok(Some(data))
}
