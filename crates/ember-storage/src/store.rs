//! Typed chain store on top of the bucket database.
//!
//! Blocks are stored as opaque serialized bytes; the chain layer owns
//! their encoding. Heights are 8-byte big-endian keys so lexicographic
//! bucket order is height order. Amounts are JSON-encoded floats.

use crate::{Bucket, Database, StorageError, StorageResult, WriteBatch};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

const META_BEST_HEIGHT: &[u8] = b"best_height";
const META_TOTAL_MINTED: &[u8] = b"total_minted";

/// Encode a height as a big-endian bucket key.
fn height_key(height: u64) -> [u8; 8] {
    height.to_be_bytes()
}

/// Decode a height key.
fn key_to_height(key: &[u8]) -> StorageResult<u64> {
    let bytes: [u8; 8] = key.try_into().map_err(|_| StorageError::Corrupt {
        key: format!("{key:?}"),
        reason: "height key is not 8 bytes".to_string(),
    })?;
    Ok(u64::from_be_bytes(bytes))
}

/// Encode an amount for storage.
fn amount_to_bytes(amount: f64) -> Vec<u8> {
    // A bare f64 always serializes.
    serde_json::to_vec(&amount).unwrap_or_default()
}

/// Decode a stored amount.
fn bytes_to_amount(key: &str, bytes: &[u8]) -> StorageResult<f64> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Every state change committed for one block.
#[derive(Debug, Default)]
pub struct BlockCommit {
    /// Block height.
    pub height: u64,
    /// Block hash, hex-encoded.
    pub hash: String,
    /// Serialized block.
    pub block_bytes: Vec<u8>,
    /// New balance for every touched address. Zero balances are kept.
    pub balances: HashMap<String, f64>,
    /// New stake record bytes per touched address; `None` deletes.
    pub stakes: HashMap<String, Option<Vec<u8>>>,
    /// Ids of every transaction in the block.
    pub txids: Vec<String>,
    /// Total minted supply after this block.
    pub total_minted: f64,
}

/// The blockchain's persistent store.
#[derive(Clone)]
pub struct ChainStore {
    db: Database,
}

impl ChainStore {
    /// Open or create the store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        Ok(Self {
            db: Database::open(path)?,
        })
    }

    /// Height of the best committed block, `None` for an empty store.
    pub fn best_height(&self) -> StorageResult<Option<u64>> {
        match self.db.get(Bucket::Meta, META_BEST_HEIGHT)? {
            Some(bytes) => Ok(Some(key_to_height(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Number of committed blocks.
    pub fn block_count(&self) -> StorageResult<u64> {
        Ok(self.best_height()?.map_or(0, |h| h + 1))
    }

    /// Whether any block has been committed.
    pub fn has_data(&self) -> StorageResult<bool> {
        Ok(self.best_height()?.is_some())
    }

    /// Serialized block at a height.
    pub fn block_by_height(&self, height: u64) -> StorageResult<Option<Vec<u8>>> {
        self.db.get(Bucket::Blocks, &height_key(height))
    }

    /// Serialized block by hash, via the hash index.
    pub fn block_by_hash(&self, hash: &str) -> StorageResult<Option<Vec<u8>>> {
        match self.db.get(Bucket::BlockHashes, hash.as_bytes())? {
            Some(height_bytes) => self.db.get(Bucket::Blocks, &height_bytes),
            None => Ok(None),
        }
    }

    /// All serialized blocks from a height to the tip, ascending.
    pub fn blocks_from(&self, start_height: u64) -> StorageResult<Vec<Vec<u8>>> {
        Ok(self
            .db
            .scan(Bucket::Blocks, Some(&height_key(start_height)))?
            .into_iter()
            .map(|(_, v)| v)
            .collect())
    }

    /// The most recent `count` serialized blocks, ascending by height.
    pub fn recent_blocks(&self, count: u64) -> StorageResult<Vec<Vec<u8>>> {
        let Some(best) = self.best_height()? else {
            return Ok(Vec::new());
        };
        let start = best.saturating_sub(count.saturating_sub(1));
        self.blocks_from(start)
    }

    /// Balance of an address, zero when absent.
    pub fn balance(&self, address: &str) -> StorageResult<f64> {
        match self.db.get(Bucket::Balances, address.as_bytes())? {
            Some(bytes) => bytes_to_amount(address, &bytes),
            None => Ok(0.0),
        }
    }

    /// Every stored balance.
    pub fn all_balances(&self) -> StorageResult<HashMap<String, f64>> {
        let mut balances = HashMap::new();
        for (key, value) in self.db.scan(Bucket::Balances, None)? {
            let address = String::from_utf8_lossy(&key).into_owned();
            let amount = bytes_to_amount(&address, &value)?;
            balances.insert(address, amount);
        }
        Ok(balances)
    }

    /// Every stored stake record, still encoded.
    pub fn all_stakes_raw(&self) -> StorageResult<HashMap<String, Vec<u8>>> {
        Ok(self
            .db
            .scan(Bucket::Stakes, None)?
            .into_iter()
            .map(|(k, v)| (String::from_utf8_lossy(&k).into_owned(), v))
            .collect())
    }

    /// Height of the block containing a transaction.
    pub fn tx_height(&self, txid: &str) -> StorageResult<Option<u64>> {
        match self.db.get(Bucket::TxIndex, txid.as_bytes())? {
            Some(bytes) => Ok(Some(key_to_height(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Total minted supply.
    pub fn total_minted(&self) -> StorageResult<f64> {
        match self.db.get(Bucket::Meta, META_TOTAL_MINTED)? {
            Some(bytes) => bytes_to_amount("total_minted", &bytes),
            None => Ok(0.0),
        }
    }

    /// Atomically commit every change for a new block.
    ///
    /// All writes land in a single batch; a crash between commits
    /// leaves the store at the previous tip with no partial state.
    pub fn commit_block(&self, commit: &BlockCommit) -> StorageResult<()> {
        let hk = height_key(commit.height);
        let mut batch =
            WriteBatch::with_capacity(4 + commit.balances.len() + commit.stakes.len() + commit.txids.len());

        batch.put(Bucket::Blocks, hk.to_vec(), commit.block_bytes.clone());
        batch.put(Bucket::BlockHashes, commit.hash.as_bytes().to_vec(), hk.to_vec());

        for (address, balance) in &commit.balances {
            batch.put(
                Bucket::Balances,
                address.as_bytes().to_vec(),
                amount_to_bytes(*balance),
            );
        }

        for (address, stake_bytes) in &commit.stakes {
            match stake_bytes {
                Some(bytes) => {
                    batch.put(Bucket::Stakes, address.as_bytes().to_vec(), bytes.clone())
                }
                None => batch.delete(Bucket::Stakes, address.as_bytes().to_vec()),
            }
        }

        for txid in &commit.txids {
            batch.put(Bucket::TxIndex, txid.as_bytes().to_vec(), hk.to_vec());
        }

        batch.put(Bucket::Meta, META_BEST_HEIGHT.to_vec(), hk.to_vec());
        batch.put(
            Bucket::Meta,
            META_TOTAL_MINTED.to_vec(),
            amount_to_bytes(commit.total_minted),
        );

        self.db.write_batch(batch)?;
        debug!(
            height = commit.height,
            hash = %commit.hash,
            txs = commit.txids.len(),
            "committed block"
        );
        Ok(())
    }
}
