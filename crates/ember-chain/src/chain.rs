//! The chain state machine.
//!
//! One `Chain` owns the persistent store, the stake ledger, and the
//! mutable in-memory state (balances, mempool, minted supply, tip)
//! behind a single reader/writer lock. Template construction takes the
//! read guard; mempool admission and block application take the write
//! guard. Block application stages every change in a delta, commits
//! the store batch, and only then swaps the delta into memory, so a
//! failed commit leaves the node exactly at the previous tip.

use crate::migrate::migrate_legacy_json;
use crate::{create_genesis_block, ChainError, ChainResult, Mempool, Stake, StakeLedger};
use ember_consensus::{
    apply_progressive_floor, bits_to_target, calc_next_bits, check_proof_of_work,
    compute_merkle_root, progressive_floor, Block, BlockHeader, NetworkConfig, Transaction, TxKind,
    DUST_THRESHOLD, ZERO_HASH_HEX,
};
use ember_storage::{BlockCommit, ChainStore};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

/// Mutable chain state guarded by the chain lock.
struct ChainState {
    balances: HashMap<String, f64>,
    mempool: Mempool,
    total_minted: f64,
    tip: Option<Block>,
}

/// The blockchain.
pub struct Chain {
    config: NetworkConfig,
    store: ChainStore,
    stakes: StakeLedger,
    state: RwLock<ChainState>,
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

fn decode_block(bytes: &[u8]) -> ChainResult<Block> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Current value of an address in the staged view, falling back to the
/// live balance map.
fn staged_balance(
    live: &HashMap<String, f64>,
    staged: &HashMap<String, f64>,
    address: &str,
) -> f64 {
    staged
        .get(address)
        .or_else(|| live.get(address))
        .copied()
        .unwrap_or(0.0)
}

impl Chain {
    /// Open or create the chain under a data directory.
    ///
    /// An empty store is seeded from a legacy `blockchain.json` if one
    /// exists, otherwise from the deterministic genesis block.
    pub fn open(config: NetworkConfig, data_dir: impl AsRef<Path>) -> ChainResult<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;
        let store = ChainStore::open(data_dir.join("blockchain.db"))?;

        let stakes = StakeLedger::new();
        let mut state = ChainState {
            balances: HashMap::new(),
            mempool: Mempool::new(),
            total_minted: 0.0,
            tip: None,
        };

        if !store.has_data()? {
            if let Some(legacy) = migrate_legacy_json(data_dir, &store)? {
                state.balances = legacy.balances;
                state.total_minted = legacy.total_minted;
                stakes.load(legacy.stakes);
                state.tip = legacy.blocks.into_iter().last();
                info!("chain state migrated from legacy JSON");
            } else {
                let genesis = create_genesis_block(&config);
                let commit = BlockCommit {
                    height: 0,
                    hash: genesis.hash.clone(),
                    block_bytes: serde_json::to_vec(&genesis)?,
                    txids: genesis.transactions.iter().map(|tx| tx.txid.clone()).collect(),
                    ..Default::default()
                };
                store.commit_block(&commit)?;
                info!(hash = %genesis.hash, "created genesis block");
                state.tip = Some(genesis);
            }
        } else {
            state.balances = store.all_balances()?;
            state.total_minted = store.total_minted()?;

            let mut loaded = HashMap::new();
            for (address, raw) in store.all_stakes_raw()? {
                let stake: Stake = serde_json::from_slice(&raw)?;
                loaded.insert(address, stake);
            }
            stakes.load(loaded);

            let best = store.best_height()?.unwrap_or(0);
            state.tip = match store.block_by_height(best)? {
                Some(bytes) => Some(decode_block(&bytes)?),
                None => None,
            };
            info!(
                blocks = best + 1,
                minted = state.total_minted,
                max_supply = config.max_supply,
                "loaded chain from store"
            );
        }

        Ok(Self {
            config,
            store,
            stakes,
            state: RwLock::new(state),
        })
    }

    /// The network configuration this chain runs under.
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Height of the tip block.
    pub fn best_height(&self) -> u64 {
        self.state
            .read()
            .tip
            .as_ref()
            .map_or(0, |b| b.header.height)
    }

    /// Number of committed blocks.
    pub fn block_count(&self) -> u64 {
        self.state
            .read()
            .tip
            .as_ref()
            .map_or(0, |b| b.header.height + 1)
    }

    /// A copy of the tip block.
    pub fn best_block(&self) -> Option<Block> {
        self.state.read().tip.clone()
    }

    /// Block at a height.
    pub fn block_by_height(&self, height: u64) -> ChainResult<Option<Block>> {
        let _guard = self.state.read();
        match self.store.block_by_height(height)? {
            Some(bytes) => Ok(Some(decode_block(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Block by hash.
    pub fn block_by_hash(&self, hash: &str) -> ChainResult<Option<Block>> {
        let _guard = self.state.read();
        match self.store.block_by_hash(hash)? {
            Some(bytes) => Ok(Some(decode_block(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All blocks from a height to the tip, ascending.
    pub fn blocks_from(&self, start_height: u64) -> ChainResult<Vec<Block>> {
        let _guard = self.state.read();
        self.store
            .blocks_from(start_height)?
            .iter()
            .map(|bytes| decode_block(bytes))
            .collect()
    }

    /// Balance of an address.
    pub fn balance(&self, address: &str) -> f64 {
        self.state
            .read()
            .balances
            .get(address)
            .copied()
            .unwrap_or(0.0)
    }

    /// Staked amount for an address.
    pub fn staked_of(&self, address: &str) -> f64 {
        self.stakes.of(address)
    }

    /// Total staked across all addresses.
    pub fn total_staked(&self) -> f64 {
        self.stakes.total()
    }

    /// A copy of all pending transactions.
    pub fn mempool(&self) -> Vec<Transaction> {
        self.state.read().mempool.snapshot()
    }

    /// Number of pending transactions.
    pub fn mempool_len(&self) -> usize {
        self.state.read().mempool.len()
    }

    /// Total minted supply.
    pub fn total_minted(&self) -> f64 {
        self.state.read().total_minted
    }

    /// Height of the block containing a transaction.
    pub fn tx_height(&self, txid: &str) -> ChainResult<Option<u64>> {
        let _guard = self.state.read();
        Ok(self.store.tx_height(txid)?)
    }

    /// Every committed transaction touching an address, in chain order.
    pub fn transactions_for(&self, address: &str) -> ChainResult<Vec<Transaction>> {
        let blocks = self.blocks_from(0)?;
        let mut result = Vec::new();
        for block in blocks {
            for tx in block.transactions {
                let touches = tx.from.as_deref() == Some(address)
                    || tx.to.as_deref() == Some(address)
                    || tx.outputs.iter().any(|out| out.address == address);
                if touches {
                    result.push(tx);
                }
            }
        }
        Ok(result)
    }

    /// The block reward due at a height given the current supply.
    pub fn block_reward(&self, height: u64) -> f64 {
        self.reward_at(height, self.state.read().total_minted)
    }

    fn reward_at(&self, height: u64, total_minted: f64) -> f64 {
        if total_minted >= self.config.max_supply {
            return 0.0;
        }
        let halvings = if self.config.halving_interval == 0 {
            0
        } else {
            height / self.config.halving_interval
        };
        let mut reward = self.config.initial_reward;
        for _ in 0..halvings {
            reward /= 2.0;
        }
        if reward < DUST_THRESHOLD {
            return 0.0;
        }
        reward.min(self.config.max_supply - total_minted)
    }

    /// Validate and admit a transaction to the mempool.
    ///
    /// No signature check happens here; signatures travel with
    /// transactions but are outside the consensus rule.
    pub fn add_to_mempool(&self, tx: Transaction) -> ChainResult<()> {
        let mut state = self.state.write();

        match tx.kind {
            TxKind::Transfer => {
                let from = tx.from.as_deref().unwrap_or("");
                let have = state.balances.get(from).copied().unwrap_or(0.0);
                let need = tx.amount + tx.fee;
                if have < need {
                    return Err(ChainError::InsufficientBalance { have, need });
                }
            }
            TxKind::Stake => {
                let from = tx.from.as_deref().unwrap_or("");
                let balance = state.balances.get(from).copied().unwrap_or(0.0);
                let staked = self.stakes.of(from);
                if balance - staked < tx.amount {
                    return Err(ChainError::InsufficientAvailableBalance);
                }
                if tx.amount < self.config.min_stake_amount {
                    return Err(ChainError::BelowMinStake {
                        min: self.config.min_stake_amount,
                    });
                }
                if staked + tx.amount < self.config.pos_min_threshold {
                    return Err(ChainError::BelowPosThreshold {
                        threshold: self.config.pos_min_threshold,
                    });
                }
            }
            // Unstake settles against the ledger at application time;
            // coinbase and pos_reward are template-only in practice.
            TxKind::Unstake | TxKind::Coinbase | TxKind::PosReward => {}
        }

        state.mempool.push(tx);
        Ok(())
    }

    /// Build an unsolved block template for a miner.
    pub fn create_template(&self, miner_address: &str) -> ChainResult<Block> {
        let state = self.state.read();

        let (prev_hash, prev_bits, height) = match &state.tip {
            Some(tip) => (tip.hash.clone(), tip.header.bits, tip.header.height + 1),
            None => (
                ZERO_HASH_HEX.to_string(),
                self.config.min_difficulty_bits,
                0,
            ),
        };

        let total_reward = self.reward_at(height, state.total_minted);
        let pow_reward = total_reward * self.config.pow_reward_share;
        let pos_reward = total_reward * self.config.pos_reward_share;

        let now = now_unix();
        let mut txs = Vec::new();
        let pos_outputs = self
            .stakes
            .reward_distribution(pos_reward, self.config.pos_min_threshold);
        if pos_outputs.is_empty() {
            txs.push(Transaction::coinbase(miner_address, total_reward, now));
        } else {
            txs.push(Transaction::coinbase(miner_address, pow_reward, now));
            txs.push(Transaction::pos_reward(pos_reward, pos_outputs, now));
        }

        let room = (self.config.max_block_transactions as usize).saturating_sub(txs.len());
        txs.extend(state.mempool.first(room));

        let mut bits = prev_bits;
        let interval = self.config.difficulty_adjust_interval;
        if height > 0 && interval > 0 && height % interval == 0 {
            bits = self.retarget_bits(prev_bits)?;
        }
        bits = apply_progressive_floor(
            bits,
            height,
            self.config.difficulty_epoch_blocks,
            self.config.min_difficulty_bits,
        );

        let merkle_root = compute_merkle_root(&txs);
        let header = BlockHeader {
            version: 2,
            prev_hash,
            merkle_root,
            timestamp: now,
            bits,
            nonce: 0,
            height,
        };

        Ok(Block {
            header,
            transactions: txs,
            hash: String::new(),
        })
    }

    /// Recompute bits from the last adjustment window.
    fn retarget_bits(&self, fallback: u32) -> ChainResult<u32> {
        let interval = self.config.difficulty_adjust_interval;
        let raw = self.store.recent_blocks(interval)?;
        if (raw.len() as u64) < interval {
            return Ok(fallback);
        }
        let blocks: Vec<Block> = raw
            .iter()
            .map(|bytes| decode_block(bytes))
            .collect::<ChainResult<_>>()?;
        Ok(calc_next_bits(
            &blocks,
            interval,
            self.config.block_time_seconds,
            self.config.min_difficulty_bits,
        ))
    }

    /// Validate a block and apply it as the new tip.
    ///
    /// Called for both miner submissions and peer-received blocks. All
    /// state changes are staged, committed to the store in one batch,
    /// and only then made visible.
    pub fn add_block(&self, block: &Block) -> ChainResult<()> {
        let mut state = self.state.write();

        self.validate_block(&state, block)?;

        let mut staged_balances: HashMap<String, f64> = HashMap::new();
        let mut staged_stakes: HashMap<String, Option<Stake>> = HashMap::new();
        let mut minted = 0.0;

        for tx in &block.transactions {
            match tx.kind {
                TxKind::Coinbase | TxKind::PosReward => {
                    for out in &tx.outputs {
                        let new = staged_balance(&state.balances, &staged_balances, &out.address)
                            + out.amount;
                        staged_balances.insert(out.address.clone(), new);
                        minted += out.amount;
                    }
                }
                TxKind::Transfer => {
                    let from = tx.from.as_deref().unwrap_or("");
                    let to = tx.to.as_deref().unwrap_or("");
                    let have = staged_balance(&state.balances, &staged_balances, from);
                    let need = tx.amount + tx.fee;
                    if have < need {
                        return Err(ChainError::InsufficientBalance { have, need });
                    }
                    staged_balances.insert(from.to_string(), have - need);
                    let to_balance = staged_balance(&state.balances, &staged_balances, to);
                    staged_balances.insert(to.to_string(), to_balance + tx.amount);
                }
                TxKind::Stake => {
                    let from = tx.from.as_deref().unwrap_or("");
                    let have = staged_balance(&state.balances, &staged_balances, from);
                    if have < tx.amount {
                        return Err(ChainError::InsufficientBalance {
                            have,
                            need: tx.amount,
                        });
                    }
                    staged_balances.insert(from.to_string(), have - tx.amount);

                    let entry = match staged_stakes.get(from) {
                        Some(staged) => staged.clone(),
                        None => self.stakes.entry(from),
                    };
                    let entry = match entry {
                        Some(mut stake) => {
                            stake.amount += tx.amount;
                            stake
                        }
                        None => Stake {
                            address: from.to_string(),
                            amount: tx.amount,
                            block_height: block.header.height,
                        },
                    };
                    staged_stakes.insert(from.to_string(), Some(entry));
                }
                TxKind::Unstake => {
                    let from = tx.from.as_deref().unwrap_or("");
                    let entry = match staged_stakes.get(from) {
                        Some(staged) => staged.clone(),
                        None => self.stakes.entry(from),
                    };
                    // An unstake that the ledger cannot honor poisons
                    // the whole block; applying it anyway would mint
                    // balance out of nothing.
                    let mut stake = entry.ok_or_else(|| ChainError::NoStake(from.to_string()))?;
                    if stake.amount < tx.amount {
                        return Err(ChainError::InsufficientStake {
                            have: stake.amount,
                            want: tx.amount,
                        });
                    }
                    stake.amount -= tx.amount;
                    let next = (stake.amount >= DUST_THRESHOLD).then_some(stake);
                    staged_stakes.insert(from.to_string(), next);

                    let balance = staged_balance(&state.balances, &staged_balances, from);
                    staged_balances.insert(from.to_string(), balance + tx.amount);
                }
            }
        }

        let allowed = self.reward_at(block.header.height, state.total_minted);
        if minted > allowed + DUST_THRESHOLD {
            return Err(ChainError::ExcessiveMint { minted, allowed });
        }
        let new_total_minted = state.total_minted + minted;

        let mut commit = BlockCommit {
            height: block.header.height,
            hash: block.hash.clone(),
            block_bytes: serde_json::to_vec(block)?,
            balances: staged_balances.clone(),
            txids: block.transactions.iter().map(|tx| tx.txid.clone()).collect(),
            total_minted: new_total_minted,
            ..Default::default()
        };
        for (address, entry) in &staged_stakes {
            let bytes = match entry {
                Some(stake) => Some(serde_json::to_vec(stake)?),
                None => None,
            };
            commit.stakes.insert(address.clone(), bytes);
        }

        // Durability first; memory only changes once the batch landed.
        self.store.commit_block(&commit)?;

        for (address, balance) in staged_balances {
            state.balances.insert(address, balance);
        }
        for (address, entry) in staged_stakes {
            self.stakes.set(&address, entry);
        }
        state.total_minted = new_total_minted;

        let included: HashSet<String> = commit.txids.iter().cloned().collect();
        state.mempool.remove_included(&included);
        state.tip = Some(block.clone());

        info!(
            height = block.header.height,
            hash = %block.hash,
            txs = block.transactions.len(),
            minted,
            total_minted = state.total_minted,
            "block added"
        );
        Ok(())
    }

    fn validate_block(&self, state: &ChainState, block: &Block) -> ChainResult<()> {
        let expected = state.tip.as_ref().map_or(0, |tip| tip.header.height + 1);
        if block.header.height != expected {
            return Err(ChainError::BadHeight {
                expected,
                got: block.header.height,
            });
        }
        if let Some(tip) = &state.tip {
            if expected > 0 && block.header.prev_hash != tip.hash {
                return Err(ChainError::BadPrevHash);
            }
        }

        let computed = block.header.compute_hash();
        if block.hash != computed {
            return Err(ChainError::BadHash {
                computed,
                got: block.hash.clone(),
            });
        }
        if !check_proof_of_work(&block.hash, block.header.bits) {
            return Err(ChainError::InsufficientPow);
        }

        if block.transactions.len() as u64 > self.config.max_block_transactions {
            return Err(ChainError::TooManyTransactions {
                count: block.transactions.len(),
                max: self.config.max_block_transactions,
            });
        }
        let size = serde_json::to_vec(block)?.len();
        if size as u64 > self.config.max_block_size {
            return Err(ChainError::BlockTooLarge {
                size,
                max: self.config.max_block_size,
            });
        }

        let floor_bits = progressive_floor(
            block.header.height,
            self.config.difficulty_epoch_blocks,
            self.config.min_difficulty_bits,
        );
        if bits_to_target(block.header.bits) > bits_to_target(floor_bits) {
            warn!(
                height = block.header.height,
                bits = block.header.bits,
                floor = floor_bits,
                "block target above progressive floor"
            );
            return Err(ChainError::BelowDifficultyFloor(block.header.height));
        }

        Ok(())
    }
}
