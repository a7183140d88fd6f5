//! The stake ledger.
//!
//! Tracks per-address staked amounts with the height of first staking.
//! The ledger carries its own lock so read-side queries (totals,
//! reward distribution) never contend with chain readers, but it is
//! only ever mutated while the chain write lock is held.

use crate::{ChainError, ChainResult};
use ember_consensus::{TxOutput, DUST_THRESHOLD};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single address's stake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stake {
    /// Staking address.
    pub address: String,
    /// Staked amount.
    pub amount: f64,
    /// Height at which the address first staked.
    pub block_height: u64,
}

/// All active stakes.
#[derive(Debug, Default)]
pub struct StakeLedger {
    stakes: RwLock<HashMap<String, Stake>>,
}

impl StakeLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the ledger contents, used when loading from the store.
    pub fn load(&self, stakes: HashMap<String, Stake>) {
        *self.stakes.write() = stakes;
    }

    /// Add to (or create) an address's stake.
    pub fn add(&self, address: &str, amount: f64, height: u64) {
        let mut stakes = self.stakes.write();
        match stakes.get_mut(address) {
            Some(stake) => stake.amount += amount,
            None => {
                stakes.insert(
                    address.to_string(),
                    Stake {
                        address: address.to_string(),
                        amount,
                        block_height: height,
                    },
                );
            }
        }
    }

    /// Remove from an address's stake, pruning dust remainders.
    pub fn remove(&self, address: &str, amount: f64) -> ChainResult<()> {
        let mut stakes = self.stakes.write();
        let stake = stakes
            .get_mut(address)
            .ok_or_else(|| ChainError::NoStake(address.to_string()))?;
        if stake.amount < amount {
            return Err(ChainError::InsufficientStake {
                have: stake.amount,
                want: amount,
            });
        }
        stake.amount -= amount;
        if stake.amount < DUST_THRESHOLD {
            stakes.remove(address);
        }
        Ok(())
    }

    /// Overwrite or delete a single entry, used when swapping in a
    /// committed block's staged changes.
    pub fn set(&self, address: &str, entry: Option<Stake>) {
        let mut stakes = self.stakes.write();
        match entry {
            Some(stake) => {
                stakes.insert(address.to_string(), stake);
            }
            None => {
                stakes.remove(address);
            }
        }
    }

    /// Total staked across all addresses.
    pub fn total(&self) -> f64 {
        self.stakes.read().values().map(|s| s.amount).sum()
    }

    /// Staked amount for an address, zero when absent.
    pub fn of(&self, address: &str) -> f64 {
        self.stakes.read().get(address).map_or(0.0, |s| s.amount)
    }

    /// A copy of the stake entry for an address.
    pub fn entry(&self, address: &str) -> Option<Stake> {
        self.stakes.read().get(address).cloned()
    }

    /// Distribute a reward proportionally among stakers at or above
    /// the threshold. Shares below the dust floor are dropped; with no
    /// eligible staker the distribution is empty.
    ///
    /// Outputs are sorted by address so an identical ledger always
    /// produces an identical distribution.
    pub fn reward_distribution(&self, total_reward: f64, min_threshold: f64) -> Vec<TxOutput> {
        let stakes = self.stakes.read();

        let eligible: f64 = stakes
            .values()
            .filter(|s| s.amount >= min_threshold)
            .map(|s| s.amount)
            .sum();
        if eligible == 0.0 {
            return Vec::new();
        }

        let mut outputs: Vec<TxOutput> = stakes
            .values()
            .filter(|s| s.amount >= min_threshold)
            .filter_map(|s| {
                let reward = total_reward * (s.amount / eligible);
                (reward > DUST_THRESHOLD).then(|| TxOutput {
                    address: s.address.clone(),
                    amount: reward,
                })
            })
            .collect();
        outputs.sort_by(|a, b| a.address.cmp(&b.address));
        outputs
    }
}
