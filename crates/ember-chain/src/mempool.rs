//! Pending transaction queue.
//!
//! Admission order is preserved into templates; the protocol has a
//! flat fee, so there is no priority ordering to maintain.

use ember_consensus::Transaction;
use std::collections::HashSet;

/// Submission-ordered pending transactions.
#[derive(Debug, Default)]
pub struct Mempool {
    txs: Vec<Transaction>,
}

impl Mempool {
    /// Create an empty mempool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an admitted transaction.
    pub fn push(&mut self, tx: Transaction) {
        self.txs.push(tx);
    }

    /// Number of pending transactions.
    pub fn len(&self) -> usize {
        self.txs.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    /// A copy of all pending transactions in admission order.
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.txs.clone()
    }

    /// The first `count` pending transactions in admission order.
    pub fn first(&self, count: usize) -> Vec<Transaction> {
        self.txs.iter().take(count).cloned().collect()
    }

    /// Drop every transaction whose id appears in `included`.
    pub fn remove_included(&mut self, included: &HashSet<String>) {
        self.txs.retain(|tx| !included.contains(&tx.txid));
    }
}
