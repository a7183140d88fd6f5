//! # ember-consensus
//!
//! Consensus rules for the Ember blockchain.
//!
//! This crate provides:
//! - The block and transaction data model with canonical serialization
//! - SHA-256d header hashing and merkle root construction
//! - Compact-target ("bits") arithmetic and Proof-of-Work verification
//! - Difficulty retargeting with a progressive per-epoch floor
//! - The network parameter manifest loaded from JSON

pub mod block;
mod config;
mod difficulty;
mod error;
mod pow;

pub use block::{
    compute_merkle_root, sha256d, Block, BlockHeader, Transaction, TxKind, TxOutput, ZERO_HASH_HEX,
};
pub use config::NetworkConfig;
pub use difficulty::{apply_progressive_floor, calc_next_bits, progressive_floor};
pub use error::{ConsensusError, ConsensusResult};
pub use pow::{bits_to_target, check_proof_of_work, target_to_bits};

/// Amounts smaller than this are treated as dust and pruned.
pub const DUST_THRESHOLD: f64 = 0.000_000_01;
