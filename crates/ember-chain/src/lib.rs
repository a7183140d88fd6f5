//! # ember-chain
//!
//! The chain state machine: bootstrap and genesis, mempool admission,
//! block template construction, block validation and atomic
//! application, reward accounting, and the stake ledger.
//!
//! All mutable chain state lives behind a single reader/writer lock;
//! readers query concurrently while template construction takes a read
//! guard and block application takes the write guard. Nothing here
//! performs network I/O while holding either.

mod chain;
mod error;
mod genesis;
mod mempool;
mod migrate;
mod stake;

pub use chain::Chain;
pub use error::{ChainError, ChainResult};
pub use genesis::create_genesis_block;
pub use mempool::Mempool;
pub use stake::{Stake, StakeLedger};
