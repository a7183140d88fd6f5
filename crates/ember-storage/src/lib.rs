//! # ember-storage
//!
//! Transactional key-value persistence for the Ember blockchain.
//!
//! The store is organized into named buckets (rocksdb column families)
//! for blocks-by-height, hash-to-height, balances, stakes, the
//! transaction index, and chain metadata. The only mutating operation
//! is [`ChainStore::commit_block`], which applies every change for a
//! new block in one atomic batch: a crash mid-commit leaves the store
//! at the previous tip.

mod batch;
mod database;
mod error;
mod store;

pub use batch::WriteBatch;
pub use database::{Bucket, Database};
pub use error::{StorageError, StorageResult};
pub use store::{BlockCommit, ChainStore};
