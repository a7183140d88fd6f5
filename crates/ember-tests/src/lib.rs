//! # ember-tests
//!
//! Integration tests for the Ember node.
//!
//! This crate provides end-to-end testing including:
//! - Chain bootstrap and consensus invariant tests
//! - Mining template and difficulty regulation tests
//! - Storage commit and crash-consistency tests
//! - Stake and balance state tests
//! - Two-node P2P synchronization tests

pub mod harness;



#[cfg(test)]
mod mining_tests;


#[cfg(test)]
mod storage_tests;


pub use harness::*;
