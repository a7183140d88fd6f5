//! # ember-network
//!
//! P2P gossip layer: newline-delimited JSON messages over TCP, a
//! version/verack handshake, block and transaction relay, and
//! on-demand block catch-up for peers that are behind.
//!
//! Each peer gets one reader task and one writer task; writes are
//! serialized through a per-peer channel. Chain locks are never held
//! across socket I/O.

mod error;
mod message;
mod peer;
mod service;

pub use error::{NetworkError, NetworkResult};
pub use message::{GetBlocksPayload, Message, VerackPayload, VersionPayload, MAX_MESSAGE_SIZE};
pub use peer::PeerRegistry;
pub use service::P2pNode;
