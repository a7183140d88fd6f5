//! Shared handler state.

use ember_chain::Chain;
use ember_network::P2pNode;
use std::sync::Arc;

/// Handles shared by every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    /// The chain state machine.
    pub chain: Arc<Chain>,
    /// The P2P node, for broadcasting accepted blocks and transactions.
    pub network: Arc<P2pNode>,
}

impl AppState {
    /// Bundle the chain and network handles.
    pub fn new(chain: Arc<Chain>, network: Arc<P2pNode>) -> Self {
        Self { chain, network }
    }
}
