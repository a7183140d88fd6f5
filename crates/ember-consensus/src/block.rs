//! Block and transaction data model.
//!
//! Headers hash over a fixed 88-byte little-endian encoding:
//!
//! ```text
//! +---------+-----------+-------------+-----------+--------+---------+
//! | version | prev_hash | merkle_root | timestamp |  bits  |  nonce  |
//! | 4 bytes | 32 bytes  |  32 bytes   |  8 bytes  | 4 bytes| 8 bytes |
//! +---------+-----------+-------------+-----------+--------+---------+
//! ```
//!
//! The logical height is carried in the header but is not part of the
//! hash pre-image. All hashes are double SHA-256, hex-encoded.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// 64 hex zeros: the previous-hash of the genesis block and the merkle
/// root of an empty transaction set.
pub const ZERO_HASH_HEX: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Size of the header hash pre-image in bytes.
const HEADER_SIZE: usize = 4 + 32 + 32 + 8 + 4 + 8;

/// Compute double SHA-256.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

/// Block header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Header format version.
    pub version: u32,
    /// Hash of the previous block, hex-encoded.
    pub prev_hash: String,
    /// Merkle root over the block's transactions, hex-encoded.
    pub merkle_root: String,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    /// Compact difficulty target.
    pub bits: u32,
    /// Proof-of-Work nonce.
    pub nonce: u64,
    /// Block height. Not part of the hash pre-image.
    pub height: u64,
}

impl BlockHeader {
    /// Serialize the header into its canonical hash pre-image.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&pad_hash_bytes(&self.prev_hash));
        buf.extend_from_slice(&pad_hash_bytes(&self.merkle_root));
        buf.extend_from_slice(&(self.timestamp as u64).to_le_bytes());
        buf.extend_from_slice(&self.bits.to_le_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        buf
    }

    /// Compute the SHA-256d hash of the header, hex-encoded.
    pub fn compute_hash(&self) -> String {
        hex::encode(sha256d(&self.serialize()))
    }
}

/// Decode a hex hash into exactly 32 bytes, left-padding short values
/// with zeros and truncating long ones. Undecodable input becomes all
/// zeros.
fn pad_hash_bytes(hex_str: &str) -> [u8; 32] {
    let decoded = hex::decode(hex_str).unwrap_or_default();
    let mut out = [0u8; 32];
    if decoded.len() >= 32 {
        out.copy_from_slice(&decoded[..32]);
    } else {
        out[32 - decoded.len()..].copy_from_slice(&decoded);
    }
    out
}

/// Transaction kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    /// Mints the miner's share of the block reward.
    Coinbase,
    /// Moves value between two addresses.
    Transfer,
    /// Locks value into the stake ledger.
    Stake,
    /// Releases previously staked value.
    Unstake,
    /// Distributes the stakers' share of the block reward.
    PosReward,
}

impl TxKind {
    /// The wire tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Coinbase => "coinbase",
            TxKind::Transfer => "transfer",
            TxKind::Stake => "stake",
            TxKind::Unstake => "unstake",
            TxKind::PosReward => "pos_reward",
        }
    }
}

impl std::fmt::Display for TxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transaction output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Receiving address.
    pub address: String,
    /// Amount credited.
    pub amount: f64,
}

/// A blockchain transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Deterministic transaction id, hex-encoded.
    #[serde(default)]
    pub txid: String,
    /// Transaction kind.
    #[serde(rename = "type")]
    pub kind: TxKind,
    /// Sending address, absent for minting transactions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Receiving address, absent for stake operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Principal amount.
    pub amount: f64,
    /// Flat transaction fee.
    #[serde(default)]
    pub fee: f64,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    /// Detached signature, carried but not checked by consensus.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Explicit outputs for minting transactions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<TxOutput>,
}

/// The canonical txid pre-image. Field order is fixed; absent addresses
/// are encoded as empty strings.
#[derive(Serialize)]
struct TxIdPreimage<'a> {
    #[serde(rename = "type")]
    kind: TxKind,
    from: &'a str,
    to: &'a str,
    amount: f64,
    timestamp: i64,
}

impl Transaction {
    /// Compute the deterministic transaction id.
    pub fn compute_txid(&self) -> String {
        let preimage = TxIdPreimage {
            kind: self.kind,
            from: self.from.as_deref().unwrap_or(""),
            to: self.to.as_deref().unwrap_or(""),
            amount: self.amount,
            timestamp: self.timestamp,
        };
        // Serializing a flat struct of primitives cannot fail.
        let data = serde_json::to_vec(&preimage).unwrap_or_default();
        hex::encode(sha256d(&data))
    }

    /// Create a mining reward transaction.
    pub fn coinbase(miner_address: &str, reward: f64, timestamp: i64) -> Self {
        let mut tx = Transaction {
            txid: String::new(),
            kind: TxKind::Coinbase,
            from: None,
            to: Some(miner_address.to_string()),
            amount: reward,
            fee: 0.0,
            timestamp,
            signature: None,
            outputs: vec![TxOutput {
                address: miner_address.to_string(),
                amount: reward,
            }],
        };
        tx.txid = tx.compute_txid();
        tx
    }

    /// Create a transfer transaction.
    pub fn transfer(
        from: &str,
        to: &str,
        amount: f64,
        fee: f64,
        signature: Option<String>,
        timestamp: i64,
    ) -> Self {
        let mut tx = Transaction {
            txid: String::new(),
            kind: TxKind::Transfer,
            from: Some(from.to_string()),
            to: Some(to.to_string()),
            amount,
            fee,
            timestamp,
            signature,
            outputs: Vec::new(),
        };
        tx.txid = tx.compute_txid();
        tx
    }

    /// Create a stake or unstake transaction.
    pub fn staking(kind: TxKind, address: &str, amount: f64, timestamp: i64) -> Self {
        let mut tx = Transaction {
            txid: String::new(),
            kind,
            from: Some(address.to_string()),
            to: None,
            amount,
            fee: 0.0,
            timestamp,
            signature: None,
            outputs: Vec::new(),
        };
        tx.txid = tx.compute_txid();
        tx
    }

    /// Create a stake-weighted reward transaction with explicit outputs.
    pub fn pos_reward(amount: f64, outputs: Vec<TxOutput>, timestamp: i64) -> Self {
        let mut tx = Transaction {
            txid: String::new(),
            kind: TxKind::PosReward,
            from: None,
            to: None,
            amount,
            fee: 0.0,
            timestamp,
            signature: None,
            outputs,
        };
        tx.txid = tx.compute_txid();
        tx
    }
}

/// A full block: header, ordered transactions, and the header hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Block header.
    pub header: BlockHeader,
    /// Ordered transactions, coinbase first.
    pub transactions: Vec<Transaction>,
    /// SHA-256d hash of the header, hex-encoded. Empty in templates.
    #[serde(default)]
    pub hash: String,
}

/// Compute the merkle root over a transaction list.
///
/// Leaves are SHA-256d of each transaction's canonical JSON; odd
/// siblings are paired with themselves. The empty set hashes to all
/// zeros.
pub fn compute_merkle_root(txs: &[Transaction]) -> String {
    if txs.is_empty() {
        return ZERO_HASH_HEX.to_string();
    }

    let mut hashes: Vec<[u8; 32]> = txs
        .iter()
        .map(|tx| sha256d(&serde_json::to_vec(tx).unwrap_or_default()))
        .collect();

    while hashes.len() > 1 {
        let mut next = Vec::with_capacity(hashes.len().div_ceil(2));
        for pair in hashes.chunks(2) {
            let mut combined = Vec::with_capacity(64);
            combined.extend_from_slice(&pair[0]);
            combined.extend_from_slice(pair.get(1).unwrap_or(&pair[0]));
            next.push(sha256d(&combined));
        }
        hashes = next;
    }

    hex::encode(hashes[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> BlockHeader {
        BlockHeader {
            version: 2,
            prev_hash: ZERO_HASH_HEX.to_string(),
            merkle_root: ZERO_HASH_HEX.to_string(),
            timestamp: 1_772_064_000,
            bits: 0x1f00ffff,
            nonce: 0,
            height: 0,
        }
    }

    #[test]
    fn header_preimage_is_88_bytes() {
        assert_eq!(sample_header().serialize().len(), 88);
    }

    #[test]
    fn header_hash_ignores_height() {
        let a = sample_header();
        let mut b = a.clone();
        b.height = 42;
        assert_eq!(a.compute_hash(), b.compute_hash());
    }

    #[test]
    fn header_hash_changes_with_nonce() {
        let a = sample_header();
        let mut b = a.clone();
        b.nonce = 1;
        assert_ne!(a.compute_hash(), b.compute_hash());
    }

    #[test]
    fn short_hex_is_left_padded() {
        let padded = pad_hash_bytes("ff");
        assert_eq!(padded[31], 0xff);
        assert!(padded[..31].iter().all(|&b| b == 0));
    }

    #[test]
    fn bad_hex_pads_to_zero() {
        assert_eq!(pad_hash_bytes("not hex"), [0u8; 32]);
    }

    #[test]
    fn txid_is_deterministic() {
        let a = Transaction::transfer("alice", "bob", 5.0, 0.001, None, 1000);
        let b = Transaction::transfer("alice", "bob", 5.0, 0.001, None, 1000);
        assert_eq!(a.txid, b.txid);
    }

    #[test]
    fn txid_depends_on_logical_content() {
        let base = Transaction::transfer("alice", "bob", 5.0, 0.001, None, 1000);
        let other_amount = Transaction::transfer("alice", "bob", 6.0, 0.001, None, 1000);
        let other_time = Transaction::transfer("alice", "bob", 5.0, 0.001, None, 1001);
        assert_ne!(base.txid, other_amount.txid);
        assert_ne!(base.txid, other_time.txid);
    }

    #[test]
    fn txid_ignores_signature() {
        let unsigned = Transaction::transfer("alice", "bob", 5.0, 0.001, None, 1000);
        let signed =
            Transaction::transfer("alice", "bob", 5.0, 0.001, Some("sig".to_string()), 1000);
        assert_eq!(unsigned.txid, signed.txid);
    }

    #[test]
    fn empty_merkle_root_is_all_zeros() {
        assert_eq!(compute_merkle_root(&[]), ZERO_HASH_HEX);
    }

    #[test]
    fn single_tx_merkle_root_is_its_hash() {
        let tx = Transaction::coinbase("miner", 50.0, 1000);
        let expected = hex::encode(sha256d(&serde_json::to_vec(&tx).unwrap()));
        assert_eq!(compute_merkle_root(&[tx]), expected);
    }

    #[test]
    fn odd_leaf_is_duplicated() {
        let txs: Vec<Transaction> = (0..3)
            .map(|i| Transaction::coinbase("miner", 1.0, 1000 + i))
            .collect();
        // Manually reduce with the last leaf paired against itself.
        let leaves: Vec<[u8; 32]> = txs
            .iter()
            .map(|tx| sha256d(&serde_json::to_vec(tx).unwrap()))
            .collect();
        let left = {
            let mut buf = Vec::new();
            buf.extend_from_slice(&leaves[0]);
            buf.extend_from_slice(&leaves[1]);
            sha256d(&buf)
        };
        let right = {
            let mut buf = Vec::new();
            buf.extend_from_slice(&leaves[2]);
            buf.extend_from_slice(&leaves[2]);
            sha256d(&buf)
        };
        let root = {
            let mut buf = Vec::new();
            buf.extend_from_slice(&left);
            buf.extend_from_slice(&right);
            hex::encode(sha256d(&buf))
        };
        assert_eq!(compute_merkle_root(&txs), root);
    }

    #[test]
    fn merkle_root_changes_on_mutation() {
        let txs = vec![
            Transaction::coinbase("miner", 50.0, 1000),
            Transaction::transfer("alice", "bob", 5.0, 0.001, None, 1000),
        ];
        let mut mutated = txs.clone();
        mutated[1].amount = 5.000_000_01;
        mutated[1].txid = mutated[1].compute_txid();
        assert_ne!(compute_merkle_root(&txs), compute_merkle_root(&mutated));
    }

    #[test]
    fn transaction_json_round_trip() {
        let tx = Transaction::transfer("alice", "bob", 5.0, 0.001, Some("s".into()), 1000);
        let json = serde_json::to_string(&tx).unwrap();
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, back);
        // The kind travels as a `type` tag.
        assert!(json.contains("\"type\":\"transfer\""));
    }

    #[test]
    fn absent_fields_are_omitted() {
        let tx = Transaction::coinbase("miner", 50.0, 1000);
        let json = serde_json::to_string(&tx).unwrap();
        assert!(!json.contains("\"from\""));
        assert!(!json.contains("\"signature\""));
    }
}
