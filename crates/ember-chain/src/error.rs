//! Chain error types.

use thiserror::Error;

/// Errors from mempool admission, validation, and block application.
#[derive(Error, Debug)]
pub enum ChainError {
    /// Persistence failure.
    #[error("storage error: {0}")]
    Storage(#[from] ember_storage::StorageError),

    /// A serialized block or transaction failed to decode.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Filesystem failure during bootstrap or migration.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Block height does not extend the tip.
    #[error("bad height: expected {expected}, got {got}")]
    BadHeight { expected: u64, got: u64 },

    /// Block does not link to the current tip.
    #[error("bad prev hash")]
    BadPrevHash,

    /// Declared hash does not match the recomputed header hash.
    #[error("bad hash: computed {computed}, got {got}")]
    BadHash { computed: String, got: String },

    /// Header hash does not satisfy its own difficulty target.
    #[error("insufficient proof of work")]
    InsufficientPow,

    /// Transaction count exceeds the network limit.
    #[error("too many transactions: {count} > {max}")]
    TooManyTransactions { count: usize, max: u64 },

    /// Serialized block exceeds the network size limit.
    #[error("block too large: {size} bytes > {max}")]
    BlockTooLarge { size: usize, max: u64 },

    /// Block target is easier than the progressive floor allows.
    #[error("difficulty below progressive floor at height {0}")]
    BelowDifficultyFloor(u64),

    /// Block mints more than the reward due at its height.
    #[error("excessive mint: {minted:.8} > allowed {allowed:.8}")]
    ExcessiveMint { minted: f64, allowed: f64 },

    /// Sender cannot cover amount plus fee.
    #[error("insufficient balance: have {have:.8}, need {need:.8}")]
    InsufficientBalance { have: f64, need: f64 },

    /// Sender's unstaked balance cannot cover the stake.
    #[error("insufficient available balance for staking")]
    InsufficientAvailableBalance,

    /// Stake amount is below the network minimum.
    #[error("minimum stake is {min:.2}")]
    BelowMinStake { min: f64 },

    /// Total stake would stay below the PoS participation threshold.
    #[error("total stake must be at least {threshold:.2} to participate in PoS")]
    BelowPosThreshold { threshold: f64 },

    /// No stake record exists for the address.
    #[error("no stake found for {0}")]
    NoStake(String),

    /// Staked amount cannot cover the removal.
    #[error("insufficient stake: have {have:.8}, want {want:.8}")]
    InsufficientStake { have: f64, want: f64 },
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;
