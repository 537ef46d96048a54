// crates/ytx-core/src/error.rs

use thiserror::Error;

use crate::address::Address;

/// Protocol-wide error types for the YTX token economy.
///
/// Every variant is local and deterministic: the call that produced it has
/// been rolled back in full, and the caller may retry with corrected input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum YtxError {
    /// The debited account holds less than the requested amount.
    #[error("Insufficient {token} balance for {account}: need {needed}, have {available}")]
    InsufficientBalance {
        token: String,
        account: Address,
        needed: u128,
        available: u128,
    },

    /// The spender has not been approved for the requested amount.
    #[error("Insufficient {token} allowance from {owner} to {spender}: need {needed}, have {available}")]
    InsufficientAllowance {
        token: String,
        owner: Address,
        spender: Address,
        needed: u128,
        available: u128,
    },

    /// Unstaking more than is currently staked.
    #[error("Insufficient stake for {account}: requested {requested}, staked {staked}")]
    InsufficientStake {
        account: Address,
        requested: u128,
        staked: u128,
    },

    /// Withdrawing more reward shares than the position holds.
    #[error("Insufficient shares for {account}: requested {requested}, held {held}")]
    InsufficientShares {
        account: Address,
        requested: u128,
        held: u128,
    },

    /// Checked arithmetic overflowed or underflowed.
    #[error("Arithmetic overflow in {0}")]
    ArithmeticOverflow(&'static str),

    /// Locked liquidity cannot be withdrawn before its unlock block.
    #[error("Liquidity locked until block {unlock_block}, current block is {current_block}")]
    LockNotExpired { unlock_block: u64, current_block: u64 },

    #[error("Blueprint already registered: {0}")]
    DuplicateBlueprint(String),

    #[error("Unknown blueprint: {0}")]
    UnknownBlueprint(String),

    /// Every edition of the blueprint has been minted.
    #[error("Blueprint {uri} exhausted after {max_mint} mints")]
    BlueprintExhausted { uri: String, max_mint: u64 },

    #[error("Unknown token id {0}")]
    UnknownToken(u64),

    #[error("{caller} does not own token {token_id}")]
    NotTokenOwner { token_id: u64, caller: Address },

    /// The caller lacks the role required by an administrative operation.
    #[error("{caller} is not authorized to {action}")]
    Unauthorized { caller: Address, action: &'static str },

    #[error("Amount must be greater than zero for {0}")]
    ZeroAmount(&'static str),
}

/// Result alias used throughout the workspace.
pub type YtxResult<T> = Result<T, YtxError>;

/// Errors raised while loading or validating a `ProtocolConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field holds a value the protocol cannot operate with.
    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
