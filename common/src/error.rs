//! Failure kinds for the evaluator and matching engine (spec §7).
//!
//! Every variant is fatal to the enclosing transaction: the pending overlay
//! that produced it is dropped, nothing it wrote becomes visible, and the
//! caller (a block builder or mempool — both non-goals here) decides
//! whether to drop the transaction or resurface the error. None of these
//! are retried inside the core.

use ledger_ids::{AccountId, Address, AssetId, BalanceId};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("deposit amount must be positive, got {amount}")]
    NegativeDeposit { amount: i64 },

    #[error("withdraw amount must be positive, got {amount}")]
    NegativeWithdraw { amount: i64 },

    #[error("no balance record for id {0:?}")]
    UnknownBalanceRecord(BalanceId),

    #[error("insufficient spendable funds in balance {balance}: requested {requested}, available {available}")]
    InsufficientFunds {
        balance: BalanceId,
        requested: i64,
        available: i64,
    },

    #[error("missing required signature from {0:?}")]
    MissingSignature(Address),

    #[error("withdraw condition is not usable in this context: {reason}")]
    InvalidWithdrawCondition { reason: &'static str },

    #[error("claim preimage did not match the stored password hash")]
    InvalidClaimPassword,

    #[error("slate has {count} delegates, exceeding the max of {max}")]
    TooManyDelegatesInSlate { count: usize, max: usize },

    #[error("asset {0} balance is frozen")]
    FrozenAsset(AssetId),

    #[error("owner {owner:?} is not authorised for restricted asset {asset}")]
    UnauthorisedOwner { owner: Address, asset: AssetId },

    #[error("arithmetic overflow while evaluating {context}")]
    Overflow { context: &'static str },

    #[error("unknown asset record {0}")]
    UnknownAssetRecord(AssetId),

    #[error("asset {0} is market-issued and cannot carry a delegate slate")]
    MarketIssuedCannotVote(AssetId),

    #[error("account record {0} does not exist")]
    UnknownAccountRecord(AccountId),

    #[error("slate must be non-empty and strictly ascending")]
    InvalidSlate,

    #[error("release_escrow total ({total}) exceeds escrow balance ({available})")]
    EscrowOverrelease { total: i64, available: i64 },

    #[error("released_by address is not a party to the escrow")]
    NotEscrowParty,

    #[error("burn amount {amount} is below the minimum burn fee {min}")]
    BurnBelowFloor { amount: i64, min: i64 },

    #[error("asset {0} is market-issued and cannot be burned")]
    CannotBurnMarketIssued(AssetId),

    #[error("fee paid for asset {asset} exceeds the declared max_fee ({declared})")]
    FeeExceedsDeclared { asset: AssetId, declared: i64 },

    #[error("net funds movement for asset {asset} is negative: {net}")]
    NegativeNetMovement { asset: AssetId, net: i128 },
}

pub type LedgerResult<T> = Result<T, LedgerError>;
