//! Error types for the rollvault options vault.
//!
//! All errors use the `RV_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Validation errors (bad amount / price / timing input)
//! - 2xx: State errors (operation invalid for the current round state)
//! - 3xx: Insufficient resource errors (collateral / balance too low)
//! - 4xx: Clearing errors
//! - 5xx: Already-settled errors (duplicate settlement or claim)
//! - 6xx: Ledger integrity errors
//! - 9xx: General / internal errors

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{ActorId, Amount, PositionId, RoundId, RoundState};

/// Coarse error category surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    State,
    InsufficientResource,
    Clearing,
    AlreadySettled,
    Integrity,
    Internal,
}

/// Central error enum for all rollvault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// Zero amount or zero price.
    #[error("RV_ERR_100: Invalid bid: {reason}")]
    InvalidBid { reason: String },

    #[error("RV_ERR_101: Bid price {price} below reserve price {reserve}")]
    BelowReservePrice { price: Amount, reserve: Amount },

    #[error("RV_ERR_102: Bid amount {amount} below minimum bid {minimum}")]
    BelowMinimumBid { amount: Amount, minimum: Amount },

    #[error("RV_ERR_103: Deposit amount {amount} below minimum deposit {minimum}")]
    BelowMinimumDeposit { amount: Amount, minimum: Amount },

    #[error("RV_ERR_104: Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// Derived round parameters are unusable (zero strike, zero options...).
    #[error("RV_ERR_105: Invalid round parameters: {reason}")]
    InvalidRoundParams { reason: String },

    // =================================================================
    // State Errors (2xx)
    // =================================================================
    #[error("RV_ERR_200: Auction not open for {round} (state {state})")]
    AuctionNotOpen { round: RoundId, state: RoundState },

    #[error("RV_ERR_201: Auction for {round} expired at {ended_at}")]
    AuctionExpired {
        round: RoundId,
        ended_at: DateTime<Utc>,
    },

    #[error("RV_ERR_202: Auction for {round} runs until {ends_at}")]
    AuctionNotYetExpired {
        round: RoundId,
        ends_at: DateTime<Utc>,
    },

    #[error("RV_ERR_203: Options of {round} expire at {expires_at}")]
    OptionNotYetExpired {
        round: RoundId,
        expires_at: DateTime<Utc>,
    },

    #[error("RV_ERR_204: Wrong round state for {round}: expected {expected}, got {actual}")]
    WrongRoundState {
        round: RoundId,
        expected: RoundState,
        actual: RoundState,
    },

    #[error("RV_ERR_205: Round not found: {0}")]
    RoundNotFound(RoundId),

    #[error("RV_ERR_206: Position not found: {0}")]
    PositionNotFound(PositionId),

    /// No round has started its auction yet.
    #[error("RV_ERR_207: No active round")]
    NoActiveRound,

    #[error("RV_ERR_208: Actor {caller} does not own {position}")]
    NotPositionOwner {
        position: PositionId,
        caller: ActorId,
    },

    /// The bid book has reached its per-round capacity.
    #[error("RV_ERR_209: Bid book full for {0}")]
    BookFull(RoundId),

    // =================================================================
    // Insufficient Resource Errors (3xx)
    // =================================================================
    #[error("RV_ERR_300: Insufficient collateral: need {needed}, have {available}")]
    InsufficientCollateral { needed: Amount, available: Amount },

    #[error("RV_ERR_301: Insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Amount, available: Amount },

    // =================================================================
    // Clearing Errors (4xx)
    // =================================================================
    /// Nothing at or above reserve to clear at.
    #[error("RV_ERR_400: No bids to clear")]
    NoBids,

    /// Bids exist but every one of them is below the reserve price.
    #[error("RV_ERR_401: Reserve price {reserve} not met by any bid")]
    ReserveNotMet { reserve: Amount },

    #[error("RV_ERR_402: Arithmetic overflow: {context}")]
    ArithmeticOverflow { context: String },

    // =================================================================
    // Already Settled Errors (5xx)
    // =================================================================
    #[error("RV_ERR_500: Auction already cleared for {0}")]
    AlreadyCleared(RoundId),

    #[error("RV_ERR_501: Refund already claimed by {bidder} in {round}")]
    RefundAlreadyClaimed { round: RoundId, bidder: ActorId },

    #[error("RV_ERR_502: Payout already claimed by {bidder} in {round}")]
    PayoutAlreadyClaimed { round: RoundId, bidder: ActorId },

    // =================================================================
    // Ledger Integrity Errors (6xx)
    // =================================================================
    #[error("RV_ERR_600: Ledger chain broken for {position}: {reason}")]
    LedgerChainBroken { position: PositionId, reason: String },

    /// Critical: liquidity held does not match deposits, premiums and payouts.
    #[error("RV_ERR_601: Collateral invariant violation: {reason}")]
    CollateralInvariantViolation { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    #[error("RV_ERR_900: Internal error: {0}")]
    Internal(String),

    #[error("RV_ERR_901: Serialization error: {0}")]
    Serialization(String),

    #[error("RV_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

impl VaultError {
    /// Map this error onto the caller-facing taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidBid { .. }
            | Self::BelowReservePrice { .. }
            | Self::BelowMinimumBid { .. }
            | Self::BelowMinimumDeposit { .. }
            | Self::InvalidAmount { .. }
            | Self::InvalidRoundParams { .. } => ErrorKind::Validation,
            Self::AuctionNotOpen { .. }
            | Self::AuctionExpired { .. }
            | Self::AuctionNotYetExpired { .. }
            | Self::OptionNotYetExpired { .. }
            | Self::WrongRoundState { .. }
            | Self::RoundNotFound(_)
            | Self::PositionNotFound(_)
            | Self::NoActiveRound
            | Self::NotPositionOwner { .. }
            | Self::BookFull(_) => ErrorKind::State,
            Self::InsufficientCollateral { .. } | Self::InsufficientBalance { .. } => {
                ErrorKind::InsufficientResource
            }
            Self::NoBids | Self::ReserveNotMet { .. } | Self::ArithmeticOverflow { .. } => {
                ErrorKind::Clearing
            }
            Self::AlreadyCleared(_)
            | Self::RefundAlreadyClaimed { .. }
            | Self::PayoutAlreadyClaimed { .. } => ErrorKind::AlreadySettled,
            Self::LedgerChainBroken { .. } | Self::CollateralInvariantViolation { .. } => {
                ErrorKind::Integrity
            }
            Self::Internal(_) | Self::Serialization(_) | Self::Configuration(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub(crate) fn overflow(context: impl Into<String>) -> Self {
        Self::ArithmeticOverflow {
            context: context.into(),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, VaultError>;

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Checked multiplication that reports overflow as a clearing error.
pub fn checked_mul(a: Amount, b: Amount, context: &str) -> Result<Amount> {
    a.checked_mul(b).ok_or_else(|| VaultError::overflow(context))
}

/// Checked addition that reports overflow as a clearing error.
pub fn checked_add(a: Amount, b: Amount, context: &str) -> Result<Amount> {
    a.checked_add(b).ok_or_else(|| VaultError::overflow(context))
}
