//! Round lifecycle types for the rollvault options vault.
//!
//! Each round moves through four one-way states:
//! **INITIALIZED → AUCTION_OPEN → AUCTION_SETTLED → OPTION_SETTLED**
//!
//! While INITIALIZED the round accepts liquidity. AUCTION_OPEN snapshots the
//! collateral and accepts bids. AUCTION_SETTLED holds the clearing result.
//! OPTION_SETTLED holds the payouts computed from the settlement price.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ActorId, Amount, Bid, MarketStats, OptionCount, RoundId};

/// The four states of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum RoundState {
    Initialized,
    AuctionOpen,
    AuctionSettled,
    OptionSettled,
}

impl RoundState {
    /// The state this one transitions into, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Initialized => Some(Self::AuctionOpen),
            Self::AuctionOpen => Some(Self::AuctionSettled),
            Self::AuctionSettled => Some(Self::OptionSettled),
            Self::OptionSettled => None,
        }
    }
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialized => write!(f, "INITIALIZED"),
            Self::AuctionOpen => write!(f, "AUCTION_OPEN"),
            Self::AuctionSettled => write!(f, "AUCTION_SETTLED"),
            Self::OptionSettled => write!(f, "OPTION_SETTLED"),
        }
    }
}

// ---------------------------------------------------------------------------
// RoundParams: fixed when the auction starts
// ---------------------------------------------------------------------------

/// Parameters computed when a round starts its auction. Never change after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundParams {
    /// Market snapshot the strike was derived from.
    pub market: MarketStats,
    pub strike_price: Amount,
    /// Price level above which option payouts stop growing.
    pub cap_level: Amount,
    /// Collateral locked per option.
    pub collateral_level: Amount,
    /// `cap_level - strike_price`.
    pub max_payout_per_option: Amount,
    pub reserve_price: Amount,
    /// Collateral snapshot taken at auction start.
    pub total_collateral: Amount,
    /// `total_collateral / max_payout_per_option`, floored.
    pub total_options_forsale: OptionCount,
    pub auction_start_time: DateTime<Utc>,
    pub auction_end_time: DateTime<Utc>,
    pub option_expiry_time: DateTime<Utc>,
    pub minimum_bid_amount: Amount,
    pub minimum_collateral_required: Amount,
}

// ---------------------------------------------------------------------------
// SealedBook: clearing input
// ---------------------------------------------------------------------------

/// A frozen set of bids ready for clearing.
///
/// `book_hash` commits to the exact ordered bid set. Clearing the same
/// `SealedBook` twice yields the same [`ClearingOutcome`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedBook {
    pub round_id: RoundId,
    /// Bids in submission order.
    pub bids: Vec<Bid>,
    pub total_options: OptionCount,
    pub reserve_price: Amount,
    /// SHA-256 over the ordered bids.
    pub book_hash: [u8; 32],
}

// ---------------------------------------------------------------------------
// ClearingOutcome: clearing output
// ---------------------------------------------------------------------------

/// What one bid received at clearing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidFill {
    pub sequence: u64,
    pub bidder: ActorId,
    pub options: OptionCount,
    pub refund: Amount,
}

/// Result of clearing one round's sealed book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearingOutcome {
    pub round_id: RoundId,
    /// Uniform price every winning bid pays per option.
    pub clearing_price: Amount,
    /// Options granted per bidder, summed over that bidder's bids.
    pub allocations: BTreeMap<ActorId, OptionCount>,
    /// Unspent bid amount owed back per bidder.
    pub refunds: BTreeMap<ActorId, Amount>,
    /// Per-bid breakdown, in clearing order.
    pub fills: Vec<BidFill>,
    /// Sequences of bids excluded for pricing below reserve.
    pub removed: Vec<u64>,
    pub options_sold: OptionCount,
    /// Supply left undistributed after flooring.
    pub unsold_options: OptionCount,
    /// `options_sold * clearing_price`, owed to the round's liquidity.
    pub total_premium: Amount,
    /// Hash of the sealed input.
    pub book_hash: [u8; 32],
    /// Hash over price and fills, for cross-checking two clearings.
    pub result_hash: [u8; 32],
}

impl ClearingOutcome {
    #[must_use]
    pub fn allocation_of(&self, bidder: &ActorId) -> OptionCount {
        self.allocations.get(bidder).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn refund_of(&self, bidder: &ActorId) -> Amount {
        self.refunds.get(bidder).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// RoundSettlement
// ---------------------------------------------------------------------------

/// Summary of a round whose options have been settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSettlement {
    pub round_id: RoundId,
    pub settlement_price: Amount,
    pub payout_per_option: Amount,
    pub total_payout: Amount,
    pub total_premium: Amount,
    /// Collateral plus premium minus payout, handed to the next round.
    pub remaining_collateral: Amount,
    pub settled_at: DateTime<Utc>,
}
