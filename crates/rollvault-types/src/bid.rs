//! Bid model for the sealed-bid option auction.
//!
//! A bid offers a total `amount` of the bidding asset and names the highest
//! unit `price` the bidder is willing to pay per option. The number of
//! options a bid can buy is therefore `amount / price` (floor), evaluated
//! at the clearing price rather than at the bid's own price.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ActorId, Amount, OptionCount, RoundId};

/// A bid accepted into a round's book. Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub bidder: ActorId,
    pub round_id: RoundId,
    /// Total value offered, in the smallest currency unit.
    pub amount: Amount,
    /// Maximum unit price per option.
    pub price: Amount,
    /// Monotonic submission order within the round.
    pub sequence: u64,
    pub placed_at: DateTime<Utc>,
}

impl Bid {
    /// Options this bid could buy at `unit_price`, floored.
    ///
    /// Returns zero for a zero unit price instead of dividing by zero.
    #[must_use]
    pub fn units_at(&self, unit_price: Amount) -> OptionCount {
        if unit_price == 0 {
            0
        } else {
            self.amount / unit_price
        }
    }

    /// Whether this bid is willing to pay at least `unit_price`.
    #[must_use]
    pub fn is_eligible_at(&self, unit_price: Amount) -> bool {
        self.price >= unit_price
    }
}

/// Acknowledgement handed back to a bidder when a bid is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidReceipt {
    pub round_id: RoundId,
    pub sequence: u64,
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Bid {
    pub fn dummy(amount: Amount, price: Amount, sequence: u64) -> Self {
        Self {
            bidder: ActorId::new(),
            round_id: RoundId(1),
            amount,
            price,
            sequence,
            placed_at: Utc::now(),
        }
    }

    pub fn dummy_for(bidder: ActorId, amount: Amount, price: Amount, sequence: u64) -> Self {
        Self {
            bidder,
            ..Self::dummy(amount, price, sequence)
        }
    }
}
