//! One option round and its state machine.
//!
//! ```text
//! INITIALIZED ──start_auction──▶ AUCTION_OPEN ──settle_auction──▶ AUCTION_SETTLED
//!                                                                      │
//!                                          OPTION_SETTLED ◀──settle_options
//! ```
//!
//! Every transition validates before it writes. A failed transition leaves
//! the round exactly as it was; in particular an auction that cannot clear
//! stays open.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rollvault_auction::{
    BidBook, BidRules, clear_sealed_book, verify_book_hash, verify_result_hash,
};
use rollvault_types::{
    ActorId, Amount, BidReceipt, ClearingOutcome, MarketStats, OptionCount, Result, RoundId,
    RoundParams, RoundSettlement, RoundState, VaultConfig, VaultError, checked_add, checked_mul,
};

use crate::params::{derive_params, payout_per_option};

/// A single round of options written against pooled collateral.
#[derive(Debug, Clone)]
pub struct OptionRound {
    id: RoundId,
    state: RoundState,
    /// Running total while INITIALIZED, snapshot afterwards.
    total_collateral: Amount,
    params: Option<RoundParams>,
    book: BidBook,
    clearing: Option<ClearingOutcome>,
    settlement: Option<RoundSettlement>,
    refunds_claimed: BTreeSet<ActorId>,
    payouts_claimed: BTreeSet<ActorId>,
}

impl OptionRound {
    #[must_use]
    pub fn new(id: RoundId, max_bids: usize) -> Self {
        Self {
            id,
            state: RoundState::Initialized,
            total_collateral: 0,
            params: None,
            book: BidBook::with_capacity(id, max_bids),
            clearing: None,
            settlement: None,
            refunds_claimed: BTreeSet::new(),
            payouts_claimed: BTreeSet::new(),
        }
    }

    // =====================================================================
    // Collateral (INITIALIZED only)
    // =====================================================================

    /// # Errors
    /// `WrongRoundState` once the auction has started.
    pub fn add_collateral(&mut self, amount: Amount) -> Result<()> {
        self.expect_state(RoundState::Initialized)?;
        self.total_collateral = checked_add(self.total_collateral, amount, "round collateral")?;
        Ok(())
    }

    /// # Errors
    /// `WrongRoundState` once the auction has started, `InsufficientBalance`
    /// if the round holds less than `amount`.
    pub fn remove_collateral(&mut self, amount: Amount) -> Result<()> {
        self.expect_state(RoundState::Initialized)?;
        if amount > self.total_collateral {
            return Err(VaultError::InsufficientBalance {
                needed: amount,
                available: self.total_collateral,
            });
        }
        self.total_collateral -= amount;
        Ok(())
    }

    // =====================================================================
    // Transitions
    // =====================================================================

    /// INITIALIZED → AUCTION_OPEN.
    ///
    /// # Errors
    /// `WrongRoundState`, `InsufficientCollateral` below the configured
    /// minimum, or any error from [`derive_params`].
    pub fn start_auction(
        &mut self,
        config: &VaultConfig,
        market: MarketStats,
        now: DateTime<Utc>,
    ) -> Result<&RoundParams> {
        self.expect_state(RoundState::Initialized)?;
        if self.total_collateral < config.min_collateral {
            return Err(VaultError::InsufficientCollateral {
                needed: config.min_collateral,
                available: self.total_collateral,
            });
        }
        let params = derive_params(config, market, self.total_collateral, now)?;
        self.book.open(BidRules {
            reserve_price: params.reserve_price,
            minimum_bid_amount: params.minimum_bid_amount,
            auction_end_time: params.auction_end_time,
        })?;

        self.advance();
        tracing::info!(
            round = %self.id,
            strike = params.strike_price,
            cap_level = params.cap_level,
            reserve_price = params.reserve_price,
            total_collateral = params.total_collateral,
            options = params.total_options_forsale,
            ends_at = %params.auction_end_time,
            "auction started"
        );
        Ok(self.params.insert(params))
    }

    /// Accept a bid while the auction is open.
    ///
    /// # Errors
    /// `AuctionNotOpen` outside AUCTION_OPEN, otherwise whatever the bid
    /// book rejects the bid with.
    pub fn place_bid(
        &mut self,
        bidder: ActorId,
        amount: Amount,
        price: Amount,
        now: DateTime<Utc>,
    ) -> Result<BidReceipt> {
        if self.state != RoundState::AuctionOpen {
            return Err(VaultError::AuctionNotOpen {
                round: self.id,
                state: self.state,
            });
        }
        let bid = self.book.submit(bidder, amount, price, now)?;
        Ok(BidReceipt {
            round_id: bid.round_id,
            sequence: bid.sequence,
        })
    }

    /// AUCTION_OPEN → AUCTION_SETTLED.
    ///
    /// Clears a sealed snapshot of the book first; the book is frozen and
    /// the result stored only if clearing succeeds.
    ///
    /// # Errors
    /// `AlreadyCleared` after a successful settlement, `AuctionNotOpen`
    /// before the auction starts, `AuctionNotYetExpired` before the end
    /// time, and `NoBids` / `ReserveNotMet` from clearing.
    pub fn settle_auction(&mut self, now: DateTime<Utc>) -> Result<&ClearingOutcome> {
        match self.state {
            RoundState::AuctionOpen => {}
            RoundState::Initialized => {
                return Err(VaultError::AuctionNotOpen {
                    round: self.id,
                    state: self.state,
                });
            }
            RoundState::AuctionSettled | RoundState::OptionSettled => {
                return Err(VaultError::AlreadyCleared(self.id));
            }
        }
        let params = self.params_ref()?;
        if now < params.auction_end_time {
            tracing::warn!(round = %self.id, ends_at = %params.auction_end_time, "auction settled early");
            return Err(VaultError::AuctionNotYetExpired {
                round: self.id,
                ends_at: params.auction_end_time,
            });
        }

        let sealed = self.book.seal(params.total_options_forsale)?;
        tracing::debug!(
            round = %self.id,
            bids = sealed.bids.len(),
            book_hash = %hex::encode(sealed.book_hash),
            "bid book sealed"
        );
        if !verify_book_hash(&sealed) {
            return Err(VaultError::Internal(format!("{} sealed book hash mismatch", self.id)));
        }
        let outcome = clear_sealed_book(&sealed)?;
        if !verify_result_hash(
            outcome.round_id,
            outcome.clearing_price,
            &outcome.fills,
            &outcome.result_hash,
        ) {
            return Err(VaultError::Internal(format!("{} clearing hash mismatch", self.id)));
        }

        self.book.freeze();
        self.advance();
        Ok(self.clearing.insert(outcome))
    }

    /// Compute the settlement for `settlement_price` without applying it.
    ///
    /// Returns the stored settlement once the round is OPTION_SETTLED.
    ///
    /// # Errors
    /// `WrongRoundState` unless AUCTION_SETTLED, `OptionNotYetExpired`
    /// before expiry, `ArithmeticOverflow` on payout totals.
    pub fn preview_settlement(
        &self,
        settlement_price: Amount,
        now: DateTime<Utc>,
    ) -> Result<RoundSettlement> {
        if let Some(settled) = &self.settlement {
            return Ok(settled.clone());
        }
        self.expect_state(RoundState::AuctionSettled)?;
        let params = self.params_ref()?;
        let clearing = self.clearing_ref()?;
        if now < params.option_expiry_time {
            tracing::warn!(round = %self.id, expires_at = %params.option_expiry_time, "round settled early");
            return Err(VaultError::OptionNotYetExpired {
                round: self.id,
                expires_at: params.option_expiry_time,
            });
        }

        let per_option = payout_per_option(params, settlement_price);
        let total_payout = checked_mul(clearing.options_sold, per_option, "total payout")?;
        let remaining_collateral = self
            .total_collateral
            .checked_sub(total_payout)
            .and_then(|left| left.checked_add(clearing.total_premium))
            .ok_or_else(|| VaultError::CollateralInvariantViolation {
                reason: format!(
                    "payout {total_payout} exceeds collateral {} of {}",
                    self.total_collateral, self.id
                ),
            })?;

        Ok(RoundSettlement {
            round_id: self.id,
            settlement_price,
            payout_per_option: per_option,
            total_payout,
            total_premium: clearing.total_premium,
            remaining_collateral,
            settled_at: now,
        })
    }

    /// AUCTION_SETTLED → OPTION_SETTLED with a settlement from
    /// [`Self::preview_settlement`]. Idempotent once settled.
    ///
    /// # Errors
    /// `WrongRoundState` unless AUCTION_SETTLED or already settled.
    pub fn commit_settlement(&mut self, settlement: RoundSettlement) -> Result<&RoundSettlement> {
        if self.state == RoundState::OptionSettled {
            return self.settlement_ref();
        }
        self.expect_state(RoundState::AuctionSettled)?;
        self.advance();
        tracing::info!(
            round = %self.id,
            settlement_price = settlement.settlement_price,
            payout_per_option = settlement.payout_per_option,
            total_payout = settlement.total_payout,
            total_premium = settlement.total_premium,
            remaining = settlement.remaining_collateral,
            "options settled"
        );
        Ok(self.settlement.insert(settlement))
    }

    /// Settle the options in one step.
    ///
    /// # Errors
    /// See [`Self::preview_settlement`].
    pub fn settle_options(
        &mut self,
        settlement_price: Amount,
        now: DateTime<Utc>,
    ) -> Result<&RoundSettlement> {
        let settlement = self.preview_settlement(settlement_price, now)?;
        self.commit_settlement(settlement)
    }

    // =====================================================================
    // Claims
    // =====================================================================

    /// Hand `bidder` their unspent bid amount. Once per bidder.
    ///
    /// # Errors
    /// `WrongRoundState` before the auction settles, `RefundAlreadyClaimed`
    /// on a repeat.
    pub fn claim_refund(&mut self, bidder: ActorId) -> Result<Amount> {
        let clearing = self.clearing.as_ref().ok_or(VaultError::WrongRoundState {
            round: self.id,
            expected: RoundState::AuctionSettled,
            actual: self.state,
        })?;
        if self.is_refund_claimed(&bidder) {
            return Err(VaultError::RefundAlreadyClaimed {
                round: self.id,
                bidder,
            });
        }
        let amount = clearing.refund_of(&bidder);
        self.refunds_claimed.insert(bidder);
        tracing::debug!(round = %self.id, %bidder, amount, "refund claimed");
        Ok(amount)
    }

    /// Hand `bidder` their option payout. Once per bidder.
    ///
    /// # Errors
    /// `WrongRoundState` before option settlement, `PayoutAlreadyClaimed`
    /// on a repeat.
    pub fn claim_payout(&mut self, bidder: ActorId) -> Result<Amount> {
        if self.state != RoundState::OptionSettled {
            return Err(VaultError::WrongRoundState {
                round: self.id,
                expected: RoundState::OptionSettled,
                actual: self.state,
            });
        }
        if self.is_payout_claimed(&bidder) {
            return Err(VaultError::PayoutAlreadyClaimed {
                round: self.id,
                bidder,
            });
        }
        let amount = self.payout_of(&bidder)?;
        self.payouts_claimed.insert(bidder);
        tracing::debug!(round = %self.id, %bidder, amount, "payout claimed");
        Ok(amount)
    }

    // =====================================================================
    // Queries
    // =====================================================================

    #[must_use]
    pub fn id(&self) -> RoundId {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> RoundState {
        self.state
    }

    #[must_use]
    pub fn total_collateral(&self) -> Amount {
        self.total_collateral
    }

    #[must_use]
    pub fn params(&self) -> Option<&RoundParams> {
        self.params.as_ref()
    }

    #[must_use]
    pub fn clearing(&self) -> Option<&ClearingOutcome> {
        self.clearing.as_ref()
    }

    #[must_use]
    pub fn settlement(&self) -> Option<&RoundSettlement> {
        self.settlement.as_ref()
    }

    #[must_use]
    pub fn book(&self) -> &BidBook {
        &self.book
    }

    #[must_use]
    pub fn clearing_price(&self) -> Option<Amount> {
        self.clearing.as_ref().map(|c| c.clearing_price)
    }

    #[must_use]
    pub fn allocation_of(&self, bidder: &ActorId) -> OptionCount {
        self.clearing.as_ref().map_or(0, |c| c.allocation_of(bidder))
    }

    #[must_use]
    pub fn refund_of(&self, bidder: &ActorId) -> Amount {
        self.clearing.as_ref().map_or(0, |c| c.refund_of(bidder))
    }

    /// Options held times the per-option payout; zero before settlement.
    ///
    /// # Errors
    /// `ArithmeticOverflow` if the product does not fit.
    pub fn payout_of(&self, bidder: &ActorId) -> Result<Amount> {
        match &self.settlement {
            Some(s) => checked_mul(self.allocation_of(bidder), s.payout_per_option, "payout"),
            None => Ok(0),
        }
    }

    #[must_use]
    pub fn is_refund_claimed(&self, bidder: &ActorId) -> bool {
        self.refunds_claimed.contains(bidder)
    }

    #[must_use]
    pub fn is_payout_claimed(&self, bidder: &ActorId) -> bool {
        self.payouts_claimed.contains(bidder)
    }

    // =====================================================================
    // Internals
    // =====================================================================

    /// Step to the following state. Callers check the current one first.
    fn advance(&mut self) {
        if let Some(next) = self.state.next() {
            self.state = next;
        }
    }

    fn expect_state(&self, expected: RoundState) -> Result<()> {
        if self.state != expected {
            return Err(VaultError::WrongRoundState {
                round: self.id,
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    fn params_ref(&self) -> Result<&RoundParams> {
        self.params
            .as_ref()
            .ok_or_else(|| VaultError::Internal(format!("{} has no parameters", self.id)))
    }

    fn clearing_ref(&self) -> Result<&ClearingOutcome> {
        self.clearing
            .as_ref()
            .ok_or_else(|| VaultError::Internal(format!("{} has no clearing result", self.id)))
    }

    fn settlement_ref(&self) -> Result<&RoundSettlement> {
        self.settlement
            .as_ref()
            .ok_or_else(|| VaultError::Internal(format!("{} has no settlement", self.id)))
    }
}
