//! Vault orchestration.
//!
//! The vault owns one [`OptionRound`] per round id and the
//! [`PositionLedger`]. Liquidity always lands in the *next* round, the one
//! still INITIALIZED; bids always go to the *current* round, the one whose
//! auction last started.
//!
//! Lifecycle of round N:
//! 1. Deposits accumulate in N while it is the next round.
//! 2. `start_auction` snapshots N's collateral, opens its auction, rolls
//!    every position forward onto N+1 and creates N+1.
//! 3. `settle_auction` clears N's bids.
//! 4. `settle_round` pays out N's options and releases what is left,
//!    premium included, onto the positions' live entries in N+1.

use std::collections::BTreeMap;
use std::sync::Arc;

use rollvault_ledger::{CollateralAudit, PositionLedger};
use rollvault_types::{
    ActorId, Amount, BidReceipt, IdentitySource, MarketStatsSource, OptionCount, PositionId,
    Result, RoundId, RoundParams, RoundSettlement, RoundState, TimeSource, VaultConfig,
    VaultError, checked_add, constants,
};

use crate::round::OptionRound;

/// Single-writer options vault.
pub struct Vault {
    config: VaultConfig,
    clock: Arc<dyn TimeSource>,
    identity: Arc<dyn IdentitySource>,
    market: Arc<dyn MarketStatsSource>,
    rounds: BTreeMap<RoundId, OptionRound>,
    /// Round whose auction started last; `None` before the first auction.
    current_round_id: Option<RoundId>,
    next_round_id: RoundId,
    ledger: PositionLedger,
    audit: CollateralAudit,
}

impl Vault {
    /// Create a vault with round 1 ready to take liquidity.
    ///
    /// # Errors
    /// `Configuration` if `config` does not validate.
    pub fn new(
        config: VaultConfig,
        clock: Arc<dyn TimeSource>,
        identity: Arc<dyn IdentitySource>,
        market: Arc<dyn MarketStatsSource>,
    ) -> Result<Self> {
        config.validate()?;
        let first = RoundId(constants::FIRST_ROUND_ID);
        let mut rounds = BTreeMap::new();
        rounds.insert(first, OptionRound::new(first, config.max_bids_per_round));
        tracing::info!(
            strategy = %config.strike_strategy,
            cap_level_bps = config.cap_level_bps,
            reserve_price_bps = config.reserve_price_bps,
            "vault created"
        );
        Ok(Self {
            ledger: PositionLedger::new(config.min_deposit_amount),
            audit: CollateralAudit::new(),
            config,
            clock,
            identity,
            market,
            rounds,
            current_round_id: None,
            next_round_id: first,
        })
    }

    // =====================================================================
    // Liquidity
    // =====================================================================

    /// Open a position for the caller with `amount` in the next round.
    ///
    /// # Errors
    /// `InvalidAmount` or `BelowMinimumDeposit`.
    pub fn open_position(&mut self, amount: Amount) -> Result<PositionId> {
        let caller = self.identity.current_caller();
        let next = self.next_round_id;
        self.expect_accepting(next)?;

        let id = self.ledger.open(caller, amount, next)?;
        self.round_mut(next)?.add_collateral(amount)?;
        self.audit.record_deposit(amount);

        tracing::info!(position = %id, depositor = %caller, amount, round = %next, "position opened");
        Ok(id)
    }

    /// Add `amount` to one of the caller's positions.
    ///
    /// # Errors
    /// `PositionNotFound`, `NotPositionOwner`, `InvalidAmount` or
    /// `BelowMinimumDeposit`.
    pub fn deposit_more(&mut self, position_id: PositionId, amount: Amount) -> Result<()> {
        self.expect_owner(position_id)?;
        let next = self.next_round_id;
        self.expect_accepting(next)?;

        self.ledger.deposit_more(position_id, amount, next)?;
        self.round_mut(next)?.add_collateral(amount)?;
        self.audit.record_deposit(amount);

        tracing::info!(position = %position_id, amount, round = %next, "liquidity added");
        Ok(())
    }

    /// Withdraw unallocated liquidity from one of the caller's positions.
    /// Returns the unallocated amount left on the position.
    ///
    /// # Errors
    /// `PositionNotFound`, `NotPositionOwner`, `InvalidAmount` or
    /// `InsufficientBalance` beyond the unallocated amount.
    pub fn withdraw(&mut self, position_id: PositionId, amount: Amount) -> Result<Amount> {
        self.expect_owner(position_id)?;
        let next = self.next_round_id;
        self.expect_accepting(next)?;

        let left = self.ledger.withdraw(position_id, amount)?;
        self.round_mut(next)?.remove_collateral(amount)?;
        self.audit.record_withdrawal(amount);

        tracing::info!(position = %position_id, amount, left, round = %next, "liquidity withdrawn");
        Ok(left)
    }

    // =====================================================================
    // Round lifecycle
    // =====================================================================

    /// Start the next round's auction.
    ///
    /// # Errors
    /// `WrongRoundState` while the current round's options are unsettled,
    /// `InsufficientCollateral` or `InvalidRoundParams` from the round.
    pub fn start_auction(&mut self) -> Result<(RoundId, RoundParams)> {
        if let Some(current) = self.current_round_id {
            let state = self.round_ref(current)?.state();
            if state != RoundState::OptionSettled {
                return Err(VaultError::WrongRoundState {
                    round: current,
                    expected: RoundState::OptionSettled,
                    actual: state,
                });
            }
        }

        let id = self.next_round_id;
        let following = id.next();
        let now = self.clock.now();
        let market = self.market.snapshot();
        let ledger_total = self.ledger.round_total(id);

        let config = &self.config;
        let round = self
            .rounds
            .get_mut(&id)
            .ok_or(VaultError::RoundNotFound(id))?;
        if round.total_collateral() != ledger_total {
            return Err(VaultError::CollateralInvariantViolation {
                reason: format!(
                    "{id} holds {} but ledger holds {ledger_total}",
                    round.total_collateral()
                ),
            });
        }
        let params = round.start_auction(config, market, now)?.clone();

        let rolled = self.ledger.roll_forward(id, following)?;
        self.rounds.insert(
            following,
            OptionRound::new(following, self.config.max_bids_per_round),
        );
        self.current_round_id = Some(id);
        self.next_round_id = following;

        tracing::info!(round = %id, next = %following, positions = rolled, "round advanced");
        Ok((id, params))
    }

    /// Place a bid for the caller in the current auction.
    ///
    /// # Errors
    /// `NoActiveRound` before the first auction, `AuctionNotOpen` once it is
    /// settled, and every bid validation error.
    pub fn place_bid(&mut self, amount: Amount, price: Amount) -> Result<BidReceipt> {
        let caller = self.identity.current_caller();
        let now = self.clock.now();
        let current = self.current_round_id.ok_or(VaultError::NoActiveRound)?;
        self.round_mut(current)?.place_bid(caller, amount, price, now)
    }

    /// Clear the current auction and return its clearing price.
    ///
    /// A round that already cleared returns its stored price.
    ///
    /// # Errors
    /// `NoActiveRound`, `AuctionNotYetExpired`, `NoBids` or `ReserveNotMet`.
    pub fn settle_auction(&mut self) -> Result<Amount> {
        let current = self.current_round_id.ok_or(VaultError::NoActiveRound)?;
        let now = self.clock.now();
        let round = self.round_mut(current)?;
        if let Some(price) = round.clearing_price() {
            return Ok(price);
        }
        Ok(round.settle_auction(now)?.clearing_price)
    }

    /// Settle the current round's options at `settlement_price`.
    ///
    /// Audits conservation against the post-release liquidity, then
    /// releases the round's remaining collateral onto the next round. A
    /// failed audit changes nothing. A settled round returns its stored
    /// summary.
    ///
    /// # Errors
    /// `NoActiveRound`, `WrongRoundState` before the auction settles,
    /// `OptionNotYetExpired`, or `CollateralInvariantViolation` if the audit
    /// fails.
    pub fn settle_round(&mut self, settlement_price: Amount) -> Result<RoundSettlement> {
        let current = self.current_round_id.ok_or(VaultError::NoActiveRound)?;
        let next = self.next_round_id;
        let now = self.clock.now();

        let round = self.round_ref(current)?;
        if let Some(settled) = round.settlement() {
            return Ok(settled.clone());
        }
        let settlement = round.preview_settlement(settlement_price, now)?;
        let round_total = round.total_collateral();
        self.expect_accepting(next)?;
        checked_add(
            self.round_ref(next)?.total_collateral(),
            settlement.remaining_collateral,
            "round collateral",
        )?;

        // Releasing swaps the round's total for its remaining collateral.
        let liquidity_after = self
            .ledger
            .total_liquidity()
            .checked_sub(round_total)
            .and_then(|held| held.checked_add(settlement.remaining_collateral))
            .ok_or_else(|| VaultError::CollateralInvariantViolation {
                reason: format!("ledger cannot release {round_total} for {current}"),
            })?;
        let mut audit = self.audit.clone();
        audit.record_premium(settlement.total_premium);
        audit.record_payout(settlement.total_payout);
        audit.verify(liquidity_after)?;

        let released = self.ledger.release(
            current,
            next,
            round_total,
            settlement.remaining_collateral,
        )?;
        let settlement = self.round_mut(current)?.commit_settlement(settlement)?.clone();
        self.round_mut(next)?.add_collateral(released.credited)?;
        self.audit = audit;

        tracing::info!(
            round = %current,
            next = %next,
            remaining = settlement.remaining_collateral,
            credited = released.credited,
            dust = released.dust,
            "round settled"
        );
        Ok(settlement)
    }

    // =====================================================================
    // Claims
    // =====================================================================

    /// Claim the caller's unspent bid amount in `round_id`.
    ///
    /// # Errors
    /// `RoundNotFound`, `WrongRoundState` or `RefundAlreadyClaimed`.
    pub fn claim_refund(&mut self, round_id: RoundId) -> Result<Amount> {
        let caller = self.identity.current_caller();
        self.round_mut(round_id)?.claim_refund(caller)
    }

    /// Claim the caller's option payout in `round_id`.
    ///
    /// # Errors
    /// `RoundNotFound`, `WrongRoundState` or `PayoutAlreadyClaimed`.
    pub fn claim_payout(&mut self, round_id: RoundId) -> Result<Amount> {
        let caller = self.identity.current_caller();
        self.round_mut(round_id)?.claim_payout(caller)
    }

    // =====================================================================
    // Queries
    // =====================================================================

    /// Locked plus unallocated liquidity of a position.
    #[must_use]
    pub fn balance_of(&self, position_id: PositionId) -> Amount {
        self.ledger.balance_of(position_id)
    }

    /// Liquidity of a position locked as collateral in a running round.
    #[must_use]
    pub fn collateral_balance_of(&self, position_id: PositionId) -> Amount {
        self.ledger.locked_balance_of(position_id)
    }

    #[must_use]
    pub fn unallocated_balance_of(&self, position_id: PositionId) -> Amount {
        self.ledger.unallocated_balance_of(position_id)
    }

    /// A position's pro-rata share of the premium `round_id` earned.
    ///
    /// # Errors
    /// `RoundNotFound` or `ArithmeticOverflow`.
    pub fn premium_balance_of(&self, position_id: PositionId, round_id: RoundId) -> Result<Amount> {
        let premium = self
            .round_ref(round_id)?
            .clearing()
            .map_or(0, |c| c.total_premium);
        self.ledger.share_of(position_id, round_id, premium)
    }

    /// # Errors
    /// `RoundNotFound`.
    pub fn allocation_of(&self, round_id: RoundId, bidder: &ActorId) -> Result<OptionCount> {
        Ok(self.round_ref(round_id)?.allocation_of(bidder))
    }

    /// # Errors
    /// `RoundNotFound`.
    pub fn refund_of(&self, round_id: RoundId, bidder: &ActorId) -> Result<Amount> {
        Ok(self.round_ref(round_id)?.refund_of(bidder))
    }

    /// # Errors
    /// `RoundNotFound` or `ArithmeticOverflow`.
    pub fn payout_of(&self, round_id: RoundId, bidder: &ActorId) -> Result<Amount> {
        self.round_ref(round_id)?.payout_of(bidder)
    }

    /// # Errors
    /// `RoundNotFound`.
    pub fn is_refund_claimed(&self, round_id: RoundId, bidder: &ActorId) -> Result<bool> {
        Ok(self.round_ref(round_id)?.is_refund_claimed(bidder))
    }

    /// # Errors
    /// `RoundNotFound`.
    pub fn is_payout_claimed(&self, round_id: RoundId, bidder: &ActorId) -> Result<bool> {
        Ok(self.round_ref(round_id)?.is_payout_claimed(bidder))
    }

    /// # Errors
    /// `RoundNotFound`.
    pub fn round_state(&self, round_id: RoundId) -> Result<RoundState> {
        Ok(self.round_ref(round_id)?.state())
    }

    /// # Errors
    /// `RoundNotFound`.
    pub fn round_params(&self, round_id: RoundId) -> Result<Option<&RoundParams>> {
        Ok(self.round_ref(round_id)?.params())
    }

    /// # Errors
    /// `RoundNotFound`.
    pub fn clearing_price(&self, round_id: RoundId) -> Result<Option<Amount>> {
        Ok(self.round_ref(round_id)?.clearing_price())
    }

    #[must_use]
    pub fn round(&self, round_id: RoundId) -> Option<&OptionRound> {
        self.rounds.get(&round_id)
    }

    #[must_use]
    pub fn current_round_id(&self) -> Option<RoundId> {
        self.current_round_id
    }

    #[must_use]
    pub fn next_round_id(&self) -> RoundId {
        self.next_round_id
    }

    /// Liquidity free to withdraw across all positions.
    #[must_use]
    pub fn total_unallocated_liquidity(&self) -> Amount {
        self.ledger.round_total(self.next_round_id)
    }

    #[must_use]
    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    #[must_use]
    pub fn audit(&self) -> &CollateralAudit {
        &self.audit
    }

    #[must_use]
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Walk every ledger chain and re-run the conservation audit.
    ///
    /// # Errors
    /// `LedgerChainBroken` or `CollateralInvariantViolation`.
    pub fn verify_integrity(&self) -> Result<()> {
        self.ledger.verify_all(self.next_round_id)?;
        self.audit.verify(self.ledger.total_liquidity())
    }

    // =====================================================================
    // Internals
    // =====================================================================

    fn round_ref(&self, id: RoundId) -> Result<&OptionRound> {
        self.rounds.get(&id).ok_or(VaultError::RoundNotFound(id))
    }

    fn round_mut(&mut self, id: RoundId) -> Result<&mut OptionRound> {
        self.rounds.get_mut(&id).ok_or(VaultError::RoundNotFound(id))
    }

    /// The next round must still be taking liquidity.
    fn expect_accepting(&self, id: RoundId) -> Result<()> {
        let state = self.round_ref(id)?.state();
        if state != RoundState::Initialized {
            return Err(VaultError::WrongRoundState {
                round: id,
                expected: RoundState::Initialized,
                actual: state,
            });
        }
        Ok(())
    }

    fn expect_owner(&self, position_id: PositionId) -> Result<()> {
        let caller = self.identity.current_caller();
        let position = self
            .ledger
            .position(position_id)
            .ok_or(VaultError::PositionNotFound(position_id))?;
        if position.depositor != caller {
            tracing::warn!(position = %position_id, %caller, "caller does not own position");
            return Err(VaultError::NotPositionOwner {
                position: position_id,
                caller,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("current_round_id", &self.current_round_id)
            .field("next_round_id", &self.next_round_id)
            .field("rounds", &self.rounds.len())
            .field("positions", &self.ledger.position_count())
            .finish_non_exhaustive()
    }
}
