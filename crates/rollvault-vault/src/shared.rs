//! Thread-shared vault handle.
//!
//! Every mutation takes the write lock, so vault calls are serialized and
//! each one observes the state the previous one left. Auction clearing in
//! particular runs under the write lock: a bid racing with
//! `settle_auction` either lands before the book is sealed or is rejected
//! with `AuctionNotOpen`.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rollvault_types::{
    ActorId, Amount, BidReceipt, OptionCount, PositionId, Result, RoundId, RoundParams,
    RoundSettlement, RoundState,
};

use crate::vault::Vault;

/// Cloneable handle to a vault behind a `parking_lot` read-write lock.
#[derive(Clone)]
pub struct SharedVault {
    inner: Arc<RwLock<Vault>>,
}

impl SharedVault {
    #[must_use]
    pub fn new(vault: Vault) -> Self {
        Self {
            inner: Arc::new(RwLock::new(vault)),
        }
    }

    /// Shared access for queries.
    pub fn read(&self) -> RwLockReadGuard<'_, Vault> {
        self.inner.read()
    }

    /// Exclusive access. Hold the guard across several calls to make them
    /// one atomic step.
    pub fn write(&self) -> RwLockWriteGuard<'_, Vault> {
        self.inner.write()
    }

    pub fn open_position(&self, amount: Amount) -> Result<PositionId> {
        self.inner.write().open_position(amount)
    }

    pub fn deposit_more(&self, position_id: PositionId, amount: Amount) -> Result<()> {
        self.inner.write().deposit_more(position_id, amount)
    }

    pub fn withdraw(&self, position_id: PositionId, amount: Amount) -> Result<Amount> {
        self.inner.write().withdraw(position_id, amount)
    }

    pub fn start_auction(&self) -> Result<(RoundId, RoundParams)> {
        self.inner.write().start_auction()
    }

    pub fn place_bid(&self, amount: Amount, price: Amount) -> Result<BidReceipt> {
        self.inner.write().place_bid(amount, price)
    }

    pub fn settle_auction(&self) -> Result<Amount> {
        self.inner.write().settle_auction()
    }

    pub fn settle_round(&self, settlement_price: Amount) -> Result<RoundSettlement> {
        self.inner.write().settle_round(settlement_price)
    }

    pub fn claim_refund(&self, round_id: RoundId) -> Result<Amount> {
        self.inner.write().claim_refund(round_id)
    }

    pub fn claim_payout(&self, round_id: RoundId) -> Result<Amount> {
        self.inner.write().claim_payout(round_id)
    }

    #[must_use]
    pub fn balance_of(&self, position_id: PositionId) -> Amount {
        self.inner.read().balance_of(position_id)
    }

    pub fn allocation_of(&self, round_id: RoundId, bidder: &ActorId) -> Result<OptionCount> {
        self.inner.read().allocation_of(round_id, bidder)
    }

    pub fn round_state(&self, round_id: RoundId) -> Result<RoundState> {
        self.inner.read().round_state(round_id)
    }

    pub fn verify_integrity(&self) -> Result<()> {
        self.inner.read().verify_integrity()
    }
}

impl std::fmt::Debug for SharedVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SharedVault").field(&*self.inner.read()).finish()
    }
}
