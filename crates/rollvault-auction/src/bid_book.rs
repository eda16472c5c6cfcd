//! Bid book for one round's sealed-bid auction.
//!
//! Bids that pass admission are stored in submission order, keyed by their
//! per-round sequence number. When the auction ends the round takes a
//! [`SealedBook`] snapshot for clearing and then freezes the book so no
//! further bids are accepted.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rollvault_types::{
    ActorId, Amount, Bid, OptionCount, Result, RoundId, RoundState, SealedBook, VaultError,
    constants,
};

use crate::sealer;

/// Admission rules fixed when the auction opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BidRules {
    pub reserve_price: Amount,
    pub minimum_bid_amount: Amount,
    /// Bids at or after this instant are rejected.
    pub auction_end_time: DateTime<Utc>,
}

/// Collects bids for one round.
#[derive(Debug, Clone)]
pub struct BidBook {
    round_id: RoundId,
    /// Accepted bids keyed by sequence.
    bids: BTreeMap<u64, Bid>,
    next_sequence: u64,
    /// `None` until the auction opens.
    rules: Option<BidRules>,
    frozen: bool,
    max_bids: usize,
}

impl BidBook {
    #[must_use]
    pub fn new(round_id: RoundId) -> Self {
        Self::with_capacity(round_id, constants::MAX_BIDS_PER_ROUND)
    }

    /// Create a book that refuses bids past `max_bids`.
    #[must_use]
    pub fn with_capacity(round_id: RoundId, max_bids: usize) -> Self {
        Self {
            round_id,
            bids: BTreeMap::new(),
            next_sequence: 0,
            rules: None,
            frozen: false,
            max_bids,
        }
    }

    /// The auction phase this book is in, as seen by bidders.
    #[must_use]
    pub fn phase(&self) -> RoundState {
        match (self.rules, self.frozen) {
            (None, _) => RoundState::Initialized,
            (Some(_), false) => RoundState::AuctionOpen,
            (Some(_), true) => RoundState::AuctionSettled,
        }
    }

    /// Start accepting bids under `rules`.
    ///
    /// # Errors
    /// `WrongRoundState` if the book was already opened.
    pub fn open(&mut self, rules: BidRules) -> Result<()> {
        if self.rules.is_some() {
            return Err(VaultError::WrongRoundState {
                round: self.round_id,
                expected: RoundState::Initialized,
                actual: self.phase(),
            });
        }
        self.rules = Some(rules);
        tracing::debug!(
            round = %self.round_id,
            reserve_price = rules.reserve_price,
            minimum_bid_amount = rules.minimum_bid_amount,
            ends_at = %rules.auction_end_time,
            "bid book opened"
        );
        Ok(())
    }

    /// Validate and record a bid.
    ///
    /// Checks run in a fixed order: book open, auction window, non-zero
    /// inputs, reserve price, minimum amount, capacity. A rejected bid
    /// leaves the book untouched.
    ///
    /// # Errors
    /// `AuctionNotOpen`, `AuctionExpired`, `InvalidBid`,
    /// `BelowReservePrice`, `BelowMinimumBid` or `BookFull`.
    pub fn submit(
        &mut self,
        bidder: ActorId,
        amount: Amount,
        price: Amount,
        now: DateTime<Utc>,
    ) -> Result<&Bid> {
        let rules = match self.rules {
            Some(rules) if !self.frozen => rules,
            _ => {
                return Err(VaultError::AuctionNotOpen {
                    round: self.round_id,
                    state: self.phase(),
                });
            }
        };
        if now >= rules.auction_end_time {
            return Err(VaultError::AuctionExpired {
                round: self.round_id,
                ended_at: rules.auction_end_time,
            });
        }
        if amount == 0 {
            return Err(VaultError::InvalidBid {
                reason: "amount must be positive".into(),
            });
        }
        if price == 0 {
            return Err(VaultError::InvalidBid {
                reason: "price must be positive".into(),
            });
        }
        if price < rules.reserve_price {
            return Err(VaultError::BelowReservePrice {
                price,
                reserve: rules.reserve_price,
            });
        }
        if amount < rules.minimum_bid_amount {
            return Err(VaultError::BelowMinimumBid {
                amount,
                minimum: rules.minimum_bid_amount,
            });
        }
        if self.bids.len() >= self.max_bids {
            return Err(VaultError::BookFull(self.round_id));
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let bid = Bid {
            bidder,
            round_id: self.round_id,
            amount,
            price,
            sequence,
            placed_at: now,
        };
        tracing::debug!(
            round = %self.round_id,
            %bidder,
            amount,
            price,
            sequence,
            "bid accepted"
        );
        Ok(self.bids.entry(sequence).or_insert(bid))
    }

    /// Snapshot the current bids for clearing.
    ///
    /// The snapshot does not freeze the book; the caller freezes it once
    /// the clearing result has been committed.
    ///
    /// # Errors
    /// `AuctionNotOpen` if the book was never opened.
    pub fn seal(&self, total_options: OptionCount) -> Result<SealedBook> {
        let rules = self.rules.ok_or(VaultError::AuctionNotOpen {
            round: self.round_id,
            state: RoundState::Initialized,
        })?;
        Ok(sealer::seal_bids(
            self.round_id,
            self.bids.values().cloned().collect(),
            total_options,
            rules.reserve_price,
        ))
    }

    /// Stop accepting bids. Returns `false` if already frozen.
    pub fn freeze(&mut self) -> bool {
        if self.frozen {
            return false;
        }
        self.frozen = true;
        tracing::debug!(round = %self.round_id, bids = self.bids.len(), "bid book frozen");
        true
    }

    #[must_use]
    pub fn round_id(&self) -> RoundId {
        self.round_id
    }

    #[must_use]
    pub fn rules(&self) -> Option<BidRules> {
        self.rules
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty()
    }

    #[must_use]
    pub fn get(&self, sequence: u64) -> Option<&Bid> {
        self.bids.get(&sequence)
    }

    /// Bids in submission order.
    pub fn iter(&self) -> impl Iterator<Item = &Bid> {
        self.bids.values()
    }

    /// All bids placed by `bidder`, in submission order.
    pub fn bids_of<'a>(&'a self, bidder: &'a ActorId) -> impl Iterator<Item = &'a Bid> + 'a {
        self.bids.values().filter(move |b| b.bidder == *bidder)
    }

    /// Sum of every accepted bid amount. Saturates instead of overflowing.
    #[must_use]
    pub fn total_amount(&self) -> Amount {
        self.bids
            .values()
            .fold(0, |acc: Amount, b| acc.saturating_add(b.amount))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn open_book(reserve: Amount, minimum: Amount) -> (BidBook, DateTime<Utc>) {
        let now = Utc::now();
        let mut book = BidBook::new(RoundId(1));
        book.open(BidRules {
            reserve_price: reserve,
            minimum_bid_amount: minimum,
            auction_end_time: now + TimeDelta::hours(1),
        })
        .unwrap();
        (book, now)
    }

    #[test]
    fn submit_assigns_increasing_sequences() {
        let (mut book, now) = open_book(1, 1);
        let alice = ActorId::new();
        let first = book.submit(alice, 10, 2, now).unwrap().sequence;
        let second = book.submit(alice, 20, 3, now).unwrap().sequence;
        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert_eq!(book.len(), 2);
        assert_eq!(book.total_amount(), 30);
        assert_eq!(book.bids_of(&alice).count(), 2);
    }

    #[test]
    fn rejects_before_open() {
        let mut book = BidBook::new(RoundId(3));
        let err = book.submit(ActorId::new(), 10, 10, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            VaultError::AuctionNotOpen {
                state: RoundState::Initialized,
                ..
            }
        ));
    }

    #[test]
    fn rejects_after_freeze() {
        let (mut book, now) = open_book(1, 1);
        assert!(book.freeze());
        assert!(!book.freeze());
        let err = book.submit(ActorId::new(), 10, 10, now).unwrap_err();
        assert!(matches!(
            err,
            VaultError::AuctionNotOpen {
                state: RoundState::AuctionSettled,
                ..
            }
        ));
    }

    #[test]
    fn rejects_at_auction_end() {
        let (mut book, now) = open_book(1, 1);
        let err = book
            .submit(ActorId::new(), 10, 10, now + TimeDelta::hours(1))
            .unwrap_err();
        assert!(matches!(err, VaultError::AuctionExpired { .. }));
    }

    #[test]
    fn rejects_zero_inputs() {
        let (mut book, now) = open_book(0, 0);
        assert!(matches!(
            book.submit(ActorId::new(), 0, 10, now).unwrap_err(),
            VaultError::InvalidBid { .. }
        ));
        assert!(matches!(
            book.submit(ActorId::new(), 10, 0, now).unwrap_err(),
            VaultError::InvalidBid { .. }
        ));
        assert!(book.is_empty());
    }

    #[test]
    fn rejects_below_reserve_then_minimum() {
        let (mut book, now) = open_book(9, 100);
        // Both rules violated: reserve is checked first.
        let err = book.submit(ActorId::new(), 50, 8, now).unwrap_err();
        assert!(matches!(
            err,
            VaultError::BelowReservePrice {
                price: 8,
                reserve: 9
            }
        ));
        let err = book.submit(ActorId::new(), 50, 9, now).unwrap_err();
        assert!(matches!(
            err,
            VaultError::BelowMinimumBid {
                amount: 50,
                minimum: 100
            }
        ));
        assert_eq!(book.next_sequence, 0);
    }

    #[test]
    fn capacity_is_enforced() {
        let now = Utc::now();
        let mut book = BidBook::with_capacity(RoundId(1), 2);
        book.open(BidRules {
            reserve_price: 1,
            minimum_bid_amount: 1,
            auction_end_time: now + TimeDelta::minutes(5),
        })
        .unwrap();
        book.submit(ActorId::new(), 5, 1, now).unwrap();
        book.submit(ActorId::new(), 5, 1, now).unwrap();
        let err = book.submit(ActorId::new(), 5, 1, now).unwrap_err();
        assert!(matches!(err, VaultError::BookFull(RoundId(1))));
    }

    #[test]
    fn double_open_fails() {
        let (mut book, now) = open_book(1, 1);
        let err = book
            .open(BidRules {
                reserve_price: 2,
                minimum_bid_amount: 2,
                auction_end_time: now,
            })
            .unwrap_err();
        assert!(matches!(err, VaultError::WrongRoundState { .. }));
        assert_eq!(book.rules().unwrap().reserve_price, 1);
    }

    #[test]
    fn seal_snapshots_in_submission_order() {
        let (mut book, now) = open_book(2, 1);
        book.submit(ActorId::new(), 30, 5, now).unwrap();
        book.submit(ActorId::new(), 10, 9, now).unwrap();
        let sealed = book.seal(100).unwrap();
        assert_eq!(sealed.round_id, RoundId(1));
        assert_eq!(sealed.total_options, 100);
        assert_eq!(sealed.reserve_price, 2);
        let seqs: Vec<u64> = sealed.bids.iter().map(|b| b.sequence).collect();
        assert_eq!(seqs, vec![0, 1]);
        assert!(sealer::verify_book_hash(&sealed));
        // Sealing does not freeze.
        assert!(!book.is_frozen());
    }

    #[test]
    fn seal_requires_open_book() {
        let book = BidBook::new(RoundId(1));
        assert!(book.seal(10).is_err());
    }
}
