//! Uniform-price clearing for the sealed-bid option auction.
//!
//! The engine is a pure function of a [`SealedBook`]: no clock, no storage,
//! no randomness. Clearing the same book twice yields identical outcomes,
//! down to the result hash.
//!
//! Algorithm:
//! 1. Bids priced below the reserve (or at zero) are removed and refunded in full.
//! 2. The rest are ordered by price descending, amount ascending, sequence ascending.
//! 3. Candidate prices are the distinct bid prices, highest first. The
//!    clearing price is the first candidate whose demand covers the supply,
//!    or the lowest candidate if none does.
//! 4. Walking the ordered bids, each bid priced at or above the clearing
//!    price takes `min(remaining, amount / clearing_price)` options and is
//!    refunded whatever it did not spend.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rollvault_types::{
    Amount, Bid, BidFill, ClearingOutcome, OptionCount, Result, SealedBook, VaultError,
    checked_add, checked_mul,
};

use crate::determinism::compute_result_hash;

/// Clearing order: price descending, then amount ascending, then sequence ascending.
#[must_use]
pub fn clearing_order(a: &Bid, b: &Bid) -> Ordering {
    b.price
        .cmp(&a.price)
        .then(a.amount.cmp(&b.amount))
        .then(a.sequence.cmp(&b.sequence))
}

/// Options demanded at `price` by every bid willing to pay it.
///
/// Each bid's contribution is capped at `supply`. The sum saturates, which
/// is harmless since it is only ever compared against `supply`.
#[must_use]
pub fn demand_at(bids: &[&Bid], price: Amount, supply: OptionCount) -> OptionCount {
    bids.iter()
        .filter(|b| b.is_eligible_at(price))
        .map(|b| b.units_at(price).min(supply))
        .fold(0, OptionCount::saturating_add)
}

/// Pick the clearing price for bids already in clearing order.
///
/// Demand never falls as the candidate price falls: more bids qualify and
/// each buys at least as many units. The first covering candidate is
/// therefore found by bisection, `O(n log n)` over the book.
///
/// Returns `None` only for an empty slice.
#[must_use]
pub fn compute_clearing_price(sorted: &[&Bid], supply: OptionCount) -> Option<Amount> {
    let lowest = sorted.last()?.price;
    let mut candidates: Vec<Amount> = sorted.iter().map(|b| b.price).collect();
    candidates.dedup();

    let first_covering = candidates.partition_point(|&p| demand_at(sorted, p, supply) < supply);
    Some(candidates.get(first_covering).copied().unwrap_or(lowest))
}

/// Clear a sealed book.
///
/// # Errors
/// - `NoBids` if the book holds no bids at all
/// - `ReserveNotMet` if every bid is priced below the reserve
/// - `ArithmeticOverflow` if premium or refund totals overflow
pub fn clear_sealed_book(book: &SealedBook) -> Result<ClearingOutcome> {
    let supply = book.total_options;
    let reserve = book.reserve_price;

    let (mut eligible, removed): (Vec<&Bid>, Vec<&Bid>) = book
        .bids
        .iter()
        .partition(|b| b.price > 0 && b.price >= reserve);

    if eligible.is_empty() {
        if book.bids.is_empty() {
            tracing::warn!(round = %book.round_id, "clearing found no bids");
            return Err(VaultError::NoBids);
        }
        tracing::warn!(
            round = %book.round_id,
            reserve,
            bids = book.bids.len(),
            "no bid meets the reserve price"
        );
        return Err(VaultError::ReserveNotMet { reserve });
    }

    eligible.sort_by(|a, b| clearing_order(a, b));
    let clearing_price = compute_clearing_price(&eligible, supply)
        .ok_or_else(|| VaultError::Internal("eligible bids vanished".into()))?;

    let mut fills = Vec::with_capacity(book.bids.len());
    let mut remaining = supply;
    for bid in &eligible {
        let options = if bid.is_eligible_at(clearing_price) {
            remaining.min(bid.units_at(clearing_price))
        } else {
            0
        };
        remaining -= options;
        // options <= amount / clearing_price, so the product never exceeds amount.
        let spent = options * clearing_price;
        fills.push(BidFill {
            sequence: bid.sequence,
            bidder: bid.bidder,
            options,
            refund: bid.amount - spent,
        });
    }
    for bid in &removed {
        tracing::debug!(
            round = %book.round_id,
            sequence = bid.sequence,
            price = bid.price,
            reserve,
            "bid removed below reserve"
        );
        fills.push(BidFill {
            sequence: bid.sequence,
            bidder: bid.bidder,
            options: 0,
            refund: bid.amount,
        });
    }

    let mut allocations: BTreeMap<_, OptionCount> = BTreeMap::new();
    let mut refunds: BTreeMap<_, Amount> = BTreeMap::new();
    for fill in &fills {
        if fill.options > 0 {
            let slot = allocations.entry(fill.bidder).or_default();
            *slot = checked_add(*slot, fill.options, "allocation total")?;
        }
        if fill.refund > 0 {
            let slot = refunds.entry(fill.bidder).or_default();
            *slot = checked_add(*slot, fill.refund, "refund total")?;
        }
    }

    let options_sold = supply - remaining;
    let total_premium = checked_mul(options_sold, clearing_price, "total premium")?;
    let result_hash = compute_result_hash(book.round_id, clearing_price, &fills);

    tracing::info!(
        round = %book.round_id,
        clearing_price,
        options_sold,
        unsold_options = remaining,
        total_premium,
        winners = allocations.len(),
        removed = removed.len(),
        "auction cleared"
    );

    Ok(ClearingOutcome {
        round_id: book.round_id,
        clearing_price,
        allocations,
        refunds,
        fills,
        removed: removed.iter().map(|b| b.sequence).collect(),
        options_sold,
        unsold_options: remaining,
        total_premium,
        book_hash: book.book_hash,
        result_hash,
    })
}

#[cfg(test)]
mod tests {
    use rollvault_types::{ActorId, RoundId};

    use super::*;
    use crate::sealer::seal_bids;

    fn book(bids: Vec<Bid>, supply: OptionCount, reserve: Amount) -> SealedBook {
        seal_bids(RoundId(1), bids, supply, reserve)
    }

    fn fill_for(outcome: &ClearingOutcome, sequence: u64) -> &BidFill {
        outcome.fills.iter().find(|f| f.sequence == sequence).unwrap()
    }

    #[test]
    fn clearing_order_sorts_price_amount_sequence() {
        let mut bids = [
            Bid::dummy(50, 10, 0),
            Bid::dummy(20, 10, 1),
            Bid::dummy(20, 10, 2),
            Bid::dummy(5, 30, 3),
        ];
        bids.sort_by(clearing_order);
        let seqs: Vec<u64> = bids.iter().map(|b| b.sequence).collect();
        assert_eq!(seqs, vec![3, 1, 2, 0]);
    }

    #[test]
    fn demand_caps_each_bid_at_supply() {
        let a = Bid::dummy(1_000, 1, 0);
        let b = Bid::dummy(10, 5, 1);
        let bids = vec![&a, &b];
        // a alone wants 1000 but is capped at 100.
        assert_eq!(demand_at(&bids, 1, 100), 110);
        // a's price of 1 excludes it at 5.
        assert_eq!(demand_at(&bids, 5, 100), 2);
    }

    #[test]
    fn reference_scenario_clears_at_lowest_price() {
        let bids = vec![
            Bid::dummy(25, 2, 1),
            Bid::dummy(25, 3, 2),
            Bid::dummy(25, 4, 3),
            Bid::dummy(10_000, 10, 4),
            Bid::dummy(25, 5, 5),
            Bid::dummy(5, 22, 6),
        ];
        let outcome = clear_sealed_book(&book(bids, 12_500, 9)).unwrap();

        assert_eq!(outcome.clearing_price, 10);
        assert_eq!(outcome.removed, vec![1, 2, 3, 5]);
        assert_eq!(fill_for(&outcome, 4).options, 1_000);
        assert_eq!(fill_for(&outcome, 4).refund, 0);
        // Bid 6 cannot afford one option at 10.
        assert_eq!(fill_for(&outcome, 6).options, 0);
        assert_eq!(fill_for(&outcome, 6).refund, 5);
        for seq in [1, 2, 3, 5] {
            assert_eq!(fill_for(&outcome, seq).refund, 25);
        }
        assert_eq!(outcome.options_sold, 1_000);
        assert_eq!(outcome.unsold_options, 11_500);
        assert_eq!(outcome.total_premium, 10_000);
    }

    #[test]
    fn first_price_meeting_supply_wins() {
        let bids = vec![
            Bid::dummy(50, 20, 1),
            Bid::dummy(142, 11, 2),
            Bid::dummy(235, 11, 3),
            Bid::dummy(222, 2, 4),
            Bid::dummy(75, 1, 5),
            Bid::dummy(35, 1, 6),
        ];
        let outcome = clear_sealed_book(&book(bids, 200, 2)).unwrap();

        assert_eq!(outcome.clearing_price, 2);
        assert_eq!(outcome.removed, vec![5, 6]);
        assert_eq!(fill_for(&outcome, 1).options, 25);
        assert_eq!(fill_for(&outcome, 2).options, 71);
        assert_eq!(fill_for(&outcome, 3).options, 104);
        assert_eq!(fill_for(&outcome, 3).refund, 27);
        assert_eq!(fill_for(&outcome, 4).options, 0);
        assert_eq!(fill_for(&outcome, 4).refund, 222);
        assert_eq!(outcome.unsold_options, 0);
        assert_eq!(outcome.total_premium, 400);
    }

    #[test]
    fn higher_price_clears_when_demand_is_deep() {
        let bids = vec![Bid::dummy(1_000, 10, 0), Bid::dummy(1_000, 5, 1)];
        let outcome = clear_sealed_book(&book(bids, 50, 1)).unwrap();
        assert_eq!(outcome.clearing_price, 10);
        assert_eq!(fill_for(&outcome, 0).options, 50);
        assert_eq!(fill_for(&outcome, 0).refund, 500);
        assert_eq!(fill_for(&outcome, 1).options, 0);
        assert_eq!(fill_for(&outcome, 1).refund, 1_000);
    }

    #[test]
    fn equal_price_smaller_amount_goes_first() {
        let big = Bid::dummy(100, 10, 0);
        let small = Bid::dummy(50, 10, 1);
        let outcome = clear_sealed_book(&book(vec![big, small], 10, 1)).unwrap();
        assert_eq!(outcome.clearing_price, 10);
        assert_eq!(fill_for(&outcome, 1).options, 5);
        assert_eq!(fill_for(&outcome, 0).options, 5);
        assert_eq!(fill_for(&outcome, 0).refund, 50);
    }

    #[test]
    fn identical_bids_break_ties_by_sequence() {
        let outcome =
            clear_sealed_book(&book(vec![Bid::dummy(60, 10, 7), Bid::dummy(60, 10, 3)], 8, 1))
                .unwrap();
        assert_eq!(fill_for(&outcome, 3).options, 6);
        assert_eq!(fill_for(&outcome, 7).options, 2);
    }

    #[test]
    fn allocations_aggregate_per_bidder() {
        let alice = ActorId::new();
        let bids = vec![
            Bid::dummy_for(alice, 30, 3, 0),
            Bid::dummy_for(alice, 31, 3, 1),
        ];
        let outcome = clear_sealed_book(&book(bids, 1_000, 1)).unwrap();
        assert_eq!(outcome.clearing_price, 3);
        assert_eq!(outcome.allocation_of(&alice), 20);
        assert_eq!(outcome.refund_of(&alice), 1);
    }

    #[test]
    fn empty_book_is_no_bids() {
        let err = clear_sealed_book(&book(vec![], 10, 1)).unwrap_err();
        assert!(matches!(err, VaultError::NoBids));
    }

    #[test]
    fn all_below_reserve_is_reserve_not_met() {
        let bids = vec![Bid::dummy(10, 1, 0), Bid::dummy(10, 2, 1)];
        let err = clear_sealed_book(&book(bids, 10, 5)).unwrap_err();
        assert!(matches!(err, VaultError::ReserveNotMet { reserve: 5 }));
    }

    #[test]
    fn zero_supply_sells_nothing() {
        let outcome = clear_sealed_book(&book(vec![Bid::dummy(10, 2, 0)], 0, 1)).unwrap();
        assert_eq!(outcome.options_sold, 0);
        assert_eq!(outcome.total_premium, 0);
        assert_eq!(fill_for(&outcome, 0).refund, 10);
    }

    #[test]
    fn clearing_is_deterministic() {
        let bids = vec![
            Bid::dummy(100, 7, 0),
            Bid::dummy(80, 9, 1),
            Bid::dummy(60, 3, 2),
        ];
        let sealed = book(bids, 20, 2);
        let a = clear_sealed_book(&sealed).unwrap();
        let b = clear_sealed_book(&sealed).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.book_hash, sealed.book_hash);
    }
}
