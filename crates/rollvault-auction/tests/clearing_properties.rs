//! Integration test: clearing properties over randomized books.
//!
//! Books are generated from a fixed seed and driven through the public
//! `BidBook` admission path before clearing, so every property below holds
//! for bids the vault would actually accept.

use std::time::{Duration, Instant};

use chrono::{TimeDelta, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rollvault_auction::{
    BidBook, BidRules, clear_sealed_book, clearing_order, compute_clearing_price, demand_at,
    seal_bids, verify_book_hash,
};
use rollvault_types::*;

const SEED: u64 = 0x5eed_0f_a0c7;

fn random_book(rng: &mut StdRng, round: u64) -> SealedBook {
    let now = Utc::now();
    let reserve = rng.gen_range(1..=20u128);
    let mut book = BidBook::new(RoundId(round));
    book.open(BidRules {
        reserve_price: reserve,
        minimum_bid_amount: 1,
        auction_end_time: now + TimeDelta::hours(1),
    })
    .unwrap();

    let bidders: Vec<ActorId> = (0..6).map(|_| ActorId::new()).collect();
    let count = rng.gen_range(1..40);
    let mut accepted = 0;
    for _ in 0..count {
        let bidder = bidders[rng.gen_range(0..bidders.len())];
        let amount = rng.gen_range(1..5_000u128);
        let price = rng.gen_range(reserve..reserve + 50);
        book.submit(bidder, amount, price, now).unwrap();
        accepted += 1;
    }
    assert_eq!(book.len(), accepted);
    book.seal(rng.gen_range(0..2_000u128)).unwrap()
}

// =========================================================================
// Conservation
// =========================================================================

#[test]
fn every_bid_is_accounted_for() {
    let mut rng = StdRng::seed_from_u64(SEED);
    for round in 1..=200 {
        let sealed = random_book(&mut rng, round);
        let outcome = clear_sealed_book(&sealed).unwrap();

        assert_eq!(outcome.fills.len(), sealed.bids.len());
        for bid in &sealed.bids {
            let fill = outcome
                .fills
                .iter()
                .find(|f| f.sequence == bid.sequence)
                .unwrap();
            assert_eq!(
                fill.options * outcome.clearing_price + fill.refund,
                bid.amount,
                "bid {} in round {round} leaked value",
                bid.sequence
            );
        }

        let deposited: Amount = sealed.bids.iter().map(|b| b.amount).sum();
        let refunded: Amount = outcome.refunds.values().sum();
        assert_eq!(outcome.total_premium + refunded, deposited);
    }
}

#[test]
fn never_sells_more_than_supply() {
    let mut rng = StdRng::seed_from_u64(SEED ^ 1);
    for round in 1..=200 {
        let sealed = random_book(&mut rng, round);
        let outcome = clear_sealed_book(&sealed).unwrap();

        let allocated: OptionCount = outcome.allocations.values().sum();
        assert_eq!(allocated, outcome.options_sold);
        assert_eq!(
            outcome.options_sold + outcome.unsold_options,
            sealed.total_options
        );
        assert_eq!(
            outcome.total_premium,
            outcome.options_sold * outcome.clearing_price
        );
    }
}

// =========================================================================
// Pricing
// =========================================================================

#[test]
fn clearing_price_is_a_bid_price_at_or_above_reserve() {
    let mut rng = StdRng::seed_from_u64(SEED ^ 2);
    for round in 1..=200 {
        let sealed = random_book(&mut rng, round);
        let outcome = clear_sealed_book(&sealed).unwrap();
        assert!(outcome.clearing_price >= sealed.reserve_price);
        assert!(sealed.bids.iter().any(|b| b.price == outcome.clearing_price));
    }
}

#[test]
fn bids_below_clearing_price_win_nothing() {
    let mut rng = StdRng::seed_from_u64(SEED ^ 3);
    for round in 1..=200 {
        let sealed = random_book(&mut rng, round);
        let outcome = clear_sealed_book(&sealed).unwrap();
        for bid in sealed
            .bids
            .iter()
            .filter(|b| b.price < outcome.clearing_price)
        {
            let fill = outcome
                .fills
                .iter()
                .find(|f| f.sequence == bid.sequence)
                .unwrap();
            assert_eq!(fill.options, 0);
            assert_eq!(fill.refund, bid.amount);
        }
    }
}

// =========================================================================
// Monotonicity
// =========================================================================

/// Raising one bid's price while the clearing price stays put never
/// lowers that bid's allocation.
#[test]
fn raising_price_at_fixed_clearing_price_never_hurts() {
    let mut rng = StdRng::seed_from_u64(SEED ^ 4);
    let mut compared = 0;
    for round in 1..=300 {
        let sealed = random_book(&mut rng, round);
        let before = clear_sealed_book(&sealed).unwrap();

        let idx = rng.gen_range(0..sealed.bids.len());
        let mut bids = sealed.bids.clone();
        bids[idx].price += rng.gen_range(1..30u128);
        let raised = seal_bids(
            sealed.round_id,
            bids,
            sealed.total_options,
            sealed.reserve_price,
        );
        let after = clear_sealed_book(&raised).unwrap();
        if after.clearing_price != before.clearing_price {
            continue;
        }
        compared += 1;

        let seq = sealed.bids[idx].sequence;
        let options_of = |o: &ClearingOutcome| {
            o.fills
                .iter()
                .find(|f| f.sequence == seq)
                .map_or(0, |f| f.options)
        };
        assert!(
            options_of(&after) >= options_of(&before),
            "round {round}: raising bid {seq} lowered its allocation"
        );
    }
    assert!(compared > 0, "no comparable cases generated");
}

#[test]
fn higher_price_jumps_the_queue() {
    // Supply 10 at clearing price 5. The 40@5 bid is served before the
    // 50@5 bid; lifting the larger bid to 6 reorders them.
    let small = Bid::dummy(40, 5, 0);
    let large = Bid::dummy(50, 5, 1);
    let before =
        clear_sealed_book(&seal_bids(RoundId(1), vec![small.clone(), large.clone()], 10, 1))
            .unwrap();
    assert_eq!(before.clearing_price, 5);
    assert_eq!(before.fills.iter().find(|f| f.sequence == 1).unwrap().options, 2);

    let mut lifted = large;
    lifted.price = 6;
    let after = clear_sealed_book(&seal_bids(RoundId(1), vec![small, lifted], 10, 1)).unwrap();
    assert_eq!(after.clearing_price, 5);
    assert_eq!(after.fills.iter().find(|f| f.sequence == 1).unwrap().options, 10);
}

// =========================================================================
// Determinism
// =========================================================================

#[test]
fn resealing_same_bids_reproduces_hashes() {
    let mut rng = StdRng::seed_from_u64(SEED ^ 5);
    let sealed = random_book(&mut rng, 9);
    assert!(verify_book_hash(&sealed));

    let resealed = seal_bids(
        sealed.round_id,
        sealed.bids.iter().rev().cloned().collect(),
        sealed.total_options,
        sealed.reserve_price,
    );
    assert_eq!(resealed.book_hash, sealed.book_hash);

    let a = clear_sealed_book(&sealed).unwrap();
    let b = clear_sealed_book(&resealed).unwrap();
    assert_eq!(a.result_hash, b.result_hash);
    assert_eq!(a, b);
}

#[test]
fn wei_scaled_book_clears_like_unit_book() {
    let unit = constants::ONE_UNIT;
    let book = [(50u128, 20u128), (142, 11), (235, 11), (222, 2), (75, 1), (35, 1)];
    let bids: Vec<Bid> = book
        .iter()
        .enumerate()
        .map(|(i, &(amount, price))| Bid::dummy(amount * unit, price * unit, i as u64))
        .collect();
    let outcome = clear_sealed_book(&seal_bids(RoundId(1), bids, 200, 2 * unit)).unwrap();

    assert_eq!(outcome.clearing_price, 2 * unit);
    let options: Vec<OptionCount> = outcome.fills.iter().map(|f| f.options).collect();
    assert_eq!(&options[..4], &[25, 71, 104, 0]);
    assert_eq!(outcome.fills[2].refund, 27 * unit);
    assert_eq!(outcome.total_premium, 400 * unit);
    assert_eq!(outcome.removed, vec![4, 5]);
}

// =========================================================================
// Price search
// =========================================================================

/// Highest-first scan over every distinct price.
fn scan_clearing_price(sorted: &[&Bid], supply: OptionCount) -> Option<Amount> {
    let lowest = sorted.last()?.price;
    let mut prices: Vec<Amount> = sorted.iter().map(|b| b.price).collect();
    prices.dedup();
    Some(
        prices
            .into_iter()
            .find(|&p| demand_at(sorted, p, supply) >= supply)
            .unwrap_or(lowest),
    )
}

#[test]
fn bisection_agrees_with_full_scan() {
    let mut rng = StdRng::seed_from_u64(SEED ^ 0xb15e);
    for round in 1..=300 {
        let sealed = random_book(&mut rng, round);
        let mut sorted: Vec<&Bid> = sealed.bids.iter().collect();
        sorted.sort_by(|a, b| clearing_order(a, b));

        let supplies = [
            0,
            1,
            sealed.total_options,
            rng.gen_range(0..20_000u128),
            OptionCount::MAX,
        ];
        for supply in supplies {
            assert_eq!(
                compute_clearing_price(&sorted, supply),
                scan_clearing_price(&sorted, supply),
                "round {round}, supply {supply}"
            );
        }
    }
}

#[test]
fn full_book_clears_quickly() {
    // Every price distinct and demand short of supply at every price: the
    // search has to walk all the way down to the lowest bid.
    let count = u64::try_from(constants::MAX_BIDS_PER_ROUND).unwrap();
    let bids: Vec<Bid> = (0..count)
        .map(|i| Bid::dummy(1, u128::from(i) + 1, i))
        .collect();
    let sealed = seal_bids(RoundId(1), bids, 1_000_000_000, 1);

    let started = Instant::now();
    let outcome = clear_sealed_book(&sealed).unwrap();
    let elapsed = started.elapsed();

    assert_eq!(outcome.clearing_price, 1);
    assert_eq!(outcome.options_sold, u128::from(count));
    assert!(elapsed < Duration::from_secs(10), "clearing took {elapsed:?}");
}
