//! Result hashing so two clearings of the same book can be compared
//! without diffing full outcomes.

use rollvault_types::{Amount, BidFill, RoundId};
use sha2::{Digest, Sha256};

/// Hash over the clearing price and every fill, in clearing order.
#[must_use]
pub fn compute_result_hash(round_id: RoundId, clearing_price: Amount, fills: &[BidFill]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"rollvault:clearing:v1:");
    hasher.update(round_id.0.to_le_bytes());
    hasher.update(clearing_price.to_le_bytes());
    hasher.update((fills.len() as u64).to_le_bytes());

    for fill in fills {
        hasher.update(fill.sequence.to_le_bytes());
        hasher.update(fill.bidder.0.as_bytes());
        hasher.update(fill.options.to_le_bytes());
        hasher.update(fill.refund.to_le_bytes());
    }

    let result = hasher.finalize();
    let mut root = [0u8; 32];
    root.copy_from_slice(&result);
    root
}

#[must_use]
pub fn verify_result_hash(
    round_id: RoundId,
    clearing_price: Amount,
    fills: &[BidFill],
    expected: &[u8; 32],
) -> bool {
    compute_result_hash(round_id, clearing_price, fills) == *expected
}
