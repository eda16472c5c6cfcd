//! Book sealing: turns a round's accepted bids into an immutable
//! [`SealedBook`] with a hash committing to the exact bid set.

use rollvault_types::{Amount, Bid, OptionCount, RoundId, SealedBook};
use sha2::{Digest, Sha256};

/// Build a `SealedBook` from bids, ordered by sequence.
#[must_use]
pub fn seal_bids(
    round_id: RoundId,
    mut bids: Vec<Bid>,
    total_options: OptionCount,
    reserve_price: Amount,
) -> SealedBook {
    bids.sort_by_key(|b| b.sequence);
    let book_hash = compute_book_hash(round_id, &bids, total_options, reserve_price);
    SealedBook {
        round_id,
        bids,
        total_options,
        reserve_price,
        book_hash,
    }
}

/// SHA-256 over the round, the supply, the reserve and every bid.
///
/// Each bid contributes its sequence, bidder, amount and price. The
/// submission timestamp is left out so replays with a different clock
/// hash identically.
#[must_use]
pub fn compute_book_hash(
    round_id: RoundId,
    bids: &[Bid],
    total_options: OptionCount,
    reserve_price: Amount,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"rollvault:book:v1:");
    hasher.update(round_id.0.to_le_bytes());
    hasher.update(total_options.to_le_bytes());
    hasher.update(reserve_price.to_le_bytes());
    hasher.update((bids.len() as u64).to_le_bytes());

    for bid in bids {
        hasher.update(bid.sequence.to_le_bytes());
        hasher.update(bid.bidder.0.as_bytes());
        hasher.update(bid.amount.to_le_bytes());
        hasher.update(bid.price.to_le_bytes());
    }

    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Recompute the hash of `book` and compare with the stored one.
#[must_use]
pub fn verify_book_hash(book: &SealedBook) -> bool {
    let recomputed = compute_book_hash(
        book.round_id,
        &book.bids,
        book.total_options,
        book.reserve_price,
    );
    if recomputed != book.book_hash {
        tracing::warn!(
            round = %book.round_id,
            stored = %hex::encode(book.book_hash),
            recomputed = %hex::encode(recomputed),
            "sealed book hash mismatch"
        );
        return false;
    }
    true
}
