//! # rollvault-auction
//!
//! **Sealed-bid auction for rollvault option rounds.**
//!
//! Two halves:
//!
//! - [`BidBook`]: per-round admission. Validates bids against the round's
//!   reserve, minimum and deadline, assigns sequence numbers, and seals a
//!   snapshot for clearing.
//! - [`clear_sealed_book`]: pure uniform-price clearing. Same book in, same
//!   [`ClearingOutcome`](rollvault_types::ClearingOutcome) out, with a
//!   result hash for cross-checking.

pub mod bid_book;
pub mod clearing;
pub mod determinism;
pub mod sealer;

pub use bid_book::{BidBook, BidRules};
pub use clearing::{clear_sealed_book, clearing_order, compute_clearing_price, demand_at};
pub use determinism::{compute_result_hash, verify_result_hash};
pub use sealer::{compute_book_hash, seal_bids, verify_book_hash};
