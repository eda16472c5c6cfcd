//! System-wide constants for the rollvault options vault.

use crate::Amount;

/// One whole unit of the collateral asset (18 decimals, wei-style).
pub const ONE_UNIT: Amount = 1_000_000_000_000_000_000;

/// Basis-point denominator used for cap level and reserve price ratios.
pub const BPS_DENOMINATOR: Amount = 10_000;

/// Default time from auction start until the options expire (25 days).
pub const DEFAULT_ROUND_DURATION_SECS: u64 = 25 * 24 * 60 * 60;

/// Default auction window (15 days).
pub const DEFAULT_AUCTION_DURATION_SECS: u64 = 15 * 24 * 60 * 60;

/// Default minimum bid amount (0.5 units). Keeps the bid book from being
/// flooded with dust bids.
pub const DEFAULT_MIN_BID_AMOUNT: Amount = ONE_UNIT / 2;

/// Default minimum amount for opening a liquidity position (0.1 units).
pub const DEFAULT_MIN_DEPOSIT_AMOUNT: Amount = ONE_UNIT / 10;

/// Default minimum collateral before a round may start its auction (1 unit).
pub const DEFAULT_MIN_COLLATERAL: Amount = ONE_UNIT;

/// Default cap level above strike, in basis points of the strike (50%).
pub const DEFAULT_CAP_LEVEL_BPS: Amount = 5_000;

/// Default reserve price, in basis points of the strike (50%).
pub const DEFAULT_RESERVE_PRICE_BPS: Amount = 5_000;

/// Maximum bids accepted into a single round's book.
pub const MAX_BIDS_PER_ROUND: usize = 100_000;

/// First round id handed out by a fresh vault.
pub const FIRST_ROUND_ID: u64 = 1;
