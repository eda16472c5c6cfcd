//! # rollvault-ledger
//!
//! **Liquidity accounting for rollvault.**
//!
//! - [`PositionLedger`]: per-position chains of round entries, the live
//!   entry for deposits and withdrawals, roll-forward at auction start and
//!   pro-rata release at option settlement.
//! - [`CollateralAudit`]: the conservation check run after every
//!   settlement.

pub mod conservation;
pub mod position_ledger;

pub use conservation::CollateralAudit;
pub use position_ledger::{
    ChainLink, LedgerEntry, LiquidityPosition, PositionLedger, ReleaseSummary,
};
