//! # rollvault-types
//!
//! Shared types, errors, and configuration for the **rollvault** options vault.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`RoundId`], [`PositionId`], [`ActorId`], [`Amount`], [`OptionCount`]
//! - **Bid model**: [`Bid`], [`BidReceipt`]
//! - **Round model**: [`RoundState`], [`RoundParams`], [`SealedBook`], [`ClearingOutcome`], [`BidFill`], [`RoundSettlement`]
//! - **Market model**: [`MarketStats`], [`StrikeStrategy`]
//! - **Collaborators**: [`TimeSource`], [`IdentitySource`], [`MarketStatsSource`]
//! - **Configuration**: [`VaultConfig`]
//! - **Math**: [`mul_div_floor`] for wide pro-rata shares
//! - **Errors**: [`VaultError`] with `RV_ERR_` prefix codes, [`ErrorKind`]
//! - **Constants**: system-wide limits and defaults

pub mod bid;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod ids;
pub mod market;
pub mod math;
pub mod round;

pub use bid::*;
pub use config::*;
pub use context::*;
pub use error::*;
pub use ids::*;
pub use market::*;
pub use math::mul_div_floor;
pub use round::*;

// Constants are accessed via `rollvault_types::constants::FOO`
// (not re-exported to avoid name collisions).
