//! # rollvault-vault
//!
//! Round lifecycle and vault orchestration for **rollvault**.
//!
//! A [`Vault`] runs a chain of [`OptionRound`]s. Liquidity providers deposit
//! into the next round; when its auction starts the collateral is locked,
//! options are priced off market statistics ([`derive_params`]), and bidders
//! compete in a sealed-bid uniform-price auction. After expiry the options
//! pay out and whatever is left, premium included, rolls into the following
//! round through the position ledger.
//!
//! [`SharedVault`] puts a vault behind a lock for multi-threaded callers,
//! and [`env`] has simulated clock, caller and market collaborators.

pub mod env;
pub mod params;
pub mod round;
pub mod shared;
pub mod vault;

pub use env::{SimulatedChain, StaticMarketStats};
pub use params::{derive_params, payout_per_option};
pub use round::OptionRound;
pub use shared::SharedVault;
pub use vault::Vault;
