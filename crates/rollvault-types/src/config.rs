//! Vault configuration.

use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::{Amount, Result, StrikeStrategy, VaultError, constants};

/// Configuration for one vault. Fixed for the vault's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// How the strike is picked from market statistics.
    pub strike_strategy: StrikeStrategy,
    /// Time from auction start until option expiry.
    pub round_duration: Duration,
    /// Length of the bidding window.
    pub auction_duration: Duration,
    pub min_bid_amount: Amount,
    pub min_deposit_amount: Amount,
    /// A round won't start its auction below this much collateral.
    pub min_collateral: Amount,
    /// Cap level above strike, in basis points of the strike.
    pub cap_level_bps: Amount,
    /// Reserve price, in basis points of the strike.
    pub reserve_price_bps: Amount,
    pub max_bids_per_round: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            strike_strategy: StrikeStrategy::default(),
            round_duration: Duration::from_secs(constants::DEFAULT_ROUND_DURATION_SECS),
            auction_duration: Duration::from_secs(constants::DEFAULT_AUCTION_DURATION_SECS),
            min_bid_amount: constants::DEFAULT_MIN_BID_AMOUNT,
            min_deposit_amount: constants::DEFAULT_MIN_DEPOSIT_AMOUNT,
            min_collateral: constants::DEFAULT_MIN_COLLATERAL,
            cap_level_bps: constants::DEFAULT_CAP_LEVEL_BPS,
            reserve_price_bps: constants::DEFAULT_RESERVE_PRICE_BPS,
            max_bids_per_round: constants::MAX_BIDS_PER_ROUND,
        }
    }
}

impl VaultConfig {
    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations no round could run under.
    pub fn validate(&self) -> Result<()> {
        if self.auction_duration.is_zero() {
            return Err(VaultError::Configuration(
                "auction_duration must be non-zero".into(),
            ));
        }
        if self.round_duration < self.auction_duration {
            return Err(VaultError::Configuration(format!(
                "round_duration {:?} shorter than auction_duration {:?}",
                self.round_duration, self.auction_duration
            )));
        }
        if self.cap_level_bps == 0 {
            return Err(VaultError::Configuration(
                "cap_level_bps must be non-zero".into(),
            ));
        }
        if self.max_bids_per_round == 0 {
            return Err(VaultError::Configuration(
                "max_bids_per_round must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn auction_delta(&self) -> Result<TimeDelta> {
        to_delta(self.auction_duration, "auction_duration")
    }

    pub fn round_delta(&self) -> Result<TimeDelta> {
        to_delta(self.round_duration, "round_duration")
    }
}

fn to_delta(duration: Duration, field: &str) -> Result<TimeDelta> {
    TimeDelta::from_std(duration)
        .map_err(|e| VaultError::Configuration(format!("{field} out of range: {e}")))
}
