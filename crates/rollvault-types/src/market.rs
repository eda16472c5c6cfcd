//! Market statistics and strike selection.
//!
//! The statistics come from an external aggregator and are read-only to the
//! vault. A strike strategy is a pure function of one snapshot.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Amount;

/// Read-only snapshot of the market aggregator, taken at auction start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketStats {
    /// Average base fee over the previous period.
    pub prev_period_avg_basefee: Amount,
    /// Standard deviation of the base fee over the previous period.
    pub prev_period_std_dev: Amount,
    /// Running average base fee for the current period.
    pub current_period_avg_basefee: Amount,
}

/// How a round picks its strike price from the market snapshot.
///
/// Selected once in the vault configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrikeStrategy {
    /// Previous average plus one standard deviation.
    InTheMoney,
    /// Previous average.
    #[default]
    AtTheMoney,
    /// Previous average minus one standard deviation, floored at zero.
    OutOfTheMoney,
}

impl StrikeStrategy {
    #[must_use]
    pub fn compute_strike(self, stats: &MarketStats) -> Amount {
        let avg = stats.prev_period_avg_basefee;
        let std_dev = stats.prev_period_std_dev;
        match self {
            Self::InTheMoney => avg.saturating_add(std_dev),
            Self::AtTheMoney => avg,
            Self::OutOfTheMoney => avg.saturating_sub(std_dev),
        }
    }
}

impl fmt::Display for StrikeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InTheMoney => write!(f, "ITM"),
            Self::AtTheMoney => write!(f, "ATM"),
            Self::OutOfTheMoney => write!(f, "OTM"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(avg: Amount, std_dev: Amount) -> MarketStats {
        MarketStats {
            prev_period_avg_basefee: avg,
            prev_period_std_dev: std_dev,
            current_period_avg_basefee: 0,
        }
    }

    #[test]
    fn strategies_offset_by_std_dev() {
        let s = stats(100, 15);
        assert_eq!(StrikeStrategy::InTheMoney.compute_strike(&s), 115);
        assert_eq!(StrikeStrategy::AtTheMoney.compute_strike(&s), 100);
        assert_eq!(StrikeStrategy::OutOfTheMoney.compute_strike(&s), 85);
    }

    #[test]
    fn out_of_the_money_floors_at_zero() {
        let s = stats(100, 5_000);
        assert_eq!(StrikeStrategy::OutOfTheMoney.compute_strike(&s), 0);
    }

    #[test]
    fn strategy_serde_uses_snake_case() {
        let json = serde_json::to_string(&StrikeStrategy::OutOfTheMoney).unwrap();
        assert_eq!(json, "\"out_of_the_money\"");
        let back: StrikeStrategy = serde_json::from_str("\"in_the_money\"").unwrap();
        assert_eq!(back, StrikeStrategy::InTheMoney);
    }

    #[test]
    fn strategy_display() {
        assert_eq!(StrikeStrategy::AtTheMoney.to_string(), "ATM");
    }
}
