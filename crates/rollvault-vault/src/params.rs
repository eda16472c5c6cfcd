//! Derivation of a round's fixed parameters and option payouts.

use chrono::{DateTime, Utc};
use rollvault_types::{
    Amount, MarketStats, Result, RoundParams, VaultConfig, VaultError, checked_add, constants,
    mul_div_floor,
};

/// Compute the parameters a round runs under once its auction starts.
///
/// # Errors
/// `InvalidRoundParams` for a zero strike, a zero payout range, or too
/// little collateral to back a single option; `Configuration` if the
/// configured durations overflow the clock.
pub fn derive_params(
    config: &VaultConfig,
    market: MarketStats,
    total_collateral: Amount,
    now: DateTime<Utc>,
) -> Result<RoundParams> {
    let strike_price = config.strike_strategy.compute_strike(&market);
    if strike_price == 0 {
        return Err(VaultError::InvalidRoundParams {
            reason: format!("{} strike is zero", config.strike_strategy),
        });
    }

    let max_payout_per_option = mul_div_floor(
        strike_price,
        config.cap_level_bps,
        constants::BPS_DENOMINATOR,
        "cap level",
    )?;
    if max_payout_per_option == 0 {
        return Err(VaultError::InvalidRoundParams {
            reason: format!("cap level equals strike {strike_price}"),
        });
    }
    let cap_level = checked_add(strike_price, max_payout_per_option, "cap level")?;
    let reserve_price = mul_div_floor(
        strike_price,
        config.reserve_price_bps,
        constants::BPS_DENOMINATOR,
        "reserve price",
    )?;

    let total_options_forsale = total_collateral / max_payout_per_option;
    if total_options_forsale == 0 {
        return Err(VaultError::InvalidRoundParams {
            reason: format!(
                "collateral {total_collateral} backs no option at {max_payout_per_option} each"
            ),
        });
    }

    let auction_end_time = offset(now, config.auction_delta()?, "auction_duration")?;
    let option_expiry_time = offset(now, config.round_delta()?, "round_duration")?;

    Ok(RoundParams {
        market,
        strike_price,
        cap_level,
        collateral_level: max_payout_per_option,
        max_payout_per_option,
        reserve_price,
        total_collateral,
        total_options_forsale,
        auction_start_time: now,
        auction_end_time,
        option_expiry_time,
        minimum_bid_amount: config.min_bid_amount,
        minimum_collateral_required: config.min_collateral,
    })
}

/// Payout per option: `min(max(settlement - strike, 0), cap - strike)`.
#[must_use]
pub fn payout_per_option(params: &RoundParams, settlement_price: Amount) -> Amount {
    settlement_price
        .saturating_sub(params.strike_price)
        .min(params.max_payout_per_option)
}

fn offset(
    start: DateTime<Utc>,
    delta: chrono::TimeDelta,
    field: &str,
) -> Result<DateTime<Utc>> {
    start
        .checked_add_signed(delta)
        .ok_or_else(|| VaultError::Configuration(format!("{field} overflows the clock")))
}
