//! Collateral conservation invariant checker.
//!
//! Enforced after every option settlement:
//! ```text
//! Σ liquidity held == Σ deposits - Σ withdrawals + Σ premiums - Σ payouts
//! ```
//!
//! Bidder funds never enter this equation. Premiums join the liquidity
//! pool when a round settles; payouts leave it at the same moment.

use rollvault_types::{Amount, Result, VaultError};

/// Running totals of every flow into and out of LP liquidity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollateralAudit {
    deposits: Amount,
    withdrawals: Amount,
    premiums: Amount,
    payouts: Amount,
}

impl CollateralAudit {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_deposit(&mut self, amount: Amount) {
        self.deposits = self.deposits.saturating_add(amount);
    }

    pub fn record_withdrawal(&mut self, amount: Amount) {
        self.withdrawals = self.withdrawals.saturating_add(amount);
    }

    /// Record premium earned by a settled round.
    pub fn record_premium(&mut self, amount: Amount) {
        self.premiums = self.premiums.saturating_add(amount);
    }

    /// Record payout owed to option holders of a settled round.
    pub fn record_payout(&mut self, amount: Amount) {
        self.payouts = self.payouts.saturating_add(amount);
    }

    /// Liquidity the recorded flows imply.
    ///
    /// # Errors
    /// `CollateralInvariantViolation` if outflows exceed inflows.
    pub fn expected(&self) -> Result<Amount> {
        self.deposits
            .checked_add(self.premiums)
            .and_then(|inflow| inflow.checked_sub(self.withdrawals))
            .and_then(|net| net.checked_sub(self.payouts))
            .ok_or_else(|| VaultError::CollateralInvariantViolation {
                reason: format!("outflows exceed inflows ({self:?})"),
            })
    }

    /// Check that `actual` liquidity matches the recorded flows.
    ///
    /// # Errors
    /// `CollateralInvariantViolation` on any mismatch.
    pub fn verify(&self, actual: Amount) -> Result<()> {
        let expected = self.expected()?;
        if actual != expected {
            tracing::warn!(actual, expected, "collateral audit failed");
            return Err(VaultError::CollateralInvariantViolation {
                reason: format!(
                    "actual liquidity {actual} != expected {expected} \
                     (deposits={}, withdrawals={}, premiums={}, payouts={})",
                    self.deposits, self.withdrawals, self.premiums, self.payouts
                ),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn total_deposits(&self) -> Amount {
        self.deposits
    }

    #[must_use]
    pub fn total_withdrawals(&self) -> Amount {
        self.withdrawals
    }

    #[must_use]
    pub fn total_premiums(&self) -> Amount {
        self.premiums
    }

    #[must_use]
    pub fn total_payouts(&self) -> Amount {
        self.payouts
    }
}
