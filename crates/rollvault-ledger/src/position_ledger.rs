//! Liquidity position ledger.
//!
//! Every position owns an append-only chain of per-round entries. The last
//! entry is the live one: it takes new deposits and serves withdrawals.
//! Earlier entries stay where they were written; an entry's
//! `carried_to_round_id` is read off its successor, never stored.
//!
//! An entry's `amount` counts toward its own round's total and nowhere
//! else. When a round starts its auction, [`PositionLedger::roll_forward`]
//! chains a zero entry at the next round so the snapshotted amount stays
//! locked where it is. When the round's options settle,
//! [`PositionLedger::release`] moves each locked amount, scaled by the
//! round's outcome, onto the live entry.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use rollvault_types::{
    ActorId, Amount, PositionId, Result, RoundId, VaultError, checked_add, constants,
    mul_div_floor,
};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A liquidity provider's stake in the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityPosition {
    pub id: PositionId,
    pub depositor: ActorId,
    /// Round the opening deposit was credited to.
    pub opened_in: RoundId,
}

/// One round's slice of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub position_id: PositionId,
    pub round_id: RoundId,
    pub amount: Amount,
}

/// An entry together with the round its position carried on to.
///
/// `carried_to_round_id == entry.round_id` marks the live entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLink {
    pub entry: LedgerEntry,
    pub carried_to_round_id: RoundId,
}

impl ChainLink {
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.carried_to_round_id == self.entry.round_id
    }
}

/// What a [`PositionLedger::release`] call moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseSummary {
    pub round_id: RoundId,
    pub next_round_id: RoundId,
    pub positions: usize,
    /// Sum credited to live entries.
    pub credited: Amount,
    /// Rounding remainder kept at vault level.
    pub dust: Amount,
}

// ---------------------------------------------------------------------------
// PositionLedger
// ---------------------------------------------------------------------------

/// Source of truth for liquidity owned by depositors.
///
/// Every mutation validates fully before writing, so a failed call leaves
/// the ledger untouched.
#[derive(Debug, Clone)]
pub struct PositionLedger {
    positions: BTreeMap<PositionId, LiquidityPosition>,
    /// Append-only entry list per position, oldest first.
    chains: BTreeMap<PositionId, Vec<LedgerEntry>>,
    /// Round of each position's live entry.
    head: BTreeMap<PositionId, RoundId>,
    round_totals: BTreeMap<RoundId, Amount>,
    /// Rounds whose locked amounts have moved on.
    released: BTreeSet<RoundId>,
    dust: Amount,
    next_position_id: PositionId,
    min_deposit: Amount,
}

impl PositionLedger {
    #[must_use]
    pub fn new(min_deposit: Amount) -> Self {
        Self {
            positions: BTreeMap::new(),
            chains: BTreeMap::new(),
            head: BTreeMap::new(),
            round_totals: BTreeMap::new(),
            released: BTreeSet::new(),
            dust: 0,
            next_position_id: PositionId(1),
            min_deposit,
        }
    }

    // =====================================================================
    // Mutations
    // =====================================================================

    /// Open a position with an initial deposit credited to `round_id`.
    ///
    /// # Errors
    /// `InvalidAmount` for zero, `BelowMinimumDeposit` below the minimum.
    pub fn open(
        &mut self,
        depositor: ActorId,
        amount: Amount,
        round_id: RoundId,
    ) -> Result<PositionId> {
        self.check_deposit(amount)?;
        self.ensure_unreleased(round_id)?;
        let new_total = checked_add(self.round_total(round_id), amount, "round total")?;

        let id = self.next_position_id;
        self.next_position_id = id.next();
        self.positions.insert(
            id,
            LiquidityPosition {
                id,
                depositor,
                opened_in: round_id,
            },
        );
        self.chains.insert(
            id,
            vec![LedgerEntry {
                position_id: id,
                round_id,
                amount,
            }],
        );
        self.head.insert(id, round_id);
        self.round_totals.insert(round_id, new_total);

        tracing::debug!(position = %id, %depositor, amount, round = %round_id, "position opened");
        Ok(id)
    }

    /// Add to a position in `current_round_id`.
    ///
    /// Tops up the live entry in place when it already sits in
    /// `current_round_id`, otherwise chains a new entry there.
    ///
    /// # Errors
    /// `PositionNotFound`, `InvalidAmount`, `BelowMinimumDeposit`, or
    /// `LedgerChainBroken` if the live entry is ahead of `current_round_id`.
    pub fn deposit_more(
        &mut self,
        position_id: PositionId,
        amount: Amount,
        current_round_id: RoundId,
    ) -> Result<()> {
        self.check_deposit(amount)?;
        let live_idx = self.walk_to_live(position_id)?;
        self.ensure_unreleased(current_round_id)?;
        let new_total = checked_add(self.round_total(current_round_id), amount, "round total")?;

        let chain = self.chain_mut(position_id)?;
        let live = chain[live_idx];
        match live.round_id.cmp(&current_round_id) {
            Ordering::Equal => {
                chain[live_idx].amount = checked_add(live.amount, amount, "entry amount")?;
            }
            Ordering::Less => chain.push(LedgerEntry {
                position_id,
                round_id: current_round_id,
                amount,
            }),
            Ordering::Greater => {
                return Err(VaultError::LedgerChainBroken {
                    position: position_id,
                    reason: format!(
                        "live entry at {} is ahead of {current_round_id}",
                        live.round_id
                    ),
                });
            }
        }
        self.head.insert(position_id, current_round_id);
        self.round_totals.insert(current_round_id, new_total);

        tracing::debug!(position = %position_id, amount, round = %current_round_id, "deposit added");
        Ok(())
    }

    /// Chain every position live in `round_id` onto `next_round_id`.
    ///
    /// The new entries start empty. Returns how many positions moved.
    ///
    /// # Errors
    /// `Internal` if `next_round_id` does not come after `round_id`.
    pub fn roll_forward(&mut self, round_id: RoundId, next_round_id: RoundId) -> Result<usize> {
        if next_round_id <= round_id {
            return Err(VaultError::Internal(format!(
                "cannot roll {round_id} forward onto {next_round_id}"
            )));
        }
        let moving: Vec<PositionId> = self
            .head
            .iter()
            .filter(|&(_, live)| *live == round_id)
            .map(|(id, _)| *id)
            .collect();

        for id in &moving {
            if let Some(chain) = self.chains.get_mut(id) {
                chain.push(LedgerEntry {
                    position_id: *id,
                    round_id: next_round_id,
                    amount: 0,
                });
            }
            self.head.insert(*id, next_round_id);
        }
        self.round_totals.entry(next_round_id).or_insert(0);

        tracing::info!(
            from = %round_id,
            to = %next_round_id,
            positions = moving.len(),
            "positions rolled forward"
        );
        Ok(moving.len())
    }

    /// Move the value left in a settled round onto the live entries.
    ///
    /// Each position's entry in `round_id` receives
    /// `floor(amount * remaining / round_total)` on its live entry in
    /// `next_round_id`. Whatever the flooring leaves behind becomes dust.
    ///
    /// # Errors
    /// `CollateralInvariantViolation` if the round was already released or
    /// `round_total` disagrees with the ledger; `LedgerChainBroken` if a
    /// position was not rolled forward onto `next_round_id`.
    pub fn release(
        &mut self,
        round_id: RoundId,
        next_round_id: RoundId,
        round_total: Amount,
        remaining: Amount,
    ) -> Result<ReleaseSummary> {
        if self.released.contains(&round_id) {
            return Err(VaultError::CollateralInvariantViolation {
                reason: format!("{round_id} already released"),
            });
        }
        self.ensure_unreleased(next_round_id)?;
        let recorded = self.round_total(round_id);
        if recorded != round_total {
            return Err(VaultError::CollateralInvariantViolation {
                reason: format!(
                    "{round_id} snapshot {round_total} differs from ledger total {recorded}"
                ),
            });
        }

        // Validate and compute everything before writing.
        let mut updates: Vec<(PositionId, usize, Amount)> = Vec::new();
        let mut credited: Amount = 0;
        for (id, chain) in &self.chains {
            let Some(entry) = chain.iter().find(|e| e.round_id == round_id) else {
                continue;
            };
            let live_idx = chain.len() - 1;
            if chain[live_idx].round_id != next_round_id {
                return Err(VaultError::LedgerChainBroken {
                    position: *id,
                    reason: format!(
                        "live entry at {} instead of {next_round_id}",
                        chain[live_idx].round_id
                    ),
                });
            }
            let share = if round_total == 0 {
                0
            } else {
                mul_div_floor(entry.amount, remaining, round_total, "release share")?
            };
            let new_amount = checked_add(chain[live_idx].amount, share, "entry amount")?;
            credited = checked_add(credited, share, "released total")?;
            updates.push((*id, live_idx, new_amount));
        }
        let dust = remaining.checked_sub(credited).ok_or_else(|| {
            VaultError::CollateralInvariantViolation {
                reason: format!("credited {credited} exceeds remaining {remaining}"),
            }
        })?;
        let next_total = checked_add(self.round_total(next_round_id), credited, "round total")?;
        let new_dust = checked_add(self.dust, dust, "dust")?;

        for (id, idx, amount) in &updates {
            if let Some(chain) = self.chains.get_mut(id) {
                chain[*idx].amount = *amount;
            }
        }
        self.round_totals.insert(next_round_id, next_total);
        self.dust = new_dust;
        self.released.insert(round_id);

        tracing::info!(
            round = %round_id,
            next = %next_round_id,
            positions = updates.len(),
            credited,
            dust,
            "round collateral released"
        );
        Ok(ReleaseSummary {
            round_id,
            next_round_id,
            positions: updates.len(),
            credited,
            dust,
        })
    }

    /// Take `amount` out of a position's live entry. Returns what is left on it.
    ///
    /// # Errors
    /// `PositionNotFound`, `InvalidAmount` for zero, or `InsufficientBalance`
    /// if the live entry holds less than `amount`.
    pub fn withdraw(&mut self, position_id: PositionId, amount: Amount) -> Result<Amount> {
        if amount == 0 {
            return Err(VaultError::InvalidAmount {
                reason: "withdrawal must be positive".into(),
            });
        }
        let live_idx = self.walk_to_live(position_id)?;
        let chain = self.chain_mut(position_id)?;
        let live = chain[live_idx];
        if amount > live.amount {
            return Err(VaultError::InsufficientBalance {
                needed: amount,
                available: live.amount,
            });
        }
        let left = live.amount - amount;
        chain[live_idx].amount = left;
        if let Some(total) = self.round_totals.get_mut(&live.round_id) {
            *total -= amount;
        }

        tracing::debug!(position = %position_id, amount, left, round = %live.round_id, "liquidity withdrawn");
        Ok(left)
    }

    // =====================================================================
    // Queries
    // =====================================================================

    #[must_use]
    pub fn position(&self, id: PositionId) -> Option<&LiquidityPosition> {
        self.positions.get(&id)
    }

    pub fn positions(&self) -> impl Iterator<Item = &LiquidityPosition> {
        self.positions.values()
    }

    #[must_use]
    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn live_entry(&self, id: PositionId) -> Option<&LedgerEntry> {
        self.chains.get(&id).and_then(|c| c.last())
    }

    #[must_use]
    pub fn entry(&self, round_id: RoundId, position_id: PositionId) -> Option<&LedgerEntry> {
        self.chains
            .get(&position_id)?
            .iter()
            .find(|e| e.round_id == round_id)
    }

    /// The position's entries with their successor links, oldest first.
    #[must_use]
    pub fn chain(&self, id: PositionId) -> Vec<ChainLink> {
        let Some(chain) = self.chains.get(&id) else {
            return Vec::new();
        };
        chain
            .iter()
            .enumerate()
            .map(|(i, entry)| ChainLink {
                entry: *entry,
                carried_to_round_id: chain.get(i + 1).map_or(entry.round_id, |n| n.round_id),
            })
            .collect()
    }

    /// Liquidity on the live entry, free to withdraw.
    #[must_use]
    pub fn unallocated_balance_of(&self, id: PositionId) -> Amount {
        self.live_entry(id).map_or(0, |e| e.amount)
    }

    /// Liquidity locked in rounds that have not released yet.
    #[must_use]
    pub fn locked_balance_of(&self, id: PositionId) -> Amount {
        let Some(chain) = self.chains.get(&id) else {
            return 0;
        };
        let live_round = chain.last().map(|e| e.round_id);
        chain
            .iter()
            .filter(|e| Some(e.round_id) != live_round && !self.released.contains(&e.round_id))
            .fold(0, |acc: Amount, e| acc.saturating_add(e.amount))
    }

    #[must_use]
    pub fn balance_of(&self, id: PositionId) -> Amount {
        self.unallocated_balance_of(id)
            .saturating_add(self.locked_balance_of(id))
    }

    /// `floor(entry * value / round_total)` for the position's entry in `round_id`.
    ///
    /// # Errors
    /// `ArithmeticOverflow` if the share does not fit.
    pub fn share_of(
        &self,
        position_id: PositionId,
        round_id: RoundId,
        value: Amount,
    ) -> Result<Amount> {
        let total = self.round_total(round_id);
        match self.entry(round_id, position_id) {
            Some(entry) if total > 0 => mul_div_floor(entry.amount, value, total, "position share"),
            _ => Ok(0),
        }
    }

    #[must_use]
    pub fn round_total(&self, round_id: RoundId) -> Amount {
        self.round_totals.get(&round_id).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn is_released(&self, round_id: RoundId) -> bool {
        self.released.contains(&round_id)
    }

    /// Rounding remainder accumulated across releases.
    #[must_use]
    pub fn dust(&self) -> Amount {
        self.dust
    }

    /// All liquidity held: unreleased round totals plus dust.
    #[must_use]
    pub fn total_liquidity(&self) -> Amount {
        self.round_totals
            .iter()
            .filter(|(round, _)| !self.released.contains(*round))
            .fold(self.dust, |acc, (_, total)| acc.saturating_add(*total))
    }

    #[must_use]
    pub fn min_deposit(&self) -> Amount {
        self.min_deposit
    }

    // =====================================================================
    // Integrity
    // =====================================================================

    /// Walk one chain end to end. Returns its length.
    ///
    /// # Errors
    /// `PositionNotFound`, or `LedgerChainBroken` if the chain does not
    /// start at the opening round, goes backwards, disagrees with the head
    /// index, or ends anywhere but `expected_head`.
    pub fn verify_chain(&self, position_id: PositionId, expected_head: RoundId) -> Result<usize> {
        let live_idx = self.walk_to_live(position_id)?;
        let broken = |reason: String| VaultError::LedgerChainBroken {
            position: position_id,
            reason,
        };
        let position = self
            .positions
            .get(&position_id)
            .ok_or(VaultError::PositionNotFound(position_id))?;
        let chain = self.chain_ref(position_id)?;

        if chain[0].round_id != position.opened_in {
            return Err(broken(format!(
                "first entry at {} but opened in {}",
                chain[0].round_id, position.opened_in
            )));
        }
        if chain.iter().any(|e| e.position_id != position_id) {
            return Err(broken("foreign entry in chain".into()));
        }
        if live_idx + 1 != chain.len() {
            return Err(broken(format!(
                "{} entries past the live one",
                chain.len() - live_idx - 1
            )));
        }
        if chain[live_idx].round_id != expected_head {
            return Err(broken(format!(
                "live entry at {} instead of {expected_head}",
                chain[live_idx].round_id
            )));
        }
        Ok(chain.len())
    }

    /// Verify every chain and every round total.
    ///
    /// # Errors
    /// The first `LedgerChainBroken` found, or `CollateralInvariantViolation`
    /// if a round total differs from the sum of its entries.
    pub fn verify_all(&self, expected_head: RoundId) -> Result<()> {
        let mut sums: BTreeMap<RoundId, Amount> = BTreeMap::new();
        for id in self.positions.keys() {
            self.verify_chain(*id, expected_head)?;
            for entry in self.chain_ref(*id)? {
                let slot = sums.entry(entry.round_id).or_default();
                *slot = checked_add(*slot, entry.amount, "round sum")?;
            }
        }
        for (round, total) in &self.round_totals {
            let summed = sums.get(round).copied().unwrap_or(0);
            if summed != *total {
                return Err(VaultError::CollateralInvariantViolation {
                    reason: format!("{round} total {total} but entries sum to {summed}"),
                });
            }
        }
        Ok(())
    }

    // =====================================================================
    // Internals
    // =====================================================================

    fn check_deposit(&self, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Err(VaultError::InvalidAmount {
                reason: "deposit must be positive".into(),
            });
        }
        if amount < self.min_deposit {
            return Err(VaultError::BelowMinimumDeposit {
                amount,
                minimum: self.min_deposit,
            });
        }
        Ok(())
    }

    fn ensure_unreleased(&self, round_id: RoundId) -> Result<()> {
        if self.released.contains(&round_id) {
            return Err(VaultError::CollateralInvariantViolation {
                reason: format!("{round_id} already released"),
            });
        }
        Ok(())
    }

    /// Follow a chain from its opening entry to the entry the head index
    /// names. Each step must move to a later round, so the walk ends
    /// within the chain's length.
    fn walk_to_live(&self, position_id: PositionId) -> Result<usize> {
        let chain = self.chain_ref(position_id)?;
        let head = self
            .head
            .get(&position_id)
            .copied()
            .ok_or(VaultError::PositionNotFound(position_id))?;

        let mut idx = 0;
        loop {
            if chain[idx].round_id == head {
                return Ok(idx);
            }
            let Some(next) = chain.get(idx + 1) else {
                return Err(VaultError::LedgerChainBroken {
                    position: position_id,
                    reason: format!("no entry at head {head}"),
                });
            };
            if next.round_id <= chain[idx].round_id {
                return Err(VaultError::LedgerChainBroken {
                    position: position_id,
                    reason: format!("{} follows {}", next.round_id, chain[idx].round_id),
                });
            }
            idx += 1;
        }
    }

    fn chain_ref(&self, id: PositionId) -> Result<&Vec<LedgerEntry>> {
        match self.chains.get(&id) {
            Some(chain) if !chain.is_empty() => Ok(chain),
            Some(_) => Err(VaultError::LedgerChainBroken {
                position: id,
                reason: "empty chain".into(),
            }),
            None => Err(VaultError::PositionNotFound(id)),
        }
    }

    fn chain_mut(&mut self, id: PositionId) -> Result<&mut Vec<LedgerEntry>> {
        self.chains
            .get_mut(&id)
            .ok_or(VaultError::PositionNotFound(id))
    }
}

impl Default for PositionLedger {
    fn default() -> Self {
        Self::new(constants::DEFAULT_MIN_DEPOSIT_AMOUNT)
    }
}
