//! Identifiers used throughout rollvault.
//!
//! Rounds and liquidity positions are numbered sequentially by the vault.
//! Actors (depositors and bidders) are identified by UUIDv7.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RoundId
// ---------------------------------------------------------------------------

/// Strictly increasing identifier of an option round.
///
/// Each round runs: INITIALIZED → AUCTION_OPEN → AUCTION_SETTLED → OPTION_SETTLED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct RoundId(pub u64);

impl RoundId {
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "round:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PositionId
// ---------------------------------------------------------------------------

/// Identifier of a liquidity position, handed out sequentially by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl PositionId {
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lp:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ActorId
// ---------------------------------------------------------------------------

/// Identity of whoever is calling into the vault: a liquidity provider or
/// an option bidder. Uses UUIDv7 so fresh ids sort by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ActorId(pub Uuid);

impl ActorId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Amount of the collateral/bidding asset in its smallest unit.
pub type Amount = u128;

/// Number of option contracts.
pub type OptionCount = u128;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
