//! Collaborators the vault consults on every call.
//!
//! Time, caller identity and market statistics are owned by the environment
//! (a chain, a simulator, a test). The vault receives them at construction
//! and never keeps its own clock.

use chrono::{DateTime, Utc};

use crate::{ActorId, MarketStats};

/// Current logical time.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Identity of the actor issuing the current call.
pub trait IdentitySource: Send + Sync {
    fn current_caller(&self) -> ActorId;
}

/// Read-only market aggregator.
pub trait MarketStatsSource: Send + Sync {
    fn snapshot(&self) -> MarketStats;
}
