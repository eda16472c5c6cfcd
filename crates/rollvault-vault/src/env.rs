//! In-process stand-ins for the vault's environment.
//!
//! [`SimulatedChain`] plays both clock and caller; tests and simulations
//! move time forward and switch actors between calls. [`StaticMarketStats`]
//! serves whatever snapshot was last set.

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::{Mutex, RwLock};
use rollvault_types::{ActorId, IdentitySource, MarketStats, MarketStatsSource, TimeSource};

/// Settable clock and caller.
#[derive(Debug)]
pub struct SimulatedChain {
    now: RwLock<DateTime<Utc>>,
    caller: Mutex<ActorId>,
}

impl SimulatedChain {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
            caller: Mutex::new(ActorId::new()),
        }
    }

    pub fn set_time(&self, at: DateTime<Utc>) {
        *self.now.write() = at;
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.write();
        *now += delta;
    }

    pub fn set_caller(&self, actor: ActorId) {
        *self.caller.lock() = actor;
    }
}

impl Default for SimulatedChain {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl TimeSource for SimulatedChain {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

impl IdentitySource for SimulatedChain {
    fn current_caller(&self) -> ActorId {
        *self.caller.lock()
    }
}

/// Market aggregator returning a fixed, replaceable snapshot.
#[derive(Debug, Default)]
pub struct StaticMarketStats {
    stats: RwLock<MarketStats>,
}

impl StaticMarketStats {
    #[must_use]
    pub fn new(stats: MarketStats) -> Self {
        Self {
            stats: RwLock::new(stats),
        }
    }

    pub fn set(&self, stats: MarketStats) {
        *self.stats.write() = stats;
    }
}

impl MarketStatsSource for StaticMarketStats {
    fn snapshot(&self) -> MarketStats {
        *self.stats.read()
    }
}
