//! Persistent account statistics seam.
//!
//! The simulation reports deaths, kills and sizes; the account collaborator
//! owns storage. [`InMemoryStats`] backs tests and the standalone binary.

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::game::state::{AccountId, DeathCause};

/// Account statistics sink
pub trait StatsStore: Send + Sync {
    /// A human entity owned by `account` died with `final_size`
    fn record_death(&self, account: AccountId, final_size: f32, cause: DeathCause);

    /// `account` scored a kill
    fn record_kill(&self, account: AccountId);

    /// Total kills for the leaderboard
    fn kills(&self, account: AccountId) -> u32;
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccountStats {
    pub deaths: u32,
    pub kills: u32,
    pub best_size: f32,
}

/// Process-local stats store
#[derive(Debug, Default)]
pub struct InMemoryStats {
    accounts: RwLock<HashMap<AccountId, AccountStats>>,
}

impl InMemoryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, account: AccountId) -> Option<AccountStats> {
        self.accounts.read().get(&account).copied()
    }
}

impl StatsStore for InMemoryStats {
    fn record_death(&self, account: AccountId, final_size: f32, _cause: DeathCause) {
        let mut accounts = self.accounts.write();
        let stats = accounts.entry(account).or_default();
        stats.deaths += 1;
        if final_size > stats.best_size {
            stats.best_size = final_size;
        }
    }

    fn record_kill(&self, account: AccountId) {
        self.accounts.write().entry(account).or_default().kills += 1;
    }

    fn kills(&self, account: AccountId) -> u32 {
        self.accounts.read().get(&account).map_or(0, |s| s.kills)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_records_accumulate() {
        let stats = InMemoryStats::new();
        let account = Uuid::new_v4();

        stats.record_death(account, 50.0, DeathCause::Boundary);
        stats.record_death(account, 30.0, DeathCause::Collision);
        stats.record_kill(account);

        let s = stats.get(account).unwrap();
        assert_eq!(s.deaths, 2);
        assert_eq!(s.best_size, 50.0);
        assert_eq!(stats.kills(account), 1);
        assert_eq!(stats.kills(Uuid::new_v4()), 0);
    }
}
