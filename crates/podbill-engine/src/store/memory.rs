//! In-process store backend
//!
//! DashMap-backed implementation of [`EphemeralStore`]. The per-shard
//! entry lock makes check-then-set atomic; lease and window expiry are
//! evaluated lazily on access.

use super::EphemeralStore;
use async_trait::async_trait;
use dashmap::DashMap;
use podbill_common::{AccountId, ResourceKind, Result, SessionState};
use std::time::{Duration, Instant};

/// In-memory [`EphemeralStore`] backend
#[derive(Default)]
pub struct MemoryStore {
    sessions: DashMap<(AccountId, ResourceKind), SessionState>,
    leases: DashMap<String, Instant>,
    windows: DashMap<String, (u64, Instant)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EphemeralStore for MemoryStore {
    async fn try_open(
        &self,
        account: AccountId,
        kind: ResourceKind,
        state: SessionState,
    ) -> Result<bool> {
        // entry() holds the shard lock across check and insert
        match self.sessions.entry((account, kind)) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(state);
                Ok(true)
            }
        }
    }

    async fn read(&self, account: AccountId, kind: ResourceKind) -> Result<Option<SessionState>> {
        Ok(self.sessions.get(&(account, kind)).map(|s| s.clone()))
    }

    async fn close(&self, account: AccountId, kind: ResourceKind) -> Result<()> {
        self.sessions.remove(&(account, kind));
        Ok(())
    }

    async fn list_active(&self, kind: ResourceKind) -> Result<Vec<(AccountId, SessionState)>> {
        Ok(self
            .sessions
            .iter()
            .filter(|entry| entry.key().1 == kind && entry.value().running)
            .map(|entry| (entry.key().0, entry.value().clone()))
            .collect())
    }

    async fn acquire_lease(&self, name: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        // sweep so the map stays bounded by live holders
        self.leases.retain(|_, expires_at| *expires_at > now);
        match self.leases.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(now + ttl);
                Ok(true)
            }
        }
    }

    async fn incr_window(&self, key: &str, window: Duration) -> Result<u64> {
        let now = Instant::now();
        // every window index mints a fresh key; drop the dead ones
        self.windows.retain(|_, (_, expires_at)| *expires_at > now);
        let mut entry = self.windows.entry(key.to_string()).or_insert((0, now + window));
        entry.0 += 1;
        Ok(entry.0)
    }
}
