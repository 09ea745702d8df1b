//! Redis store backend
//!
//! Production implementation of [`EphemeralStore`]. Session entries are
//! JSON values written with `SET NX`, leases are `SET NX EX`, and rate
//! windows are `INCR` + `EXPIRE` — every atomic primitive maps to a single
//! Redis command, so the contract holds across concurrent engine instances.

use super::EphemeralStore;
use async_trait::async_trait;
use podbill_common::{AccountId, PodBillError, ResourceKind, Result, SessionState};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, warn};

/// Redis-backed [`EphemeralStore`]
pub struct RedisStore {
    connection: ConnectionManager,
    /// Key prefix for all engine state
    prefix: String,
}

impl RedisStore {
    /// Connect to Redis at the given URL
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| PodBillError::Config(format!("Failed to create Redis client: {}", e)))?;

        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| PodBillError::Storage(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self {
            connection,
            prefix: "podbill".to_string(),
        })
    }

    /// Use a custom key prefix
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    fn session_key(&self, account: AccountId, kind: ResourceKind) -> String {
        format!("{}:session:{}:{}", self.prefix, kind, account)
    }

    fn conn(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

#[async_trait]
impl EphemeralStore for RedisStore {
    async fn try_open(
        &self,
        account: AccountId,
        kind: ResourceKind,
        state: SessionState,
    ) -> Result<bool> {
        let key = self.session_key(account, kind);
        let json = serde_json::to_string(&state)?;
        let mut conn = self.conn();

        // SET NX: created only if no session exists for the key
        let created: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(json)
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(|e| PodBillError::Storage(format!("Redis SET NX failed: {}", e)))?;

        Ok(created.is_some())
    }

    async fn read(&self, account: AccountId, kind: ResourceKind) -> Result<Option<SessionState>> {
        let key = self.session_key(account, kind);
        let mut conn = self.conn();

        let raw: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| PodBillError::Storage(format!("Redis GET failed: {}", e)))?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn close(&self, account: AccountId, kind: ResourceKind) -> Result<()> {
        let key = self.session_key(account, kind);
        let mut conn = self.conn();

        let _: u64 = conn
            .del(&key)
            .await
            .map_err(|e| PodBillError::Storage(format!("Redis DEL failed: {}", e)))?;

        Ok(())
    }

    async fn list_active(&self, kind: ResourceKind) -> Result<Vec<(AccountId, SessionState)>> {
        let pattern = format!("{}:session:{}:*", self.prefix, kind);
        let mut conn = self.conn();

        // cursor SCAN instead of KEYS so the scan never blocks the server;
        // the snapshot is best-effort either way
        let mut keys: Vec<String> = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| PodBillError::Storage(format!("Redis SCAN failed: {}", e)))?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        let mut active = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(account) = key.rsplit(':').next().and_then(|id| id.parse().ok()) else {
                warn!(key = %key, "Skipping malformed session key");
                continue;
            };

            // entries can disappear between SCAN and GET; that is fine,
            // the snapshot only promises sessions present at scan time
            let raw: Option<String> = conn
                .get(&key)
                .await
                .map_err(|e| PodBillError::Storage(format!("Redis GET failed: {}", e)))?;

            if let Some(json) = raw {
                let state: SessionState = serde_json::from_str(&json)?;
                if state.running {
                    active.push((account, state));
                }
            }
        }

        debug!(kind = %kind, count = active.len(), "Scanned active sessions");
        Ok(active)
    }

    async fn acquire_lease(&self, name: &str, ttl: Duration) -> Result<bool> {
        let key = format!("{}:lease:{}", self.prefix, name);
        let mut conn = self.conn();

        let acquired: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| PodBillError::Storage(format!("Redis SET NX EX failed: {}", e)))?;

        Ok(acquired.is_some())
    }

    async fn incr_window(&self, key: &str, window: Duration) -> Result<u64> {
        let redis_key = format!("{}:{}", self.prefix, key);
        let mut conn = self.conn();

        let count: u64 = redis::cmd("INCR")
            .arg(&redis_key)
            .query_async(&mut conn)
            .await
            .map_err(|e| PodBillError::Storage(format!("Redis INCR failed: {}", e)))?;

        if count == 1 {
            let _: u64 = redis::cmd("EXPIRE")
                .arg(&redis_key)
                .arg(window.as_secs().max(1))
                .query_async(&mut conn)
                .await
                .map_err(|e| PodBillError::Storage(format!("Redis EXPIRE failed: {}", e)))?;
        }

        Ok(count)
    }
}
