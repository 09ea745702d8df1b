//! Fixed-window rate limiter
//!
//! Keyed by (action, account, window index); the counter expiry is set by
//! the store on first increment in a window. Exceeding the limit is a
//! client-visible failure with no other side effect.

use crate::store::EphemeralStore;
use podbill_common::{AccountId, PodBillError, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Fixed-window counter over the ephemeral store
pub struct RateLimiter {
    store: Arc<dyn EphemeralStore>,
    limit: u64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn EphemeralStore>, limit: u64, window: Duration) -> Self {
        Self {
            store,
            limit,
            window,
        }
    }

    /// Count one attempt; errors once the window's limit is exceeded
    pub async fn check(&self, action: &str, account: AccountId) -> Result<()> {
        let window_index = chrono::Utc::now().timestamp() / self.window.as_secs().max(1) as i64;
        let key = format!("rate:{}:{}:{}", action, account, window_index);

        let count = self.store.incr_window(&key, self.window).await?;
        if count > self.limit {
            warn!(action, account, count, limit = self.limit, "Rate limit exceeded");
            return Err(PodBillError::RateLimited {
                action: action.to_string(),
                limit: self.limit,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn test_limit_trips_after_threshold() {
        let store = Arc::new(MemoryStore::new());
        let limiter = RateLimiter::new(store, 5, Duration::from_secs(60));

        for _ in 0..5 {
            limiter.check("cpu_start", 1).await.unwrap();
        }
        let denied = limiter.check("cpu_start", 1).await;
        assert!(matches!(
            denied,
            Err(PodBillError::RateLimited { limit: 5, .. })
        ));
    }

    #[tokio::test]
    async fn test_accounts_and_actions_are_independent() {
        let store = Arc::new(MemoryStore::new());
        let limiter = RateLimiter::new(store, 1, Duration::from_secs(60));

        limiter.check("cpu_start", 1).await.unwrap();
        assert!(limiter.check("cpu_start", 1).await.is_err());

        // other account and other action still have their own windows
        limiter.check("cpu_start", 2).await.unwrap();
        limiter.check("gpu_start", 1).await.unwrap();
    }
}
