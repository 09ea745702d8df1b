//! Resource session manager
//!
//! Orchestrates the per-key `idle → running → idle` state machine:
//! rate limit, atomic open, executor provisioning, and elapsed-minute
//! settlement on stop. A stopped session is always torn down from the
//! store even when the final debit fails, so an account is never left
//! "billed but still running" or "running with no way to stop".

use crate::executor::ComputeExecutor;
use crate::ledger::WalletLedger;
use crate::pricing::PricingResolver;
use crate::ratelimit::RateLimiter;
use crate::store::EphemeralStore;
use podbill_common::{
    AccountId, PodBillError, ResourceKind, Result, SessionError, SessionState, UsageRecord,
    WalletError,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Successful start
#[derive(Debug, Clone, PartialEq)]
pub struct StartReceipt {
    /// Executor-assigned container handle
    pub handle: String,
}

/// Settled stop
#[derive(Debug, Clone, PartialEq)]
pub struct StopReceipt {
    pub minutes: u64,
    pub cost: Decimal,
}

/// Result of stopping a session; the session is torn down in either case
#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    /// Usage debited and recorded
    Settled(StopReceipt),
    /// Debit refused; computed charge reported for client visibility
    InsufficientFunds { minutes: u64, cost: Decimal },
}

/// Start/stop orchestration for resource sessions
pub struct SessionManager {
    store: Arc<dyn EphemeralStore>,
    ledger: Arc<WalletLedger>,
    pricing: Arc<PricingResolver>,
    limiter: RateLimiter,
    cpu_executor: Arc<dyn ComputeExecutor>,
    gpu_executor: Arc<dyn ComputeExecutor>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn EphemeralStore>,
        ledger: Arc<WalletLedger>,
        pricing: Arc<PricingResolver>,
        limiter: RateLimiter,
        cpu_executor: Arc<dyn ComputeExecutor>,
        gpu_executor: Arc<dyn ComputeExecutor>,
    ) -> Self {
        Self {
            store,
            ledger,
            pricing,
            limiter,
            cpu_executor,
            gpu_executor,
        }
    }

    fn executor_for(&self, kind: ResourceKind) -> &Arc<dyn ComputeExecutor> {
        match kind {
            ResourceKind::Cpu => &self.cpu_executor,
            ResourceKind::Gpu => &self.gpu_executor,
        }
    }

    /// Start a session for (account, kind).
    ///
    /// Fails fast on the rate limit, returns `AlreadyRunning` without side
    /// effects if a session exists, and leaves no store entry behind when
    /// provisioning fails.
    #[instrument(skip(self))]
    pub async fn start(&self, account: AccountId, kind: ResourceKind) -> Result<StartReceipt> {
        let owner = self
            .ledger
            .account(account)
            .ok_or(WalletError::AccountNotFound(account))?;
        if !owner.active {
            return Err(WalletError::AccountInactive(account).into());
        }

        self.limiter
            .check(&format!("{}_start", kind), account)
            .await?;

        let handle = format!("podbill-{}-{}", kind, account);
        let state = SessionState::new(chrono::Utc::now().timestamp(), &handle);

        if !self.store.try_open(account, kind, state).await? {
            return Err(SessionError::AlreadyRunning {
                kind: kind.to_string(),
            }
            .into());
        }

        if let Err(e) = self.executor_for(kind).start(&handle).await {
            // release the reservation so the failed start leaves nothing behind
            self.store.close(account, kind).await?;
            return Err(e);
        }

        info!(account, kind = %kind, handle = %handle, "Session started");
        Ok(StartReceipt { handle })
    }

    /// Stop a session, settle elapsed usage, and always clear the entry.
    #[instrument(skip(self))]
    pub async fn stop(&self, account: AccountId, kind: ResourceKind) -> Result<StopOutcome> {
        let Some(state) = self.store.read(account, kind).await? else {
            return Err(SessionError::NotRunning {
                kind: kind.to_string(),
            }
            .into());
        };

        // best-effort teardown; a dangling container must not block settlement
        if let Err(e) = self.executor_for(kind).stop(&state.handle).await {
            error!(
                account, kind = %kind, handle = %state.handle, error = %e,
                "Container teardown failed, resource may dangle"
            );
        }

        let elapsed = chrono::Utc::now().timestamp() - state.started_at;
        let minutes = SessionState::billable_minutes(elapsed);
        let price = self.pricing.price_per_minute(account, kind);
        let cost = Decimal::from(minutes) * price;

        let debit = if cost > Decimal::ZERO {
            self.ledger
                .debit(account, cost, &format!("{} usage {} min", kind, minutes))
        } else {
            Ok(())
        };

        // a stopped session is always removed, whatever the debit outcome
        self.store.close(account, kind).await?;

        match debit {
            Ok(()) => {
                self.ledger
                    .record_usage(UsageRecord::new(account, kind, minutes, cost));
                info!(account, kind = %kind, minutes, %cost, "Session stopped and settled");
                Ok(StopOutcome::Settled(StopReceipt { minutes, cost }))
            }
            Err(PodBillError::Wallet(WalletError::InsufficientBalance { .. })) => {
                info!(account, kind = %kind, minutes, %cost, "Session stopped, debit refused");
                Ok(StopOutcome::InsufficientFunds { minutes, cost })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::PlanCatalog;
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct MockExecutor {
        starts: AtomicUsize,
        stops: AtomicUsize,
        fail_start: AtomicBool,
        fail_stop: AtomicBool,
    }

    #[async_trait]
    impl ComputeExecutor for MockExecutor {
        async fn start(&self, _session_name: &str) -> Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail_start.load(Ordering::SeqCst) {
                return Err(PodBillError::ExternalExecution("boom".into()));
            }
            Ok(())
        }

        async fn stop(&self, _handle: &str) -> Result<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            if self.fail_stop.load(Ordering::SeqCst) {
                return Err(PodBillError::ExternalExecution("boom".into()));
            }
            Ok(())
        }
    }

    struct Harness {
        store: Arc<MemoryStore>,
        ledger: Arc<WalletLedger>,
        executor: Arc<MockExecutor>,
        manager: SessionManager,
    }

    fn harness(balance: Decimal) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(WalletLedger::new());
        ledger.create_account(1);
        if balance > Decimal::ZERO {
            ledger.credit(1, balance, "seed").unwrap();
        }
        let pricing = Arc::new(PricingResolver::new(Arc::new(PlanCatalog::seeded())));
        let executor = Arc::new(MockExecutor::default());
        let limiter = RateLimiter::new(store.clone(), 5, Duration::from_secs(60));
        let manager = SessionManager::new(
            store.clone(),
            ledger.clone(),
            pricing,
            limiter,
            executor.clone(),
            executor.clone(),
        );
        Harness {
            store,
            ledger,
            executor,
            manager,
        }
    }

    #[tokio::test]
    async fn test_start_records_session() {
        let h = harness(dec!(100));
        let receipt = h.manager.start(1, ResourceKind::Cpu).await.unwrap();
        assert_eq!(receipt.handle, "podbill-cpu-1");

        let state = h.store.read(1, ResourceKind::Cpu).await.unwrap().unwrap();
        assert!(state.running);
        assert_eq!(state.handle, "podbill-cpu-1");
        assert_eq!(h.executor.starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_double_start_returns_already_running() {
        let h = harness(dec!(100));
        h.manager.start(1, ResourceKind::Cpu).await.unwrap();

        let second = h.manager.start(1, ResourceKind::Cpu).await;
        assert!(matches!(
            second,
            Err(PodBillError::Session(SessionError::AlreadyRunning { .. }))
        ));
        // no second executor session was created
        assert_eq!(h.executor.starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_provisioning_leaves_no_entry() {
        let h = harness(dec!(100));
        h.executor.fail_start.store(true, Ordering::SeqCst);

        let result = h.manager.start(1, ResourceKind::Cpu).await;
        assert!(matches!(result, Err(PodBillError::ExternalExecution(_))));
        assert!(h.store.read(1, ResourceKind::Cpu).await.unwrap().is_none());

        // the key is free again once provisioning works
        h.executor.fail_start.store(false, Ordering::SeqCst);
        h.manager.start(1, ResourceKind::Cpu).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_absent_session_is_a_clean_refusal() {
        let h = harness(dec!(100));
        let result = h.manager.stop(1, ResourceKind::Cpu).await;
        assert!(matches!(
            result,
            Err(PodBillError::Session(SessionError::NotRunning { .. }))
        ));
        assert_eq!(h.ledger.get_balance(1).unwrap(), dec!(100));
        assert_eq!(h.executor.stops.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stop_settles_minimum_one_minute() {
        let h = harness(dec!(100));
        h.manager.start(1, ResourceKind::Cpu).await.unwrap();

        // base price off-peak is at most 2/min, peak at most 2.4/min
        let outcome = h.manager.stop(1, ResourceKind::Cpu).await.unwrap();
        let StopOutcome::Settled(receipt) = outcome else {
            panic!("expected settled stop");
        };
        assert_eq!(receipt.minutes, 1);
        assert_eq!(h.ledger.get_balance(1).unwrap(), dec!(100) - receipt.cost);
        assert_eq!(h.ledger.usage_history(1).len(), 1);
        assert!(h.store.read(1, ResourceKind::Cpu).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stop_with_empty_wallet_still_tears_down() {
        let h = harness(Decimal::ZERO);
        h.manager.start(1, ResourceKind::Cpu).await.unwrap();

        let outcome = h.manager.stop(1, ResourceKind::Cpu).await.unwrap();
        let StopOutcome::InsufficientFunds { minutes, cost } = outcome else {
            panic!("expected refused debit");
        };
        assert_eq!(minutes, 1);
        assert!(cost > Decimal::ZERO);

        // torn down regardless, no usage record fabricated
        assert!(h.store.read(1, ResourceKind::Cpu).await.unwrap().is_none());
        assert!(h.ledger.usage_history(1).is_empty());
        assert_eq!(h.ledger.get_balance(1).unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_stop_survives_teardown_failure() {
        let h = harness(dec!(100));
        h.manager.start(1, ResourceKind::Cpu).await.unwrap();
        h.executor.fail_stop.store(true, Ordering::SeqCst);

        let outcome = h.manager.stop(1, ResourceKind::Cpu).await.unwrap();
        assert!(matches!(outcome, StopOutcome::Settled(_)));
        assert!(h.store.read(1, ResourceKind::Cpu).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_inactive_account_cannot_start() {
        let h = harness(dec!(100));
        h.ledger.set_active(1, false).unwrap();

        let result = h.manager.start(1, ResourceKind::Cpu).await;
        assert!(matches!(
            result,
            Err(PodBillError::Wallet(WalletError::AccountInactive(1)))
        ));
        assert_eq!(h.executor.starts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_start_rate_limited() {
        let h = harness(dec!(100));
        for _ in 0..5 {
            h.manager.start(1, ResourceKind::Cpu).await.unwrap();
            h.manager.stop(1, ResourceKind::Cpu).await.unwrap();
        }
        let denied = h.manager.start(1, ResourceKind::Cpu).await;
        assert!(matches!(denied, Err(PodBillError::RateLimited { .. })));
        // rejected before any provisioning
        assert_eq!(h.executor.starts.load(Ordering::SeqCst), 5);
    }
}
