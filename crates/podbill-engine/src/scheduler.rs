//! Billing scheduler
//!
//! One long-running loop per resource kind. Every tick it snapshots the
//! active sessions and debits one interval's cost per session, guarded by
//! a per-session lease whose TTL is bounded below the tick interval — a
//! lease already held means another tick or scheduler instance billed that
//! session this interval, so the debit happens at most once per interval.
//!
//! A refused debit triggers the forced-termination path: executor stop,
//! then store close. The close always runs; the contract here is "stop
//! attempting to bill", not "guarantee physical teardown".

use crate::executor::ComputeExecutor;
use crate::ledger::WalletLedger;
use crate::pricing::PricingResolver;
use crate::store::EphemeralStore;
use podbill_common::{AccountId, PodBillError, ResourceKind, Result, SessionState, WalletError};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Margin subtracted from the tick interval to bound the lease TTL
const LEASE_MARGIN: Duration = Duration::from_secs(5);

/// Recurring per-interval billing for one resource kind
pub struct BillingScheduler {
    kind: ResourceKind,
    store: Arc<dyn EphemeralStore>,
    ledger: Arc<WalletLedger>,
    pricing: Arc<PricingResolver>,
    executor: Arc<dyn ComputeExecutor>,
    interval: Duration,
}

impl BillingScheduler {
    pub fn new(
        kind: ResourceKind,
        store: Arc<dyn EphemeralStore>,
        ledger: Arc<WalletLedger>,
        pricing: Arc<PricingResolver>,
        executor: Arc<dyn ComputeExecutor>,
        interval: Duration,
    ) -> Self {
        Self {
            kind,
            store,
            ledger,
            pricing,
            executor,
            interval,
        }
    }

    /// Lease TTL: expires before the next tick so a crashed billing
    /// attempt self-heals
    fn lease_ttl(&self) -> Duration {
        self.interval
            .saturating_sub(LEASE_MARGIN)
            .max(Duration::from_secs(1))
    }

    /// Run the billing loop forever, sleeping a full interval between
    /// scans regardless of how long each scan took.
    pub async fn run(self: Arc<Self>) {
        info!(kind = %self.kind, interval_secs = self.interval.as_secs(), "Billing scheduler started");
        loop {
            if let Err(e) = self.tick().await {
                // a failed scan (store unreachable) waits for the next tick
                error!(kind = %self.kind, error = %e, "Billing scan failed");
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    /// One billing pass over the active sessions of this kind.
    ///
    /// Per-session errors are logged and never abort the scan.
    #[instrument(skip(self), fields(kind = %self.kind))]
    pub async fn tick(&self) -> Result<()> {
        let active = self.store.list_active(self.kind).await?;
        debug!(sessions = active.len(), "Billing tick");

        for (account, state) in active {
            if let Err(e) = self.bill_session(account, &state).await {
                error!(account, kind = %self.kind, error = %e, "Failed to bill session");
            }
        }
        Ok(())
    }

    /// Debit one interval for a session, forcing termination on shortfall.
    async fn bill_session(&self, account: AccountId, state: &SessionState) -> Result<()> {
        let lease = format!("bill:{}:{}", self.kind, account);
        if !self.store.acquire_lease(&lease, self.lease_ttl()).await? {
            debug!(account, kind = %self.kind, "Lease held, session already billed this interval");
            return Ok(());
        }

        let price = self.pricing.price_per_minute(account, self.kind);
        if price <= Decimal::ZERO {
            return Ok(());
        }

        let reason = format!("{} auto billing (1 min)", self.kind);
        match self.ledger.debit(account, price, &reason) {
            Ok(()) => Ok(()),
            Err(PodBillError::Wallet(WalletError::InsufficientBalance { .. })) => {
                warn!(account, kind = %self.kind, handle = %state.handle, "Insufficient funds, auto-stopping session");
                self.force_stop(account, state).await
            }
            Err(PodBillError::Wallet(WalletError::AccountNotFound(_))) => {
                // an account the ledger does not know can never pay;
                // leaving the session running would make it free forever
                warn!(account, kind = %self.kind, handle = %state.handle, "Account unknown to ledger, auto-stopping session");
                self.force_stop(account, state).await
            }
            Err(e) => Err(e),
        }
    }

    /// Forced termination once no further debit can succeed.
    ///
    /// Runs to completion even when the executor call fails: the store
    /// entry is always closed so the account stops accruing charges.
    async fn force_stop(&self, account: AccountId, state: &SessionState) -> Result<()> {
        if let Err(e) = self.executor.stop(&state.handle).await {
            error!(
                account, kind = %self.kind, handle = %state.handle, error = %e,
                "Container teardown failed during auto-stop, resource may dangle"
            );
        }

        self.store.close(account, self.kind).await?;
        info!(account, kind = %self.kind, "Session auto-stopped");
        Ok(())
    }
}
