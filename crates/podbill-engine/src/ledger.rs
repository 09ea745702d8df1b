//! Wallet ledger
//!
//! Owns the authoritative balance per account and an append-only
//! transaction log. The balance is a materialized sum maintained
//! transactionally with each insert: debit's check-and-decrement holds the
//! account entry exclusively, so a manual adjustment, a subscription charge,
//! and a billing tick hitting the same account cannot lose an update.
//!
//! No other component mutates balances; everything goes through
//! [`WalletLedger::credit`] and [`WalletLedger::debit`].

use dashmap::DashMap;
use parking_lot::RwLock;
use podbill_common::{
    Account, AccountId, PodBillError, ResourceKind, Result, UsageRecord, WalletError,
    WalletTransaction,
};
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Per-account spend totals, split by resource kind
#[derive(Debug, Clone, PartialEq)]
pub struct UsageSummary {
    pub total_spent: Decimal,
    pub cpu_spent: Decimal,
    pub gpu_spent: Decimal,
}

/// Authoritative wallet store with an append-only audit log
#[derive(Default)]
pub struct WalletLedger {
    accounts: DashMap<AccountId, Account>,
    transactions: RwLock<Vec<WalletTransaction>>,
    usage: RwLock<Vec<UsageRecord>>,
}

impl WalletLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account. Re-registering an existing id is a no-op.
    pub fn create_account(&self, account: AccountId) {
        self.accounts
            .entry(account)
            .or_insert_with(|| Account::new(account));
    }

    /// Snapshot of one account
    pub fn account(&self, account: AccountId) -> Option<Account> {
        self.accounts.get(&account).map(|a| a.clone())
    }

    /// Flip the active flag; inactive accounts cannot start sessions
    pub fn set_active(&self, account: AccountId, active: bool) -> Result<()> {
        let mut entry = self
            .accounts
            .get_mut(&account)
            .ok_or(WalletError::AccountNotFound(account))?;
        entry.active = active;
        Ok(())
    }

    /// Current committed balance
    pub fn get_balance(&self, account: AccountId) -> Result<Decimal> {
        self.accounts
            .get(&account)
            .map(|a| a.balance)
            .ok_or_else(|| WalletError::AccountNotFound(account).into())
    }

    /// Add funds. Never blocked by balance; amount must be positive.
    pub fn credit(&self, account: AccountId, amount: Decimal, reason: &str) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount.into());
        }

        let mut entry = self
            .accounts
            .get_mut(&account)
            .ok_or(WalletError::AccountNotFound(account))?;
        entry.balance += amount;
        self.transactions
            .write()
            .push(WalletTransaction::new(account, amount, reason));

        info!(account, %amount, reason, "Wallet credited");
        Ok(())
    }

    /// Remove funds if the balance covers the amount.
    ///
    /// The check and the decrement are one atomic unit per account; on
    /// insufficient funds nothing is mutated and the caller gets the
    /// required/available amounts back.
    pub fn debit(&self, account: AccountId, amount: Decimal, reason: &str) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount.into());
        }

        let mut entry = self
            .accounts
            .get_mut(&account)
            .ok_or(WalletError::AccountNotFound(account))?;

        if entry.balance < amount {
            return Err(PodBillError::Wallet(WalletError::InsufficientBalance {
                required: amount,
                available: entry.balance,
            }));
        }

        entry.balance -= amount;
        self.transactions
            .write()
            .push(WalletTransaction::new(account, -amount, reason));

        debug!(account, %amount, reason, "Wallet debited");
        Ok(())
    }

    /// Administrative credit with a fixed audit reason
    pub fn refund(&self, account: AccountId, amount: Decimal) -> Result<()> {
        self.credit(account, amount, "Admin Refund")
    }

    /// Transaction log for one account, in insertion order
    pub fn transactions(&self, account: AccountId) -> Vec<WalletTransaction> {
        self.transactions
            .read()
            .iter()
            .filter(|tx| tx.account_id == account)
            .cloned()
            .collect()
    }

    /// Append a usage record (immutable once written)
    pub fn record_usage(&self, record: UsageRecord) {
        self.usage.write().push(record);
    }

    /// Usage records for one account, newest first
    pub fn usage_history(&self, account: AccountId) -> Vec<UsageRecord> {
        let mut rows: Vec<_> = self
            .usage
            .read()
            .iter()
            .filter(|u| u.account_id == account)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }

    /// Total spend for one account, split by resource kind
    pub fn usage_summary(&self, account: AccountId) -> UsageSummary {
        let usage = self.usage.read();
        let mut summary = UsageSummary {
            total_spent: Decimal::ZERO,
            cpu_spent: Decimal::ZERO,
            gpu_spent: Decimal::ZERO,
        };
        for record in usage.iter().filter(|u| u.account_id == account) {
            summary.total_spent += record.cost;
            match record.kind {
                ResourceKind::Cpu => summary.cpu_spent += record.cost,
                ResourceKind::Gpu => summary.gpu_spent += record.cost,
            }
        }
        summary
    }
}
