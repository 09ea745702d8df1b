//! Account and wallet transaction types
//!
//! The account balance is a materialized sum maintained transactionally
//! alongside each ledger insert. The transaction log is append-only and
//! acts as the audit trail; balance must always equal the sum of all
//! transaction amounts for the account.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque account identifier, resolved upstream by the auth layer
pub type AccountId = u64;

/// Wallet owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Account id
    pub id: AccountId,
    /// Current wallet balance, cached sum of the transaction log
    pub balance: Decimal,
    /// Inactive accounts cannot start sessions
    pub active: bool,
    /// Creation timestamp (Unix millis)
    pub created_at: i64,
}

impl Account {
    /// Create a new empty account
    pub fn new(id: AccountId) -> Self {
        Self {
            id,
            balance: Decimal::ZERO,
            active: true,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Append-only ledger entry; positive amount = credit, negative = debit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    /// Unique transaction id
    pub id: Uuid,
    /// Owning account
    pub account_id: AccountId,
    /// Signed amount
    pub amount: Decimal,
    /// Human-readable reason
    pub reason: String,
    /// Creation timestamp (Unix millis)
    pub created_at: i64,
}

impl WalletTransaction {
    pub fn new(account_id: AccountId, amount: Decimal, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            amount,
            reason: reason.into(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}
