//! Usage records
//!
//! One record per stopped session (explicit or auto-terminated), immutable
//! after creation. Reconciles session lifetime to ledger debits.

use super::account::AccountId;
use super::session::ResourceKind;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable record of a billed session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Unique record id
    pub id: Uuid,
    /// Billed account
    pub account_id: AccountId,
    /// Resource kind the session ran on
    pub kind: ResourceKind,
    /// Whole minutes billed
    pub minutes: u64,
    /// Total cost debited
    pub cost: Decimal,
    /// Creation timestamp (Unix millis)
    pub created_at: i64,
}

impl UsageRecord {
    pub fn new(account_id: AccountId, kind: ResourceKind, minutes: u64, cost: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            kind,
            minutes,
            cost,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}
