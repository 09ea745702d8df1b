//! Payment records
//!
//! Unique on (provider, reference); the existence of a record for a given
//! reference is the idempotency gate for crediting a gateway payment.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Processed gateway payment, one row per real-world payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Unique record id
    pub id: Uuid,
    /// Gateway name ("razorpay", "stripe")
    pub provider: String,
    /// Provider-assigned unique reference (payment id / checkout session id)
    pub reference: String,
    /// Creation timestamp (Unix millis)
    pub created_at: i64,
}

impl PaymentRecord {
    pub fn new(provider: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider: provider.into(),
            reference: reference.into(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}
