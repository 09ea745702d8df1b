//! # PodBill Common
//!
//! Shared types and errors for the PodBill metered billing engine.
//!
//! ## Core Types
//!
//! - [`Account`]: wallet owner with a materialized balance
//! - [`WalletTransaction`]: append-only ledger entry (+credit / -debit)
//! - [`ResourceKind`]: billable compute kinds (cpu, gpu)
//! - [`SessionState`]: ephemeral per-session record (start, handle)
//! - [`UsageRecord`]: durable reconciliation of session lifetime to debits
//! - [`Plan`]: per-minute price table consulted by the pricing resolver
//! - [`PaymentRecord`]: idempotency gate for gateway webhooks

pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{PodBillError, Result, SessionError, WalletError};
pub use types::{
    account::{Account, AccountId, WalletTransaction},
    payment::PaymentRecord,
    plan::Plan,
    session::{ResourceKind, SessionState},
    usage::UsageRecord,
};

/// PodBill version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Billing tick interval in seconds (one debit per interval per session)
pub const BILLING_INTERVAL_SECS: u64 = 60;

/// Session-start rate limit (starts per window per account)
pub const START_RATE_LIMIT: u64 = 5;

/// Session-start rate limit window in seconds
pub const START_RATE_WINDOW_SECS: u64 = 60;

/// Minor currency units per major unit (webhook amounts arrive in minor units)
pub const MINOR_UNITS_PER_UNIT: u32 = 100;
