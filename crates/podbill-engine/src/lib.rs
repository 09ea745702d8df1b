//! # PodBill Engine
//!
//! Metered resource billing and wallet ledger engine.
//!
//! ## Billing model
//!
//! ```text
//! cost = billable_minutes * plan_price_per_minute * peak_multiplier
//! ```
//!
//! Sessions are billed one interval at a time by a background scheduler
//! while running, and settled for their full elapsed time on stop. The
//! wallet ledger owns the authoritative balance; every mutation appends
//! to an immutable transaction log.
//!
//! ## Components
//!
//! - [`ledger::WalletLedger`]: atomic credit/debit, append-only audit log
//! - [`store::EphemeralStore`]: session state, leases, rate windows
//! - [`ratelimit::RateLimiter`]: fixed-window start throttling
//! - [`pricing::PricingResolver`]: plan-aware, time-of-day-aware pricing
//! - [`session::SessionManager`]: start/stop orchestration
//! - [`scheduler::BillingScheduler`]: per-minute debits, auto-termination
//! - [`reconcile::PaymentReconciler`]: idempotent webhook crediting

pub mod executor;
pub mod ledger;
pub mod pricing;
pub mod ratelimit;
pub mod reconcile;
pub mod scheduler;
pub mod session;
pub mod store;

pub use executor::{ComputeExecutor, SshDockerExecutor};
pub use ledger::{UsageSummary, WalletLedger};
pub use pricing::{PlanCatalog, PricingResolver};
pub use ratelimit::RateLimiter;
pub use reconcile::{PaymentReconciler, ReconcilerConfig, WebhookOutcome};
pub use scheduler::BillingScheduler;
pub use session::{SessionManager, StartReceipt, StopOutcome, StopReceipt};
pub use store::{memory::MemoryStore, redis::RedisStore, EphemeralStore};

use podbill_common::BILLING_INTERVAL_SECS;
use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Redis connection URL for the ephemeral store
    pub redis_url: String,
    /// Billing tick interval
    pub billing_interval: Duration,
    /// Session starts allowed per rate window
    pub start_rate_limit: u64,
    /// Rate window length
    pub start_rate_window: Duration,
    /// SSH target for CPU containers (user@host)
    pub cpu_docker_host: String,
    /// SSH target for GPU containers (user@host)
    pub gpu_docker_host: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            billing_interval: Duration::from_secs(BILLING_INTERVAL_SECS),
            start_rate_limit: podbill_common::START_RATE_LIMIT,
            start_rate_window: Duration::from_secs(podbill_common::START_RATE_WINDOW_SECS),
            cpu_docker_host: String::new(),
            gpu_docker_host: String::new(),
        }
    }
}
