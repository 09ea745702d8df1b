//! Subscription plans
//!
//! Read-only reference data consulted by the pricing resolver. A price
//! change takes effect on the next tick or stop only; minutes already
//! billed are never re-priced.

use super::session::ResourceKind;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-minute price table for one subscription tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Tier name ("starter", "creator", "pro")
    pub name: String,
    /// Monthly subscription fee
    pub monthly_price: Decimal,
    /// CPU price per billed minute
    pub cpu_price_per_min: Decimal,
    /// GPU price per billed minute
    pub gpu_price_per_min: Decimal,
    /// Maximum concurrent GPU sessions
    pub max_gpu: u32,
    /// Scheduling priority, higher wins
    pub priority: u8,
}

impl Plan {
    /// Base per-minute price for a resource kind, before time-of-day pricing
    pub fn price_per_minute(&self, kind: ResourceKind) -> Decimal {
        match kind {
            ResourceKind::Cpu => self.cpu_price_per_min,
            ResourceKind::Gpu => self.gpu_price_per_min,
        }
    }
}
