//! Plan catalog and pricing resolver
//!
//! Effective per-minute price = plan price for the resource kind × a
//! time-of-day multiplier (1.2 during peak hours, 18–23 UTC). A price
//! change takes effect on the next tick or stop only; there is no
//! retroactive re-pricing of minutes already billed.

use crate::ledger::WalletLedger;
use chrono::Timelike;
use dashmap::DashMap;
use podbill_common::{AccountId, Plan, PodBillError, ResourceKind, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::info;

/// First peak hour (UTC, inclusive)
const PEAK_START_HOUR: u32 = 18;

/// Last peak hour (UTC, inclusive)
const PEAK_END_HOUR: u32 = 23;

/// Subscription plans plus per-account assignments
pub struct PlanCatalog {
    plans: DashMap<String, Plan>,
    assignments: DashMap<AccountId, String>,
    default_plan: String,
}

impl PlanCatalog {
    /// Catalog seeded with the built-in tiers; unassigned accounts are on
    /// the free starter tier
    pub fn seeded() -> Self {
        let plans = DashMap::new();
        for plan in Self::builtin_plans() {
            plans.insert(plan.name.clone(), plan);
        }
        Self {
            plans,
            assignments: DashMap::new(),
            default_plan: "starter".to_string(),
        }
    }

    fn builtin_plans() -> Vec<Plan> {
        vec![
            Plan {
                name: "starter".to_string(),
                monthly_price: dec!(0),
                cpu_price_per_min: dec!(2),
                gpu_price_per_min: dec!(0),
                max_gpu: 0,
                priority: 0,
            },
            Plan {
                name: "creator".to_string(),
                monthly_price: dec!(999),
                cpu_price_per_min: dec!(1.5),
                gpu_price_per_min: dec!(8),
                max_gpu: 1,
                priority: 1,
            },
            Plan {
                name: "pro".to_string(),
                monthly_price: dec!(2999),
                cpu_price_per_min: dec!(1),
                gpu_price_per_min: dec!(6),
                max_gpu: 2,
                priority: 2,
            },
        ]
    }

    /// Look up a plan by name
    pub fn get(&self, name: &str) -> Option<Plan> {
        self.plans.get(name).map(|p| p.clone())
    }

    /// All plans, priority order
    pub fn list(&self) -> Vec<Plan> {
        let mut plans: Vec<_> = self.plans.iter().map(|p| p.clone()).collect();
        plans.sort_by_key(|p| p.priority);
        plans
    }

    /// Effective plan for an account (assigned tier or the default)
    pub fn plan_for(&self, account: AccountId) -> Plan {
        let name = self
            .assignments
            .get(&account)
            .map(|a| a.clone())
            .unwrap_or_else(|| self.default_plan.clone());
        self.plans
            .get(&name)
            .map(|p| p.clone())
            .unwrap_or_else(|| Self::builtin_plans().remove(0))
    }

    /// Charge the monthly fee through the ledger and reassign the account.
    ///
    /// A refused debit leaves the current assignment unchanged.
    pub fn subscribe(
        &self,
        ledger: &WalletLedger,
        account: AccountId,
        plan_name: &str,
    ) -> Result<Plan> {
        let plan = self
            .get(plan_name)
            .ok_or_else(|| PodBillError::NotFound(format!("plan {plan_name}")))?;

        if plan.monthly_price > Decimal::ZERO {
            ledger.debit(
                account,
                plan.monthly_price,
                &format!("Subscription {}", plan.name),
            )?;
        }

        self.assignments.insert(account, plan.name.clone());
        info!(account, plan = %plan.name, "Subscription changed");
        Ok(plan)
    }
}

/// Resolves the effective per-minute price for (account, kind, time-of-day)
pub struct PricingResolver {
    catalog: Arc<PlanCatalog>,
}

impl PricingResolver {
    pub fn new(catalog: Arc<PlanCatalog>) -> Self {
        Self { catalog }
    }

    /// Effective price per billed minute, at the current wall-clock hour
    pub fn price_per_minute(&self, account: AccountId, kind: ResourceKind) -> Decimal {
        self.price_per_minute_at(account, kind, chrono::Utc::now().hour())
    }

    fn price_per_minute_at(&self, account: AccountId, kind: ResourceKind, hour: u32) -> Decimal {
        let plan = self.catalog.plan_for(account);
        plan.price_per_minute(kind) * Self::peak_multiplier(hour)
    }

    fn peak_multiplier(hour: u32) -> Decimal {
        if (PEAK_START_HOUR..=PEAK_END_HOUR).contains(&hour) {
            dec!(1.2)
        } else {
            Decimal::ONE
        }
    }
}
