//! PodBill billerd - background billing daemon
//!
//! Runs one billing scheduler per resource kind against the shared Redis
//! session store, debiting running sessions every interval and
//! auto-terminating sessions whose owner runs out of funds.

use podbill_common::ResourceKind;
use podbill_engine::{
    BillingScheduler, EngineConfig, PlanCatalog, PricingResolver, RedisStore, SshDockerExecutor,
    WalletLedger,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn config_from_env() -> EngineConfig {
    let mut config = EngineConfig::default();
    if let Ok(url) = std::env::var("REDIS_URL") {
        config.redis_url = url;
    }
    config.cpu_docker_host = std::env::var("DOCKER_HOST_SSH").unwrap_or_default();
    config.gpu_docker_host = std::env::var("GPU_DOCKER_HOST_SSH").unwrap_or_default();
    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config_from_env();
    tracing::info!(redis_url = %config.redis_url, "Starting PodBill billerd...");

    let store = Arc::new(RedisStore::new(&config.redis_url).await?);
    let ledger = Arc::new(WalletLedger::new());
    let pricing = Arc::new(PricingResolver::new(Arc::new(PlanCatalog::seeded())));

    for kind in ResourceKind::all() {
        let host = match kind {
            ResourceKind::Cpu => config.cpu_docker_host.clone(),
            ResourceKind::Gpu => config.gpu_docker_host.clone(),
        };
        let executor = Arc::new(SshDockerExecutor::new(host, kind));
        let scheduler = Arc::new(BillingScheduler::new(
            kind,
            store.clone(),
            ledger.clone(),
            pricing.clone(),
            executor,
            config.billing_interval,
        ));
        tokio::spawn(scheduler.run());
    }

    tracing::info!("PodBill billerd started");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    Ok(())
}
