//! Background job: drop expired tokens from the registry.
//!
//! Validation already rejects expired tokens; this only bounds memory.

use chrono::Utc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;

use crate::middleware::metrics::GatewayMetrics;
use crate::store::token_registry::TokenRegistry;

/// Spawn the sweeper. Call this once at startup.
pub fn spawn(registry: TokenRegistry, metrics: GatewayMetrics, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(every);
        // The first tick completes immediately; skip it.
        interval.tick().await;
        loop {
            interval.tick().await;
            sweep_once(&registry, &metrics);
        }
    })
}

pub fn sweep_once(registry: &TokenRegistry, metrics: &GatewayMetrics) -> usize {
    let swept = registry.evict_expired(Utc::now());
    metrics.record_sweep(swept, registry.len());
    if swept > 0 {
        tracing::info!(swept, remaining = registry.len(), "swept expired tokens");
    }
    swept
}
