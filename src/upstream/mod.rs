//! Upstream collaborators: the two data providers and the metrics sink.
//!
//! Each sits behind a trait so handlers depend on the contract, not the
//! vendor. No retries: a failed call becomes a per-item `error` string.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;

use crate::models::metrics::{PushMetric, PushResult, StockMetrics, WeatherMetrics};

pub mod databox;
pub mod marketstack;
pub mod weatherstack;

#[async_trait]
pub trait StockSource: Send + Sync {
    /// One entry per requested symbol, in request order. With
    /// `use_demo_data` the fixed demo set is returned instead.
    async fn fetch_metrics(&self, symbols: &[String], use_demo_data: bool) -> Vec<StockMetrics>;
}

#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch_metrics(&self, cities: &[String], use_demo_data: bool) -> Vec<WeatherMetrics>;
}

#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Never fails at the type level; problems come back as `PushResult::error`.
    async fn push_metrics(&self, data: &[PushMetric]) -> PushResult;
}

/// Shared HTTP client for all providers.
pub fn build_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .use_rustls_tls()
        .pool_max_idle_per_host(8)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .user_agent(concat!("metrics-gateway/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")
}

/// `base` + `/segment` without `Url::join` dropping the last base path segment.
pub(crate) fn endpoint(base: &url::Url, segment: &str) -> String {
    format!("{}/{}", base.as_str().trim_end_matches('/'), segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_base_path() {
        let base = url::Url::parse("http://api.marketstack.com/v1").unwrap();
        assert_eq!(endpoint(&base, "eod"), "http://api.marketstack.com/v1/eod");

        let base = url::Url::parse("http://127.0.0.1:9000/").unwrap();
        assert_eq!(endpoint(&base, "current"), "http://127.0.0.1:9000/current");
    }
}
