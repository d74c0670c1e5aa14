use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use url::Url;

use super::{endpoint, StockSource};
use crate::middleware::metrics::GatewayMetrics;
use crate::models::metrics::StockMetrics;

pub const DEFAULT_SYMBOLS: [&str; 2] = ["AAPL", "MSFT"];

/// End-of-day rows requested per symbol.
const EOD_LIMIT: &str = "100";

#[derive(Debug, Deserialize)]
struct EodResponse {
    #[serde(default)]
    data: Vec<EodEntry>,
}

/// One end-of-day row. Marketstack returns rows newest first.
#[derive(Debug, Clone, Deserialize)]
pub struct EodEntry {
    pub close: f64,
    pub volume: f64,
    pub date: String,
}

/// Marketstack `/eod` client.
pub struct MarketstackClient {
    client: reqwest::Client,
    eod_url: String,
    api_key: String,
    metrics: GatewayMetrics,
}

impl MarketstackClient {
    pub fn new(client: reqwest::Client, base_url: &Url, api_key: &str, metrics: GatewayMetrics) -> Self {
        Self {
            client,
            eod_url: endpoint(base_url, "eod"),
            api_key: api_key.to_string(),
            metrics,
        }
    }

    async fn fetch_symbol(&self, symbol: &str) -> StockMetrics {
        let result = self
            .client
            .get(&self.eod_url)
            .query(&[
                ("access_key", self.api_key.as_str()),
                ("symbols", symbol),
                ("limit", EOD_LIMIT),
            ])
            .send()
            .await;

        let resp = match result {
            Ok(r) => r,
            Err(e) => {
                // Strip the URL: it carries the access key.
                let e = e.without_url();
                tracing::warn!(symbol, error = %e, "marketstack request failed");
                self.metrics.record_upstream("marketstack", "transport_error");
                return StockMetrics::failed(symbol, format!("Request failed: {}", e));
            }
        };

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            tracing::warn!(symbol, status = %status, "marketstack returned non-200");
            self.metrics.record_upstream("marketstack", "http_error");
            return StockMetrics::failed(symbol, format!("API error: {}", status.as_u16()));
        }

        let entries = match resp.json::<EodResponse>().await {
            Ok(body) => body.data,
            Err(e) => {
                tracing::warn!(symbol, error = %e.without_url(), "marketstack body not understood");
                Vec::new()
            }
        };

        let metrics = summarize(symbol, &entries);
        let outcome = if metrics.is_ok() { "ok" } else { "no_data" };
        self.metrics.record_upstream("marketstack", outcome);
        metrics
    }
}

#[async_trait]
impl StockSource for MarketstackClient {
    async fn fetch_metrics(&self, symbols: &[String], use_demo_data: bool) -> Vec<StockMetrics> {
        if use_demo_data {
            return demo_metrics();
        }
        join_all(symbols.iter().map(|s| self.fetch_symbol(s))).await
    }
}

/// Average/max/min close, summed volume, and the covered date range.
pub fn summarize(symbol: &str, entries: &[EodEntry]) -> StockMetrics {
    let (first, last) = match (entries.first(), entries.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => return StockMetrics::failed(symbol, "No data available."),
    };

    let closes = entries.iter().map(|e| e.close);
    let sum: f64 = closes.clone().sum();
    let max = closes.clone().fold(f64::NEG_INFINITY, f64::max);
    let min = closes.fold(f64::INFINITY, f64::min);
    let volume: f64 = entries.iter().map(|e| e.volume).sum();

    StockMetrics {
        symbol: symbol.to_string(),
        average_closing_price: Some(sum / entries.len() as f64),
        maximum_closing_price: Some(max),
        minimum_closing_price: Some(min),
        total_trading_volume: Some(volume),
        start_date: Some(last.date.clone()),
        end_date: Some(first.date.clone()),
        error: None,
    }
}

/// Fixed dataset served when `use_demo_data=true`, whatever symbols were asked for.
pub fn demo_metrics() -> Vec<StockMetrics> {
    vec![
        StockMetrics {
            symbol: "AAPL".into(),
            average_closing_price: Some(150.25),
            maximum_closing_price: Some(155.0),
            minimum_closing_price: Some(145.0),
            total_trading_volume: Some(123456789.0),
            start_date: Some("2024-07-11".into()),
            end_date: Some("2024-11-29".into()),
            error: None,
        },
        StockMetrics {
            symbol: "MSFT".into(),
            average_closing_price: Some(280.75),
            maximum_closing_price: Some(285.0),
            minimum_closing_price: Some(275.0),
            total_trading_volume: Some(987654321.0),
            start_date: Some("2024-07-11".into()),
            end_date: Some("2024-11-29".into()),
            error: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(close: f64, volume: f64, date: &str) -> EodEntry {
        EodEntry {
            close,
            volume,
            date: date.to_string(),
        }
    }

    #[test]
    fn test_summarize_aggregates() {
        let entries = vec![
            entry(234.82, 100.0, "2024-11-29T00:00:00+0000"),
            entry(232.0, 200.0, "2024-11-28T00:00:00+0000"),
            entry(228.52, 300.0, "2024-07-11T00:00:00+0000"),
        ];
        let m = summarize("AAPL", &entries);
        assert!(m.is_ok());
        assert_eq!(m.maximum_closing_price, Some(234.82));
        assert_eq!(m.minimum_closing_price, Some(228.52));
        assert_eq!(m.total_trading_volume, Some(600.0));
        let avg = m.average_closing_price.unwrap();
        assert!((avg - 231.78).abs() < 1e-9);
        // Newest first: start is the last row, end the first.
        assert_eq!(m.start_date.as_deref(), Some("2024-07-11T00:00:00+0000"));
        assert_eq!(m.end_date.as_deref(), Some("2024-11-29T00:00:00+0000"));
    }

    #[test]
    fn test_summarize_empty_is_no_data() {
        let m = summarize("INVALID", &[]);
        assert_eq!(m.error.as_deref(), Some("No data available."));
        assert!(m.average_closing_price.is_none());
    }

    #[test]
    fn test_demo_metrics_is_fixed() {
        let demo = demo_metrics();
        assert_eq!(demo.len(), 2);
        assert_eq!(demo[0].symbol, "AAPL");
        assert_eq!(demo[1].symbol, "MSFT");
        assert_eq!(demo, demo_metrics());
    }
}
