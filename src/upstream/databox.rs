use async_trait::async_trait;
use reqwest::header::ACCEPT;
use url::Url;

use super::MetricsSink;
use crate::middleware::metrics::GatewayMetrics;
use crate::models::metrics::{PushMetric, PushResult, PushStatus};

const DATABOX_ACCEPT: &str = "application/vnd.databox.v2+json";

/// Databox push API sink. Authenticates with the push token as the basic-auth
/// username and an empty password.
pub struct DataboxClient {
    client: reqwest::Client,
    push_url: String,
    token: String,
    metrics: GatewayMetrics,
}

impl DataboxClient {
    pub fn new(client: reqwest::Client, base_url: &Url, token: &str, metrics: GatewayMetrics) -> Self {
        Self {
            client,
            push_url: base_url.to_string(),
            token: token.to_string(),
            metrics,
        }
    }

    async fn send(&self, data: &[PushMetric]) -> PushResult {
        let result = self
            .client
            .post(&self.push_url)
            .basic_auth(&self.token, Some(""))
            .header(ACCEPT, DATABOX_ACCEPT)
            .json(data)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => PushResult::success(),
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                PushResult::error(format!("API Exception: ({}) {}", status, body.trim()))
            }
            Err(e) => PushResult::error(format!("Unexpected Error: {}", e.without_url())),
        }
    }
}

#[async_trait]
impl MetricsSink for DataboxClient {
    async fn push_metrics(&self, data: &[PushMetric]) -> PushResult {
        let result = self.send(data).await;
        self.metrics.record_push(result.status);

        if result.status == PushStatus::Success {
            tracing::info!(
                service = "databox",
                metrics_sent = data.len(),
                "metrics push succeeded"
            );
        } else {
            tracing::error!(
                service = "databox",
                metrics_sent = data.len(),
                error = %result.message,
                "metrics push failed"
            );
        }
        tracing::debug!(payload = ?data, "databox payload");
        result
    }
}
