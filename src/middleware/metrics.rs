//! Prometheus metrics for the gateway.
//!
//! Each `GatewayMetrics` owns its own `Registry`, so several app instances
//! (tests, CLI one-shots) never collide on registration. `/metrics` renders
//! it in the text exposition format.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::errors::AuthFailure;
use crate::models::metrics::PushStatus;

#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    tokens_issued_total: IntCounter,
    login_failures_total: IntCounter,
    auth_rejections_total: IntCounterVec,
    tokens_swept_total: IntCounter,
    active_tokens: IntGauge,
    upstream_requests_total: IntCounterVec,
    push_total: IntCounterVec,
}

impl GatewayMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let tokens_issued_total = IntCounter::new(
            "gateway_tokens_issued_total",
            "Access tokens issued via the password grant",
        )?;
        let login_failures_total = IntCounter::new(
            "gateway_login_failures_total",
            "Token requests rejected for invalid credentials",
        )?;
        let auth_rejections_total = IntCounterVec::new(
            Opts::new(
                "gateway_auth_rejections_total",
                "Protected requests rejected by the scope gate",
            ),
            &["reason"],
        )?;
        let tokens_swept_total = IntCounter::new(
            "gateway_tokens_swept_total",
            "Expired tokens removed from the registry",
        )?;
        let active_tokens = IntGauge::new(
            "gateway_active_tokens",
            "Entries currently held in the token registry",
        )?;
        let upstream_requests_total = IntCounterVec::new(
            Opts::new(
                "gateway_upstream_requests_total",
                "Calls to upstream data providers",
            ),
            &["provider", "outcome"],
        )?;
        let push_total = IntCounterVec::new(
            Opts::new("gateway_push_total", "Metric pushes to the sink"),
            &["status"],
        )?;

        registry.register(Box::new(tokens_issued_total.clone()))?;
        registry.register(Box::new(login_failures_total.clone()))?;
        registry.register(Box::new(auth_rejections_total.clone()))?;
        registry.register(Box::new(tokens_swept_total.clone()))?;
        registry.register(Box::new(active_tokens.clone()))?;
        registry.register(Box::new(upstream_requests_total.clone()))?;
        registry.register(Box::new(push_total.clone()))?;

        Ok(Self {
            registry,
            tokens_issued_total,
            login_failures_total,
            auth_rejections_total,
            tokens_swept_total,
            active_tokens,
            upstream_requests_total,
            push_total,
        })
    }

    pub fn record_token_issued(&self, registry_size: usize) {
        self.tokens_issued_total.inc();
        self.active_tokens.set(registry_size as i64);
    }

    pub fn record_login_failure(&self) {
        self.login_failures_total.inc();
    }

    pub fn record_auth_rejection(&self, failure: AuthFailure) {
        self.auth_rejections_total
            .with_label_values(&[failure.as_str()])
            .inc();
    }

    pub fn record_sweep(&self, swept: usize, registry_size: usize) {
        self.tokens_swept_total.inc_by(swept as u64);
        self.active_tokens.set(registry_size as i64);
    }

    /// `outcome` is one of "ok", "no_data", "http_error", "transport_error".
    pub fn record_upstream(&self, provider: &str, outcome: &str) {
        self.upstream_requests_total
            .with_label_values(&[provider, outcome])
            .inc();
    }

    pub fn record_push(&self, status: PushStatus) {
        self.push_total.with_label_values(&[status.as_str()]).inc();
    }

    /// Encode all metrics as Prometheus text format.
    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .unwrap_or_default();
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_independent_instances_do_not_collide() {
        assert!(GatewayMetrics::new().is_ok());
        assert!(GatewayMetrics::new().is_ok());
    }

    #[test]
    fn test_encode_contains_recorded_series() {
        let m = GatewayMetrics::new().unwrap();
        m.record_token_issued(3);
        m.record_auth_rejection(AuthFailure::Expired);
        m.record_upstream("marketstack", "ok");
        m.record_push(PushStatus::Error);

        let text = m.encode();
        assert!(text.contains("gateway_tokens_issued_total 1"));
        assert!(text.contains("gateway_active_tokens 3"));
        assert!(text.contains("reason=\"expired\""));
        assert!(text.contains("provider=\"marketstack\""));
        assert!(text.contains("status=\"error\""));
    }

    #[test]
    fn test_sweep_updates_gauge() {
        let m = GatewayMetrics::new().unwrap();
        m.record_token_issued(5);
        m.record_sweep(4, 1);
        let text = m.encode();
        assert!(text.contains("gateway_tokens_swept_total 4"));
        assert!(text.contains("gateway_active_tokens 1"));
    }
}
