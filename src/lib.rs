//! Metrics Gateway — library crate shared by the binary and integration tests.
//!
//! Issues short-lived bearer tokens through a password grant, serves stock and
//! weather metrics behind scope-gated routes, and pushes aggregated metrics to
//! Databox.

use std::sync::Arc;
use std::time::Duration;

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod store;
pub mod upstream;

use auth::issuer::TokenIssuer;
use auth::validator::TokenValidator;
use middleware::metrics::GatewayMetrics;
use models::credential::CredentialStore;
use store::token_registry::TokenRegistry;
use upstream::databox::DataboxClient;
use upstream::marketstack::MarketstackClient;
use upstream::weatherstack::WeatherstackClient;
use upstream::{MetricsSink, StockSource, WeatherSource};

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub config: config::Config,
    pub credentials: CredentialStore,
    pub registry: TokenRegistry,
    pub issuer: TokenIssuer,
    pub validator: TokenValidator,
    pub stocks: Arc<dyn StockSource>,
    pub weather: Arc<dyn WeatherSource>,
    pub sink: Arc<dyn MetricsSink>,
    pub metrics: GatewayMetrics,
}

/// Upstream implementations to wire into `AppState`.
pub struct Upstreams {
    pub stocks: Arc<dyn StockSource>,
    pub weather: Arc<dyn WeatherSource>,
    pub sink: Arc<dyn MetricsSink>,
}

impl Upstreams {
    /// Live Marketstack, Weatherstack and Databox clients sharing one HTTP client.
    pub fn from_config(cfg: &config::Config, metrics: &GatewayMetrics) -> anyhow::Result<Self> {
        let client = upstream::build_client(Duration::from_secs(cfg.upstream_timeout_secs))?;
        Ok(Self {
            stocks: Arc::new(MarketstackClient::new(
                client.clone(),
                &cfg.marketstack_base_url,
                &cfg.marketstack_api_key,
                metrics.clone(),
            )),
            weather: Arc::new(WeatherstackClient::new(
                client.clone(),
                &cfg.weatherstack_base_url,
                &cfg.weatherstack_api_key,
                metrics.clone(),
            )),
            sink: Arc::new(DataboxClient::new(
                client,
                &cfg.databox_base_url,
                &cfg.databox_token,
                metrics.clone(),
            )),
        })
    }
}

impl AppState {
    pub fn from_config(cfg: config::Config) -> anyhow::Result<Self> {
        let metrics = GatewayMetrics::new()?;
        let upstreams = Upstreams::from_config(&cfg, &metrics)?;
        Ok(Self::with_upstreams(cfg, upstreams, metrics))
    }

    pub fn with_upstreams(cfg: config::Config, upstreams: Upstreams, metrics: GatewayMetrics) -> Self {
        let registry = TokenRegistry::new(cfg.max_tokens);
        Self {
            credentials: CredentialStore::new(cfg.users.clone()),
            issuer: TokenIssuer::new(registry.clone(), cfg.token_ttl_secs),
            validator: TokenValidator::new(registry.clone()),
            registry,
            stocks: upstreams.stocks,
            weather: upstreams.weather,
            sink: upstreams.sink,
            metrics,
            config: cfg,
        }
    }
}
