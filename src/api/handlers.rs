use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::middleware::scope::AuthContext;
use crate::models::metrics::{collect_push_data, PushResult, StockMetrics, WeatherMetrics};
use crate::models::token::TokenResponse;
use crate::upstream::marketstack::DEFAULT_SYMBOLS;
use crate::upstream::weatherstack::DEFAULT_CITIES;
use crate::AppState;

// ── Request DTOs ─────────────────────────────────────────────

/// Password grant body. Missing fields are treated as bad credentials.
#[derive(Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct StockQuery {
    pub symbols: Option<String>,
    pub use_demo_data: Option<String>,
}

#[derive(Deserialize)]
pub struct WeatherQuery {
    pub cities: Option<String>,
    pub use_demo_data: Option<String>,
}

#[derive(Deserialize)]
pub struct PushQuery {
    pub use_demo_data: Option<String>,
}

// ── Query helpers ────────────────────────────────────────────

/// `use_demo_data` is on only for the case-insensitive string "true".
pub fn parse_flag(raw: Option<&str>) -> bool {
    raw.map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Split a comma-separated list, trimming items and dropping empties.
/// Falls back to `defaults` when nothing usable remains.
pub fn parse_list(raw: Option<&str>, defaults: &[&str]) -> Vec<String> {
    let items: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    if items.is_empty() {
        defaults.iter().map(|s| s.to_string()).collect()
    } else {
        items
    }
}

// ── Handlers ─────────────────────────────────────────────────

/// POST /token/ — exchange username + password for a bearer token
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let Json(req) = payload.map_err(|rejection| {
        tracing::warn!("token request body rejected: {}", rejection.body_text());
        AppError::InvalidRequest(rejection.body_text())
    })?;

    let username = req.username.unwrap_or_default();
    let password = req.password.unwrap_or_default();

    let credential = match state.credentials.validate(&username, &password) {
        Some(c) => c,
        None => {
            tracing::warn!(username = %username, "login failed: invalid credentials");
            state.metrics.record_login_failure();
            return Err(AppError::InvalidCredentials);
        }
    };

    let token = state.issuer.issue(credential)?;
    state.metrics.record_token_issued(state.registry.len());

    Ok(Json(TokenResponse::from(&token)))
}

/// GET /stocks/ — aggregated end-of-day stats per symbol (scope: read)
pub async fn get_stocks(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Query(query): Query<StockQuery>,
) -> Json<Vec<StockMetrics>> {
    let symbols = parse_list(query.symbols.as_deref(), &DEFAULT_SYMBOLS);
    let use_demo_data = parse_flag(query.use_demo_data.as_deref());
    tracing::debug!(user = %auth.username(), ?symbols, use_demo_data, "fetching stock metrics");

    Json(state.stocks.fetch_metrics(&symbols, use_demo_data).await)
}

/// GET /weather/ — current conditions per city (scope: read)
pub async fn get_weather(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Query(query): Query<WeatherQuery>,
) -> Json<Vec<WeatherMetrics>> {
    let cities = parse_list(query.cities.as_deref(), &DEFAULT_CITIES);
    let use_demo_data = parse_flag(query.use_demo_data.as_deref());
    tracing::debug!(user = %auth.username(), ?cities, use_demo_data, "fetching weather metrics");

    Json(state.weather.fetch_metrics(&cities, use_demo_data).await)
}

/// POST /push/ — fetch default stocks + weather and push them to Databox (scope: write)
///
/// Always answers 200; a failed push is reported as `{"status": "error"}`.
pub async fn push_metrics(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Query(query): Query<PushQuery>,
) -> Json<PushResult> {
    let use_demo_data = parse_flag(query.use_demo_data.as_deref());
    let symbols = parse_list(None, &DEFAULT_SYMBOLS);
    let cities = parse_list(None, &DEFAULT_CITIES);

    let (stocks, weather) = tokio::join!(
        state.stocks.fetch_metrics(&symbols, use_demo_data),
        state.weather.fetch_metrics(&cities, use_demo_data),
    );

    let data = collect_push_data(&stocks, &weather);
    tracing::info!(
        user = %auth.username(),
        count = data.len(),
        use_demo_data,
        "preparing to push metrics"
    );

    Json(state.sink.push_metrics(&data).await)
}

/// GET /metrics — Prometheus text exposition
pub async fn prometheus_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.encode(),
    )
}
