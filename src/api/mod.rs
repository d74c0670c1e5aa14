use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::auth::Scope;
use crate::middleware::bearer::normalize_authorization;
use crate::middleware::headers::{request_id_middleware, security_headers_middleware};
use crate::middleware::scope::{enforce_scope, ScopeGate};
use crate::AppState;

pub mod handlers;

/// Token requests are tiny; anything larger is a mistake or abuse.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Build the full gateway router.
///
/// Layer order (outermost first): security headers → request id → trace →
/// `Authorization` normalization → body limit → per-route scope gate.
pub fn router(state: Arc<AppState>) -> Router {
    let gate = |scope: Scope| from_fn_with_state(ScopeGate::new(state.clone(), scope), enforce_scope);

    Router::new()
        // Health + metrics (no auth)
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readiness_check))
        .route("/metrics", get(handlers::prometheus_metrics))
        // Password grant
        .route("/token/", post(handlers::issue_token))
        // Protected
        .route(
            "/stocks/",
            get(handlers::get_stocks).route_layer(gate(Scope::Read)),
        )
        .route(
            "/weather/",
            get(handlers::get_weather).route_layer(gate(Scope::Read)),
        )
        .route(
            "/push/",
            post(handlers::push_metrics).route_layer(gate(Scope::Write)),
        )
        .fallback(fallback_404)
        .with_state(state.clone())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(from_fn(normalize_authorization))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
}

async fn readiness_check() -> &'static str {
    "ok"
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}
