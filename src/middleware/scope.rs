use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;

use crate::auth::Scope;
use crate::errors::{AppError, AuthFailure};
use crate::middleware::bearer::extract_bearer;
use crate::models::token::Token;
use crate::AppState;

/// Guard attached to a protected route: the scope it requires plus the state
/// needed to validate tokens.
///
/// ```ignore
/// get(handlers::get_stocks).route_layer(from_fn_with_state(
///     ScopeGate::new(state.clone(), Scope::Read),
///     enforce_scope,
/// ))
/// ```
#[derive(Clone)]
pub struct ScopeGate {
    state: Arc<AppState>,
    required: Scope,
}

impl ScopeGate {
    pub fn new(state: Arc<AppState>, required: Scope) -> Self {
        Self { state, required }
    }

    pub fn required(&self) -> Scope {
        self.required
    }

    /// Validate the request headers against this gate.
    pub fn admit(&self, headers: &axum::http::HeaderMap) -> Result<Token, AuthFailure> {
        let token_string = extract_bearer(headers).ok_or(AuthFailure::MissingToken)?;
        self.state
            .validator
            .authorize(token_string, self.required(), Utc::now())
    }
}

/// Identity of the caller on a protected route.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub token: Token,
}

impl AuthContext {
    pub fn username(&self) -> &str {
        &self.token.username
    }
}

/// Middleware: reject the request with 401 unless it carries a valid token
/// holding the gate's scope. On success the `AuthContext` is placed in the
/// request extensions for the handler.
pub async fn enforce_scope(
    State(gate): State<ScopeGate>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    match gate.admit(req.headers()) {
        Ok(token) => {
            tracing::debug!(
                username = %token.username,
                scope = gate.required().as_str(),
                path = %req.uri().path(),
                "request admitted"
            );
            req.extensions_mut().insert(AuthContext { token });
            Ok(next.run(req).await)
        }
        Err(failure) => {
            tracing::warn!(
                reason = failure.as_str(),
                scope = gate.required().as_str(),
                path = %req.uri().path(),
                "request rejected"
            );
            gate.state.metrics.record_auth_rejection(failure);
            Err(AppError::Unauthorized(failure))
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::Unauthorized(AuthFailure::MissingToken))
    }
}
