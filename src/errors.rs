use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Why a bearer credential was refused on a protected route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// No usable `Authorization` header.
    MissingToken,
    /// Token not present in the registry.
    UnknownToken,
    Expired,
    Revoked,
    /// Token is valid but lacks the route's required scope.
    InsufficientScope,
}

impl AuthFailure {
    /// Stable label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthFailure::MissingToken => "missing_token",
            AuthFailure::UnknownToken => "unknown_token",
            AuthFailure::Expired => "expired",
            AuthFailure::Revoked => "revoked",
            AuthFailure::InsufficientScope => "insufficient_scope",
        }
    }

    /// RFC 6750 error code for the `WWW-Authenticate` challenge.
    fn oauth_error(&self) -> Option<&'static str> {
        match self {
            AuthFailure::MissingToken => None,
            AuthFailure::InsufficientScope => Some("insufficient_scope"),
            _ => Some("invalid_token"),
        }
    }

    fn description(&self) -> &'static str {
        match self {
            AuthFailure::MissingToken => "Missing \"Authorization\" in headers.",
            AuthFailure::UnknownToken => "The access token provided is invalid.",
            AuthFailure::Expired => "The access token provided is expired.",
            AuthFailure::Revoked => "The access token provided is revoked.",
            AuthFailure::InsufficientScope => {
                "The request requires higher privileges than provided by the access token."
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("unauthorized: {}", .0.as_str())]
    Unauthorized(AuthFailure),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "message": "Invalid credentials" })),
            )
                .into_response(),
            AppError::Unauthorized(failure) => {
                // Insufficient scope stays 401 rather than 403 for client compatibility.
                let code = failure.oauth_error().unwrap_or("missing_authorization");
                let body = Json(json!({
                    "error": code,
                    "error_description": failure.description(),
                }));
                let mut response = (StatusCode::UNAUTHORIZED, body).into_response();

                let challenge = match failure.oauth_error() {
                    Some(err) => format!("Bearer realm=\"metrics-gateway\", error=\"{}\"", err),
                    None => "Bearer realm=\"metrics-gateway\"".to_string(),
                };
                if let Ok(value) = HeaderValue::from_str(&challenge) {
                    response
                        .headers_mut()
                        .insert(header::WWW_AUTHENTICATE, value);
                }
                response
            }
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "message": msg }))).into_response()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "message": "internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_credentials_is_401() {
        let resp = AppError::InvalidCredentials.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().get(header::WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn test_every_auth_failure_is_401_with_challenge() {
        for failure in [
            AuthFailure::MissingToken,
            AuthFailure::UnknownToken,
            AuthFailure::Expired,
            AuthFailure::Revoked,
            AuthFailure::InsufficientScope,
        ] {
            let resp = AppError::Unauthorized(failure).into_response();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{:?}", failure);
            let challenge = resp.headers()[header::WWW_AUTHENTICATE].to_str().unwrap();
            assert!(challenge.starts_with("Bearer"));
        }
    }

    #[test]
    fn test_challenge_carries_error_code() {
        let resp = AppError::Unauthorized(AuthFailure::InsufficientScope).into_response();
        let challenge = resp.headers()[header::WWW_AUTHENTICATE].to_str().unwrap();
        assert!(challenge.contains("error=\"insufficient_scope\""));

        let resp = AppError::Unauthorized(AuthFailure::MissingToken).into_response();
        let challenge = resp.headers()[header::WWW_AUTHENTICATE].to_str().unwrap();
        assert!(!challenge.contains("error="));
    }

    #[test]
    fn test_internal_is_500() {
        let resp = AppError::Internal(anyhow::anyhow!("boom")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
