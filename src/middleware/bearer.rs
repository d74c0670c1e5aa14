use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;

const BEARER_PREFIX: &str = "bearer ";

/// Middleware: prepend `Bearer ` to an `Authorization` header that lacks the
/// scheme, so clients may send the bare token. Runs once, on every route.
pub async fn normalize_authorization(mut req: Request, next: Next) -> Response {
    normalize_headers(req.headers_mut());
    next.run(req).await
}

pub fn normalize_headers(headers: &mut HeaderMap) {
    let rewritten = match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(value) if !value.is_empty() && !has_bearer_prefix(value) => {
            HeaderValue::from_str(&format!("Bearer {}", value)).ok()
        }
        _ => None,
    };

    if let Some(value) = rewritten {
        headers.insert(header::AUTHORIZATION, value);
    }
}

/// Token part of a `Bearer <token>` header, if present and non-empty.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    if !has_bearer_prefix(value) {
        return None;
    }
    let token = value[BEARER_PREFIX.len()..].trim();
    (!token.is_empty()).then_some(token)
}

fn has_bearer_prefix(value: &str) -> bool {
    value
        .get(..BEARER_PREFIX.len())
        .map(|p| p.eq_ignore_ascii_case(BEARER_PREFIX))
        .unwrap_or(false)
}
