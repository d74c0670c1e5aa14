use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle of an issued bearer token.
/// `Expired` and `Revoked` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Active,
    Expired,
    Revoked,
}

/// An issued bearer token as held in the registry.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    pub access_token: String,
    pub scope: String,
    /// Username of the credential the token was issued to.
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl Token {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> TokenState {
        if self.revoked {
            TokenState::Revoked
        } else if self.is_expired_at(now) {
            TokenState::Expired
        } else {
            TokenState::Active
        }
    }

    /// Scope names granted to this token.
    pub fn scopes(&self) -> BTreeSet<String> {
        self.scope.split_whitespace().map(String::from).collect()
    }

    /// Seconds of validity at issuance.
    pub fn lifetime_secs(&self) -> i64 {
        (self.expires_at - self.issued_at).num_seconds()
    }
}

/// Response body of `POST /token/`.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub scope: String,
}

impl From<&Token> for TokenResponse {
    fn from(token: &Token) -> Self {
        Self {
            access_token: token.access_token.clone(),
            token_type: "Bearer",
            expires_in: token.lifetime_secs(),
            scope: token.scope.clone(),
        }
    }
}

/// First and last four characters only, for logs.
pub fn mask(token: &str) -> String {
    if token.len() > 8 && token.is_ascii() {
        format!("{}…{}", &token[..4], &token[token.len() - 4..])
    } else {
        "****".to_string()
    }
}
