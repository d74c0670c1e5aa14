use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::Scope;
use crate::errors::AuthFailure;
use crate::models::token::{mask, Token, TokenState};
use crate::store::token_registry::TokenRegistry;

/// Resolves bearer strings against the registry. Read-only: validation never
/// mutates or evicts, so an expired token stays visible through `get()`.
#[derive(Clone)]
pub struct TokenValidator {
    registry: TokenRegistry,
}

impl TokenValidator {
    pub fn new(registry: TokenRegistry) -> Self {
        Self { registry }
    }

    /// The token record when it exists and is neither expired nor revoked.
    pub fn authenticate(&self, token_string: &str) -> Option<Token> {
        self.check(token_string, Utc::now()).ok()
    }

    /// Same as `authenticate`, keeping the rejection reason.
    pub fn check(&self, token_string: &str, now: DateTime<Utc>) -> Result<Token, AuthFailure> {
        let token = match self.registry.get(token_string) {
            Some(t) => t,
            None => {
                tracing::info!(token = %mask(token_string), "token is unknown");
                return Err(AuthFailure::UnknownToken);
            }
        };

        match token.state_at(now) {
            TokenState::Active => {
                tracing::debug!(token = %mask(token_string), "token is valid");
                Ok(token)
            }
            TokenState::Expired => {
                tracing::info!(token = %mask(token_string), "token is expired");
                Err(AuthFailure::Expired)
            }
            TokenState::Revoked => {
                tracing::info!(token = %mask(token_string), "token is revoked");
                Err(AuthFailure::Revoked)
            }
        }
    }

    /// Validate and require `scope` in one step.
    pub fn authorize(
        &self,
        token_string: &str,
        scope: Scope,
        now: DateTime<Utc>,
    ) -> Result<Token, AuthFailure> {
        let token = self.check(token_string, now)?;
        if !Self::get_scopes(&token).contains(scope.as_str()) {
            tracing::info!(
                token = %mask(token_string),
                required = scope.as_str(),
                granted = %token.scope,
                "token lacks required scope"
            );
            return Err(AuthFailure::InsufficientScope);
        }
        Ok(token)
    }

    pub fn get_scopes(token: &Token) -> BTreeSet<String> {
        token.scopes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::issuer::TokenIssuer;
    use crate::models::credential::Credential;
    use chrono::Duration;

    fn setup(scope: &str) -> (TokenRegistry, TokenValidator, Token) {
        let registry = TokenRegistry::new(100);
        let issuer = TokenIssuer::new(registry.clone(), 3600);
        let token = issuer
            .issue(&Credential::new("test_user", "password123", scope))
            .unwrap();
        (registry.clone(), TokenValidator::new(registry), token)
    }

    #[test]
    fn test_authenticate_active_token() {
        let (_, validator, token) = setup("read write");
        let found = validator.authenticate(&token.access_token).unwrap();
        assert_eq!(found.username, "test_user");
    }

    #[test]
    fn test_authenticate_unknown_token() {
        let (_, validator, _) = setup("read");
        assert!(validator.authenticate("not-a-token").is_none());
        assert_eq!(
            validator.check("not-a-token", Utc::now()).unwrap_err(),
            AuthFailure::UnknownToken
        );
    }

    #[test]
    fn test_expired_token_rejected_but_still_stored() {
        let (registry, validator, token) = setup("read");
        let later = token.expires_at + Duration::seconds(1);
        assert_eq!(
            validator.check(&token.access_token, later).unwrap_err(),
            AuthFailure::Expired
        );
        // Lookup still succeeds; only validation fails.
        assert!(registry.get(&token.access_token).is_some());
    }

    #[test]
    fn test_revoked_token_rejected() {
        let (registry, validator, token) = setup("read");
        assert!(registry.revoke(&token.access_token));
        assert!(validator.authenticate(&token.access_token).is_none());
        assert_eq!(
            validator.check(&token.access_token, Utc::now()).unwrap_err(),
            AuthFailure::Revoked
        );
    }

    #[test]
    fn test_validation_does_not_mutate_registry() {
        let (registry, validator, token) = setup("read");
        let later = token.expires_at + Duration::seconds(1);
        for _ in 0..3 {
            let _ = validator.check(&token.access_token, later);
        }
        assert_eq!(registry.len(), 1);
        assert!(!registry.get(&token.access_token).unwrap().revoked);
    }

    #[test]
    fn test_authorize_enforces_scope() {
        let (_, validator, token) = setup("read");
        let now = Utc::now();
        assert!(validator.authorize(&token.access_token, Scope::Read, now).is_ok());
        assert_eq!(
            validator
                .authorize(&token.access_token, Scope::Write, now)
                .unwrap_err(),
            AuthFailure::InsufficientScope
        );
    }

    #[test]
    fn test_authorize_full_scope() {
        let (_, validator, token) = setup("read write");
        let now = Utc::now();
        assert!(validator.authorize(&token.access_token, Scope::Read, now).is_ok());
        assert!(validator.authorize(&token.access_token, Scope::Write, now).is_ok());
    }

    #[test]
    fn test_get_scopes_splits_whitespace() {
        let (_, _, token) = setup("read\twrite  admin");
        let scopes = TokenValidator::get_scopes(&token);
        assert_eq!(scopes.len(), 3);
        assert!(scopes.contains("admin"));
    }

    #[test]
    fn test_scope_match_is_exact() {
        // "readonly" must not satisfy "read"
        let (_, validator, token) = setup("readonly");
        assert_eq!(
            validator
                .authorize(&token.access_token, Scope::Read, Utc::now())
                .unwrap_err(),
            AuthFailure::InsufficientScope
        );
    }
}
