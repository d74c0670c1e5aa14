use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::errors::AppError;
use crate::models::credential::Credential;
use crate::models::token::{mask, Token};
use crate::store::token_registry::TokenRegistry;

/// Random bytes per token (256 bits).
const TOKEN_BYTES: usize = 32;

/// Fresh keys colliding even once is practically impossible; give up after this.
const MAX_COLLISION_RETRIES: usize = 3;

pub const DEFAULT_TTL_SECS: i64 = 3600;

/// Mints bearer tokens for validated credentials and records them in the registry.
#[derive(Clone)]
pub struct TokenIssuer {
    registry: TokenRegistry,
    ttl_secs: i64,
}

impl TokenIssuer {
    pub fn new(registry: TokenRegistry, ttl_secs: i64) -> Self {
        Self { registry, ttl_secs }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    pub fn issue(&self, credential: &Credential) -> Result<Token, AppError> {
        self.issue_with_ttl(credential, self.ttl_secs)
    }

    pub fn issue_with_ttl(&self, credential: &Credential, ttl_secs: i64) -> Result<Token, AppError> {
        let lifetime = Duration::try_seconds(ttl_secs)
            .filter(|d| *d > Duration::zero())
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("token TTL of {}s is not usable", ttl_secs))
            })?;

        for _ in 0..MAX_COLLISION_RETRIES {
            let now = Utc::now();
            let expires_at = now.checked_add_signed(lifetime).ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("token expiry overflows for TTL {}s", ttl_secs))
            })?;
            let token = Token {
                access_token: generate_token_string()?,
                scope: credential.scope.clone(),
                username: credential.username.clone(),
                issued_at: now,
                expires_at,
                revoked: false,
            };

            match self.registry.insert_new(token.clone()) {
                Ok(()) => {
                    tracing::info!(
                        username = %credential.username,
                        token = %mask(&token.access_token),
                        expires_at = %token.expires_at,
                        registry_size = self.registry.len(),
                        "issued access token"
                    );
                    return Ok(token);
                }
                Err(rejected) => {
                    tracing::warn!(
                        token = %mask(&rejected.access_token),
                        "token string collision, regenerating"
                    );
                }
            }
        }

        Err(AppError::Internal(anyhow::anyhow!(
            "could not generate a unique token after {} attempts",
            MAX_COLLISION_RETRIES
        )))
    }
}

/// 32 bytes from the OS CSPRNG, URL-safe base64 without padding (43 chars).
pub fn generate_token_string() -> Result<String, AppError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("entropy source failure: {}", e)))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
