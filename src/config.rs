use std::fs::{File, OpenOptions};
use std::sync::Mutex;

use anyhow::Context;
use url::Url;

use crate::models::credential::Credential;

/// Used only when `GATEWAY_USERS` is unset outside production.
const DEV_USERS: &str = "test_user:password123:read write";

/// Longest accepted token lifetime (30 days).
pub const MAX_TOKEN_TTL_SECS: i64 = 30 * 24 * 3600;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Users allowed to obtain tokens via the password grant.
    /// Set via GATEWAY_USERS as `user:password:scope words` entries separated by `;`.
    pub users: Vec<Credential>,
    /// Lifetime of issued tokens in seconds. Default: 3600.
    pub token_ttl_secs: i64,
    /// How often expired tokens are swept from the registry. 0 = never.
    pub token_sweep_secs: u64,
    /// Upper bound on live registry entries.
    pub max_tokens: usize,
    pub marketstack_api_key: String,
    pub marketstack_base_url: Url,
    pub weatherstack_api_key: String,
    pub weatherstack_base_url: Url,
    pub databox_token: String,
    pub databox_base_url: Url,
    /// Total per-request timeout for upstream providers.
    pub upstream_timeout_secs: u64,
}

impl Config {
    /// Build a config from an arbitrary variable lookup.
    /// `load()` passes the process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_mode = lookup("GATEWAY_ENV")
            .or_else(|| lookup("RUST_ENV"))
            .unwrap_or_default();

        let users_raw = match lookup("GATEWAY_USERS") {
            Some(raw) => raw,
            None if env_mode == "production" => {
                anyhow::bail!(
                    "GATEWAY_USERS is not set. Configure at least one \
                     `user:password:scope` entry before running in production."
                );
            }
            None => {
                tracing::warn!("GATEWAY_USERS is not set — using the built-in test_user account");
                DEV_USERS.to_string()
            }
        };

        let token_ttl_secs: i64 = parse_or(&lookup, "GATEWAY_TOKEN_TTL_SECS", 3600);
        if !(1..=MAX_TOKEN_TTL_SECS).contains(&token_ttl_secs) {
            anyhow::bail!(
                "GATEWAY_TOKEN_TTL_SECS must be between 1 and {} seconds, got {}",
                MAX_TOKEN_TTL_SECS,
                token_ttl_secs
            );
        }

        Ok(Config {
            port: parse_or(&lookup, "GATEWAY_PORT", 5022),
            users: parse_users(&users_raw)?,
            token_ttl_secs,
            token_sweep_secs: parse_or(&lookup, "GATEWAY_TOKEN_SWEEP_SECS", 300),
            max_tokens: parse_or(&lookup, "GATEWAY_MAX_TOKENS", 100_000),
            marketstack_api_key: lookup("MARKETSTACK_API_KEY").unwrap_or_default(),
            marketstack_base_url: parse_url(
                &lookup,
                "MARKETSTACK_BASE_URL",
                "http://api.marketstack.com/v1",
            )?,
            weatherstack_api_key: lookup("WEATHERSTACK_API_KEY").unwrap_or_default(),
            weatherstack_base_url: parse_url(
                &lookup,
                "WEATHERSTACK_BASE_URL",
                "http://api.weatherstack.com",
            )?,
            databox_token: lookup("DATABOX_TOKEN").unwrap_or_default(),
            databox_base_url: parse_url(&lookup, "DATABOX_BASE_URL", "https://push.databox.com")?,
            upstream_timeout_secs: parse_or(&lookup, "UPSTREAM_TIMEOUT_SECS", 30),
        })
    }
}

/// Append-mode writer for the optional push/auth log (`GATEWAY_LOG_FILE`).
pub fn open_log_file(path: &str) -> anyhow::Result<Mutex<File>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open GATEWAY_LOG_FILE {}", path))?;
    Ok(Mutex::new(file))
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    Config::from_lookup(|key| std::env::var(key).ok())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_url<F>(lookup: &F, key: &str, default: &str) -> anyhow::Result<Url>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    Url::parse(raw.trim()).with_context(|| format!("{} is not a valid URL: {}", key, raw))
}

/// Parse `user:password:scope words;user2:password2:read`.
/// Passwords may not contain `:` or `;`.
pub fn parse_users(raw: &str) -> anyhow::Result<Vec<Credential>> {
    let mut users = Vec::new();
    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let mut parts = entry.splitn(3, ':');
        let (username, password, scope) = match (parts.next(), parts.next(), parts.next()) {
            (Some(u), Some(p), Some(s)) if !u.trim().is_empty() && !p.is_empty() => {
                (u.trim(), p, s.trim())
            }
            _ => anyhow::bail!(
                "invalid GATEWAY_USERS entry for '{}': expected user:password:scope",
                entry.split(':').next().unwrap_or_default()
            ),
        };
        users.push(Credential::new(username, password, scope));
    }

    if users.is_empty() {
        anyhow::bail!("GATEWAY_USERS does not contain any users");
    }
    Ok(users)
}
