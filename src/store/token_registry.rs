use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::models::token::Token;

/// Process-wide token string → token record map.
///
/// Backed by a sharded `DashMap`, so concurrent issuance and validation never
/// observe a half-written record. Expired entries stay in place until
/// `evict_expired()` runs (see `jobs::token_sweeper`) or capacity pressure
/// forces them out. Validation treats them as invalid regardless.
///
/// `max_entries` is a soft bound: the length check in `make_room` and the
/// following insert are separate steps, so concurrent inserts at capacity can
/// overshoot by up to the number of racing writers. The next insert trims the
/// map back down.
#[derive(Clone)]
pub struct TokenRegistry {
    entries: Arc<DashMap<String, Token>>,
    max_entries: usize,
}

impl TokenRegistry {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    /// Pure lookup. Returns a snapshot of the record.
    pub fn get(&self, token_string: &str) -> Option<Token> {
        self.entries.get(token_string).map(|e| e.value().clone())
    }

    /// Insert or overwrite.
    pub fn put(&self, token: Token) {
        if !self.entries.contains_key(&token.access_token) {
            self.make_room(Utc::now());
        }
        self.entries.insert(token.access_token.clone(), token);
    }

    /// Insert only when the key is vacant. Hands the token back on collision.
    pub fn insert_new(&self, token: Token) -> Result<(), Token> {
        self.make_room(Utc::now());
        match self.entries.entry(token.access_token.clone()) {
            Entry::Occupied(_) => Err(token),
            Entry::Vacant(slot) => {
                slot.insert(token);
                Ok(())
            }
        }
    }

    /// Mark a token revoked. Returns false when the token is unknown.
    pub fn revoke(&self, token_string: &str) -> bool {
        match self.entries.get_mut(token_string) {
            Some(mut entry) => {
                entry.revoked = true;
                true
            }
            None => false,
        }
    }

    /// Remove every entry whose expiry is at or before `now`.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, token| !token.is_expired_at(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Target size of the registry. Approximate under concurrent inserts.
    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    /// Ensure one free slot: sweep expired entries first, then drop the
    /// entry closest to expiry.
    fn make_room(&self, now: DateTime<Utc>) {
        if self.entries.len() < self.max_entries {
            return;
        }
        let swept = self.evict_expired(now);
        if swept > 0 {
            tracing::debug!(swept, "registry full, swept expired tokens");
        }
        while self.entries.len() >= self.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|e| e.value().expires_at)
                .map(|e| e.key().clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                    tracing::warn!("token registry at capacity, evicted soonest-expiring token");
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(key: &str, ttl_secs: i64) -> Token {
        let now = Utc::now();
        Token {
            access_token: key.to_string(),
            scope: "read".into(),
            username: "test_user".into(),
            issued_at: now,
            expires_at: now + Duration::seconds(ttl_secs),
            revoked: false,
        }
    }

    #[test]
    fn test_put_and_get() {
        let reg = TokenRegistry::new(10);
        reg.put(token("a", 60));
        assert_eq!(reg.get("a").unwrap().access_token, "a");
        assert!(reg.get("b").is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_put_overwrites() {
        let reg = TokenRegistry::new(10);
        reg.put(token("a", 60));
        let mut replacement = token("a", 60);
        replacement.scope = "read write".into();
        reg.put(replacement);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("a").unwrap().scope, "read write");
    }

    #[test]
    fn test_insert_new_rejects_collision() {
        let reg = TokenRegistry::new(10);
        assert!(reg.insert_new(token("a", 60)).is_ok());
        let rejected = reg.insert_new(token("a", 120)).unwrap_err();
        assert_eq!(rejected.access_token, "a");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_expired_tokens_remain_until_swept() {
        let reg = TokenRegistry::new(10);
        reg.put(token("old", -10));
        reg.put(token("new", 60));
        assert!(reg.get("old").is_some());

        assert_eq!(reg.evict_expired(Utc::now()), 1);
        assert!(reg.get("old").is_none());
        assert!(reg.get("new").is_some());
    }

    #[test]
    fn test_revoke() {
        let reg = TokenRegistry::new(10);
        reg.put(token("a", 60));
        assert!(reg.revoke("a"));
        assert!(reg.get("a").unwrap().is_revoked());
        assert!(!reg.revoke("missing"));
    }

    #[test]
    fn test_capacity_prefers_expired_victims() {
        let reg = TokenRegistry::new(2);
        reg.put(token("expired", -10));
        reg.put(token("live", 60));
        reg.insert_new(token("fresh", 60)).unwrap();
        assert_eq!(reg.len(), 2);
        assert!(reg.get("expired").is_none());
        assert!(reg.get("live").is_some());
    }

    #[test]
    fn test_capacity_evicts_soonest_expiring() {
        let reg = TokenRegistry::new(2);
        reg.put(token("short", 30));
        reg.put(token("long", 600));
        reg.insert_new(token("fresh", 60)).unwrap();
        assert_eq!(reg.len(), 2);
        assert!(reg.get("short").is_none());
        assert!(reg.get("long").is_some());
        assert!(reg.get("fresh").is_some());
    }

    #[test]
    fn test_sequential_inserts_stay_within_capacity() {
        let reg = TokenRegistry::new(10);
        for i in 0..50 {
            reg.insert_new(token(&format!("t-{}", i), 60 + i)).unwrap();
            assert!(reg.len() <= reg.capacity());
        }
        assert_eq!(reg.len(), 10);
        // The longest-lived tokens survive.
        assert!(reg.get("t-49").is_some());
        assert!(reg.get("t-0").is_none());
    }

    #[tokio::test]
    async fn test_concurrent_inserts_at_capacity_settle_back() {
        let reg = TokenRegistry::new(8);
        let mut handles = Vec::new();
        for i in 0..8 {
            let reg = reg.clone();
            handles.push(tokio::spawn(async move {
                for j in 0..20 {
                    let _ = reg.insert_new(token(&format!("c-{}-{}", i, j), 600));
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        // Racing writers may overshoot by at most one entry each.
        assert!(reg.len() <= reg.capacity() + 8);

        reg.insert_new(token("after", 600)).unwrap();
        assert!(reg.len() <= reg.capacity());
    }

    #[test]
    fn test_clones_share_state() {
        let reg = TokenRegistry::new(10);
        let other = reg.clone();
        other.put(token("shared", 60));
        assert!(reg.get("shared").is_some());
    }

    #[tokio::test]
    async fn test_concurrent_inserts() {
        let reg = TokenRegistry::new(10_000);
        let mut handles = Vec::new();
        for i in 0..16 {
            let reg = reg.clone();
            handles.push(tokio::spawn(async move {
                for j in 0..50 {
                    reg.put(token(&format!("t-{}-{}", i, j), 60));
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(reg.len(), 800);
    }
}
