use std::collections::HashMap;

use subtle::ConstantTimeEq;

/// A user allowed to obtain tokens through the password grant.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
    /// Space-separated scope names, e.g. "read write".
    pub scope: String,
}

impl Credential {
    pub fn new(username: &str, password: &str, scope: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            scope: scope.to_string(),
        }
    }
}

// Keep passwords out of logs and panic messages.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"****")
            .field("scope", &self.scope)
            .finish()
    }
}

/// Static username → credential table, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    users: HashMap<String, Credential>,
}

impl CredentialStore {
    pub fn new(credentials: impl IntoIterator<Item = Credential>) -> Self {
        Self {
            users: credentials
                .into_iter()
                .map(|c| (c.username.clone(), c))
                .collect(),
        }
    }

    /// Return the credential when `username` exists and `password` matches exactly.
    pub fn validate(&self, username: &str, password: &str) -> Option<&Credential> {
        let credential = self.users.get(username)?;
        let matches: bool = credential
            .password
            .as_bytes()
            .ct_eq(password.as_bytes())
            .into();
        matches.then_some(credential)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Configured credentials, sorted by username.
    pub fn iter(&self) -> impl Iterator<Item = &Credential> {
        let mut all: Vec<&Credential> = self.users.values().collect();
        all.sort_by(|a, b| a.username.cmp(&b.username));
        all.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CredentialStore {
        CredentialStore::new(vec![
            Credential::new("test_user", "password123", "read write"),
            Credential::new("viewer", "viewpass", "read"),
        ])
    }

    #[test]
    fn test_validate_accepts_exact_match() {
        let store = store();
        let cred = store.validate("test_user", "password123").unwrap();
        assert_eq!(cred.username, "test_user");
        assert_eq!(cred.scope, "read write");
    }

    #[test]
    fn test_validate_rejects_wrong_password() {
        let store = store();
        assert!(store.validate("test_user", "wrong_password").is_none());
        assert!(store.validate("test_user", "password1234").is_none());
        assert!(store.validate("test_user", "").is_none());
        // Password comparison is case-sensitive
        assert!(store.validate("test_user", "PASSWORD123").is_none());
    }

    #[test]
    fn test_validate_rejects_unknown_user() {
        assert!(store().validate("nobody", "password123").is_none());
    }

    #[test]
    fn test_debug_masks_password() {
        let rendered = format!("{:?}", Credential::new("u", "hunter2", "read"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_iter_is_sorted() {
        let names: Vec<_> = store().iter().map(|c| c.username.clone()).collect();
        assert_eq!(names, vec!["test_user", "viewer"]);
    }
}
