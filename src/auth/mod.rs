//! Password-grant token issuance and bearer-token validation.
//!
//! Flow: `CredentialStore::validate` → `TokenIssuer::issue` (writes the
//! registry) → later requests resolve through `TokenValidator`, which the
//! scope gate in `middleware::scope` calls before each protected handler.

pub mod issuer;
pub mod validator;

/// Scopes a protected route can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Read,
    Write,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Read => "read",
            Scope::Write => "write",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
