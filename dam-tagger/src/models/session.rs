//! Authenticated session state

use chrono::{DateTime, Utc};
use std::fmt;

/// Opaque session credential (cookie-equivalent)
///
/// `Debug` never prints the token; use `expose()` only when building a request.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredential(String);

impl SessionCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionCredential(<redacted>)")
    }
}

/// Live session, owned by `SessionManager`. Never persisted.
#[derive(Debug, Clone)]
pub struct Session {
    pub credential: SessionCredential,
    pub established_at: DateTime<Utc>,
}

impl Session {
    pub fn new(credential: SessionCredential) -> Self {
        Self {
            credential,
            established_at: Utc::now(),
        }
    }
}
