//! Bearer-token authentication and role-based authorization.
//!
//! Tokens are opaque strings resolved through a [`TokenStore`]; a token is
//! accepted only when it is known, unexpired, and not revoked. Authorization
//! is a pure role check layered on top.

use chrono::{DateTime, Duration, Utc};
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Staff,
    User,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::User => "user",
        }
    }

    pub fn permits(self, allowed: &[Role]) -> bool {
        allowed.contains(&self)
    }
}

/// Authenticated principal attached to a resolved token.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Token resolution and revocation. Resolution returns `None` for unknown,
/// expired, and revoked tokens alike; callers treat all three as a 401.
pub trait TokenStore: Send + Sync {
    fn resolve(&self, token: &str) -> Option<Session>;
    fn revoke(&self, token: &str);
}

/// Process-local token store with a revocation (blacklist) set.
#[derive(Default)]
pub struct InMemoryTokenStore {
    sessions: DashMap<String, Session>,
    revoked: DashSet<String>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(
        &self,
        token: impl Into<String>,
        user_id: impl Into<String>,
        role: Role,
        ttl: Duration,
    ) {
        self.sessions.insert(
            token.into(),
            Session {
                user_id: user_id.into(),
                role,
                expires_at: Utc::now() + ttl,
            },
        );
    }
}

impl TokenStore for InMemoryTokenStore {
    fn resolve(&self, token: &str) -> Option<Session> {
        if self.revoked.contains(token) {
            return None;
        }
        let session = self.sessions.get(token)?.clone();
        if session.is_expired(Utc::now()) {
            return None;
        }
        Some(session)
    }

    fn revoke(&self, token: &str) {
        self.revoked.insert(token.to_string());
    }
}

/// Extract the token from an `Authorization: Bearer ...` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
