//! services/api/src/web/csrf.rs
//!
//! Anti-forgery tokens. Handed out by `GET /api/csrf-token` and echoed back in
//! the `x-csrf-token` header on every state-changing request outside `/api/auth`.

use dashmap::DashMap;
use rand::Rng;
use std::time::{Duration, Instant};

pub const CSRF_HEADER: &str = "x-csrf-token";

/// Where issued anti-forgery tokens live. Injected through `AppState`.
pub trait CsrfTokenStore: Send + Sync {
    fn issue(&self) -> String;
    fn validate(&self, token: &str) -> bool;
}

/// Keeps tokens in memory until they expire. Tokens stay valid for reuse
/// within their lifetime.
pub struct InMemoryCsrfStore {
    tokens: DashMap<String, Instant>,
    ttl: Duration,
}

impl InMemoryCsrfStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            tokens: DashMap::new(),
            ttl,
        }
    }

    fn issue_at(&self, now: Instant) -> String {
        self.tokens.retain(|_, expires_at| *expires_at > now);
        let bytes: [u8; 32] = rand::rng().random();
        let token = hex::encode(bytes);
        self.tokens.insert(token.clone(), now + self.ttl);
        token
    }

    fn validate_at(&self, token: &str, now: Instant) -> bool {
        self.tokens
            .get(token)
            .is_some_and(|expires_at| *expires_at > now)
    }
}

impl CsrfTokenStore for InMemoryCsrfStore {
    fn issue(&self) -> String {
        self.issue_at(Instant::now())
    }

    fn validate(&self, token: &str) -> bool {
        self.validate_at(token, Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_validate_until_they_expire() {
        let store = InMemoryCsrfStore::new(Duration::from_secs(60));
        let start = Instant::now();
        let token = store.issue_at(start);

        assert_eq!(token.len(), 64);
        assert!(store.validate_at(&token, start + Duration::from_secs(59)));
        assert!(store.validate_at(&token, start + Duration::from_secs(59)));
        assert!(!store.validate_at(&token, start + Duration::from_secs(61)));
    }

    #[test]
    fn unknown_tokens_are_rejected() {
        let store = InMemoryCsrfStore::new(Duration::from_secs(60));
        store.issue();
        assert!(!store.validate("not-a-token"));
        assert!(!store.validate(""));
    }
}
