use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use rand::{distributions::Alphanumeric, thread_rng, Rng};

use crate::models::otp::ResetSession;

const SESSION_TOKEN_LENGTH: usize = 64;

/// In-process reset sessions keyed by an opaque token. The token is the only
/// thing the client ever sees; the progress flags stay server-side.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, ResetSession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn generate_token() -> String {
        thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SESSION_TOKEN_LENGTH)
            .map(char::from)
            .collect()
    }

    /// Store `session` under the caller's existing token, or under a freshly
    /// generated one. Overwrites whatever was there, so a repeated reset
    /// request never carries a verified flag over.
    pub fn bind(&self, token: Option<String>, session: ResetSession) -> String {
        let token = token.unwrap_or_else(Self::generate_token);
        self.sessions
            .write()
            .unwrap()
            .insert(token.clone(), session);
        token
    }

    pub fn get(&self, token: &str) -> Option<ResetSession> {
        self.sessions.read().unwrap().get(token).cloned()
    }

    pub fn put(&self, token: &str, session: ResetSession) {
        self.sessions
            .write()
            .unwrap()
            .insert(token.to_string(), session);
    }

    pub fn remove(&self, token: &str) {
        self.sessions.write().unwrap().remove(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_generates_distinct_opaque_tokens() {
        let store = SessionStore::new();

        let a = store.bind(None, ResetSession::default());
        let b = store.bind(None, ResetSession::default());

        assert_eq!(SESSION_TOKEN_LENGTH, a.len());
        assert_ne!(a, b);
    }

    #[test]
    fn bind_with_existing_token_overwrites() {
        let store = SessionStore::new();

        let token = store.bind(
            None,
            ResetSession {
                reset_email: Some("first@example.com".to_string()),
                otp_verified: true,
            },
        );
        store.bind(
            Some(token.clone()),
            ResetSession {
                reset_email: Some("second@example.com".to_string()),
                otp_verified: false,
            },
        );

        let session = store.get(&token).expect("session should exist");
        assert_eq!(Some("second@example.com".to_string()), session.reset_email);
        assert!(!session.otp_verified);
    }

    #[test]
    fn remove_forgets_the_session() {
        let store = SessionStore::new();

        let token = store.bind(None, ResetSession::default());
        store.remove(&token);

        assert!(store.get(&token).is_none());
    }
}
