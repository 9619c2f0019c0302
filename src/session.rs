//! Session collaborator: resolves a bearer token to an authenticated subject and role.

use crate::config::Role;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub subject: String,
    pub role: Role,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn lookup(&self, token: &str) -> Option<Session>;
}

/// Process-local token table. Tokens are random UUIDs unless seeded explicitly.
#[derive(Default)]
pub struct InMemorySessionStore {
    by_token: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        InMemorySessionStore::default()
    }

    /// Open a session and return its token.
    pub fn issue(&self, subject: &str, role: Role) -> String {
        let token = Uuid::new_v4().to_string();
        self.insert(token.clone(), subject, role);
        token
    }

    /// Register a caller-chosen token (e.g. an operator token from settings).
    pub fn insert(&self, token: String, subject: &str, role: Role) {
        let session = Session {
            subject: subject.to_string(),
            role,
        };
        if let Ok(mut map) = self.by_token.write() {
            map.insert(token, session);
        }
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.by_token
            .write()
            .map(|mut map| map.remove(token).is_some())
            .unwrap_or(false)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn lookup(&self, token: &str) -> Option<Session> {
        self.by_token.read().ok()?.get(token).cloned()
    }
}
