//! Shared application state for all routes.

use crate::config::ResourceRegistry;
use crate::session::SessionStore;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    /// Fixed at startup; descriptors are not reloaded.
    pub registry: Arc<ResourceRegistry>,
    pub sessions: Arc<dyn SessionStore>,
}

impl AppState {
    pub fn new(pool: SqlitePool, registry: ResourceRegistry, sessions: Arc<dyn SessionStore>) -> Self {
        AppState {
            pool,
            registry: Arc::new(registry),
            sessions,
        }
    }
}
