//! Runtime settings from environment (after `dotenvy`).

use std::env;
use std::path::PathBuf;

const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Settings {
    /// sqlx SQLite URL, e.g. `sqlite://portal.db` or `sqlite::memory:`.
    pub database_url: String,
    pub bind_addr: String,
    /// Optional JSON file of resource descriptors; built-ins are used when unset.
    pub resources_path: Option<PathBuf>,
    pub max_body_bytes: usize,
    /// Seeded into the in-memory session store as an admin session.
    pub admin_token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: "sqlite://portal.db".into(),
            bind_addr: "0.0.0.0:3000".into(),
            resources_path: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            admin_token: None,
        }
    }
}

impl Settings {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup; unset or blank values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Settings::default();
        Settings {
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            resources_path: get("PORTAL_RESOURCES").map(PathBuf::from),
            max_body_bytes: get("PORTAL_MAX_BODY_BYTES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_body_bytes),
            admin_token: get("PORTAL_ADMIN_TOKEN"),
        }
    }
}
