//! Course portal server.
//!
//! Run from repo root: `cargo run -p course-portal-server`

use course_portal::config::Role;
use course_portal::{app, apply_migrations, connect, init_tracing, load_registry, AppState, InMemorySessionStore, Settings};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env();
    init_tracing();
    let registry = load_registry(&settings).await?;
    let pool = connect(&settings).await?;
    apply_migrations(&pool, &registry).await?;

    let sessions = InMemorySessionStore::new();
    if let Some(token) = &settings.admin_token {
        sessions.insert(token.clone(), "admin", Role::Admin);
        tracing::info!("admin session token loaded from settings");
    }

    tracing::info!(resources = ?registry.names().collect::<Vec<_>>(), "resource families registered");
    let state = AppState::new(pool, registry, Arc::new(sessions));

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("course portal listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app(state, settings.max_body_bytes)).await?;
    Ok(())
}
