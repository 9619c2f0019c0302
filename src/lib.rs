//! Course portal: descriptor-driven parent/comment CRUD engine over SQLite.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod migration;
pub mod response;
pub mod routes;
pub mod service;
pub mod session;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{builtin_resources, load_from_path, resolve, ResolvedResource, ResourceRegistry, Settings};
pub use error::{AppError, ConfigError};
pub use migration::apply_migrations;
pub use response::{error_body, success_many, success_one};
pub use routes::{common_routes, common_routes_with_ready, resource_routes};
pub use service::{CascadeDeleter, Repository, RequestValidator};
pub use session::{InMemorySessionStore, Session, SessionStore};
pub use state::AppState;
pub use store::{connect, connect_in_memory};

use axum::{http::Method, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

/// Full application router: health/ready/version plus `/api/:resource`, with body limit, CORS and request tracing.
pub fn app(state: AppState, max_body_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ]);
    common_routes_with_ready(state.clone())
        .merge(resource_routes(state))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Install the fmt subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("course_portal=info,tower_http=info")),
        )
        .init();
}

/// Descriptors from `settings.resources_path` when set, otherwise the built-in families.
pub async fn load_registry(settings: &Settings) -> Result<ResourceRegistry, ConfigError> {
    let descriptors = match &settings.resources_path {
        Some(path) => load_from_path(path).await?,
        None => builtin_resources(),
    };
    resolve(&descriptors)
}
