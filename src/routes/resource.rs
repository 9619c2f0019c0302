//! Resource family routes. One path per family; the handler dispatches on method and query.

use crate::handlers::resource::dispatch;
use crate::state::AppState;
use axum::{routing::any, Router};

pub fn resource_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/:resource", any(dispatch))
        .with_state(state)
}
