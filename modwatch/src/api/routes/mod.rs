//! API route modules.

pub mod admin;
pub mod health;

use axum::Router;

use crate::api::middleware::AdminTokenLayer;
use crate::api::server::AppState;

/// Create the main API router with all routes.
///
/// Everything under `/api/admin` requires the admin bearer token.
pub fn create_router(state: AppState, admin_token: &str) -> Router {
    Router::new()
        .nest(
            "/api/admin",
            admin::router().route_layer(AdminTokenLayer::new(admin_token)),
        )
        .nest("/api/health", health::router())
        .with_state(state)
}
