//! HTTP API layer for the polling service.
//!
//! - **Endpoints**: poll CRUD, voting and results under `/api/polls`
//! - **Extractors**: authenticated and optionally authenticated users
//! - **Middleware**: bearer token authentication
//! - **Response**: the `{ success, data, error, message }` envelope
//!
//! Built on Axum 0.8.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

use axum::{Router, routing::get};

pub use endpoints::{health, router};
pub use middleware::AppState;

/// Full application router: `/api` routes, `/health`, and authentication.
///
/// Transport layers (tracing, CORS, timeouts) are left to the caller.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ))
        .with_state(state)
}
