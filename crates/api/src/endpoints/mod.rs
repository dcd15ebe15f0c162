//! API endpoints.

mod meta;
mod polls;

use axum::Router;

use crate::middleware::AppState;

pub use meta::{HealthResponse, health};
pub use polls::{ListPollsQuery, PollDetailResponse, VoteRequest};

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new().nest("/polls", polls::router())
}
