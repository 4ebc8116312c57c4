//! API endpoints.

#![allow(missing_docs)]

mod auth;
mod posts;

use axum::Router;

use crate::middleware::AppState;

pub use auth::{AuthResponse, UserSummary};
pub use posts::{PaginatedPosts, PostResponse};

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .nest("/posts", posts::router())
}
