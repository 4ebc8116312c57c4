//! HTTP API layer for updoot-rs.
//!
//! - **Endpoints**: posts, voting and account management
//! - **Extractors**: authenticated / optional user
//! - **Middleware**: bearer token authentication
//!
//! Built on Axum 0.8.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
