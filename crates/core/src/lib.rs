//! Core business logic for updoot-rs.

pub mod services;

pub use services::*;
