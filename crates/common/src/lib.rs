//! Common utilities and shared types for updoot-rs.
//!
//! This crate provides foundational components used across all updoot-rs crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **Token generation**: Bearer and password-reset tokens via [`IdGenerator`]
//!
//! # Example
//!
//! ```no_run
//! use updoot_common::{Config, IdGenerator};
//!
//! fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let token = id_gen.generate_token();
//!     println!("Listening on {}:{} ({token})", config.server.host, config.server.port);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
