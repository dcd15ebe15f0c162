//! Shared types for the polling crates.
//!
//! - [`Config`]: layered settings for the server, database and API tokens
//! - [`AppError`] / [`AppResult`]: the error taxonomy and its HTTP envelope
//! - [`FieldError`]: one field-level validation failure
//! - [`IdGenerator`]: lower-case ULIDs for polls, options and votes
//!
//! # Example
//!
//! ```no_run
//! use polling_common::{AppError, AppResult, Config};
//!
//! fn require_title(title: &str) -> AppResult<()> {
//!     if title.trim().is_empty() {
//!         return Err(AppError::field("title", "Title is required"));
//!     }
//!     Ok(())
//! }
//!
//! let config = Config::load().expect("configuration");
//! println!("listening on {}:{}", config.server.host, config.server.port);
//! ```

pub mod config;
pub mod error;
pub mod id;

pub use config::Config;
pub use error::{AppError, AppResult, FieldError};
pub use id::IdGenerator;
