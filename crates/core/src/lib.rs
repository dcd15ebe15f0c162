//! Core business logic for the polling service.
//!
//! Services are constructed with their storage collaborators injected as
//! trait objects, so the same logic runs against the in-memory and the
//! `PostgreSQL` backends.

pub mod services;

pub use services::*;
