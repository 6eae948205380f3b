//! Shared types for Causeway
//!
//! Error kinds and the crate-wide `Result` alias.

pub mod error;

pub use error::{ApiError, Result};
