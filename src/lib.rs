//! Causeway - client data-access layer for the Concord protocol
//!
//! Concord is a federated, cryptographically-signed social-object protocol:
//! entities, characters, messages, associations, and streams are hosted
//! across many independently-operated servers, addressed by a content-owner
//! identifier (CCID) plus an optional `@host` suffix.
//!
//! ## Layers
//!
//! - **Transport**: one generic fetch primitive ([`transport::Transport`])
//! - **Session**: bearer-token minting via signed claims ([`auth::Session`])
//! - **Cache**: single-flight memoization per entity kind ([`cache::SingleFlight`])
//! - **Loaders**: typed read/write operations per entity kind ([`api::Api`])
//! - **Query**: multi-host fan-out and merge for stream ranges ([`query`])
//! - **Facade**: the operations applications call ([`client::Client`])

pub mod api;
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod crypto;
pub mod model;
pub mod query;
pub mod schemas;
pub mod transport;
pub mod types;

/// Versioned path prefix shared by every protocol route
pub(crate) const API_PATH: &str = "/api/v1";

pub use client::{Client, DeliveryPlan, User};
pub use config::ClientConfig;
pub use types::{ApiError, Result};
