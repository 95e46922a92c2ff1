//! Shared HTTP API functionality
//!
//! Pure functions and shared types only; no HTTP framework dependencies.
//! The service crate wraps these with axum middleware.

pub mod auth;
pub mod types;

pub use auth::{
    calculate_hash, query_hash, sign_request, validate_hash, validate_query_hash,
    validate_timestamp,
    verify_webhook_signature, ApiAuthError,
};
pub use types::AuthQuery;
