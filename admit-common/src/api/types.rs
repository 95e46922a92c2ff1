//! Shared API request/response types

use serde::{Deserialize, Serialize};

/// Authentication parameters for GET/DELETE requests (query parameters)
///
/// ```
/// // GET /api/tickets?timestamp=1730000000000&hash=abc123...
/// use admit_common::api::types::AuthQuery;
///
/// let query = AuthQuery {
///     timestamp: 1730000000000,
///     hash: "abc123...".to_string(),
/// };
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthQuery {
    /// Unix epoch time in milliseconds
    pub timestamp: i64,

    /// SHA-256 hash (64 hex chars)
    pub hash: String,
}
