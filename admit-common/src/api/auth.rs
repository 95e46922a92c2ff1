//! Caller authentication primitives
//!
//! Two independent schemes:
//!
//! - **Webhook signature**: the payment provider sends a fixed secret hash in
//!   the `verif-hash` header. It is compared in constant time against the
//!   provisioned value.
//! - **Admin request signing**: privileged callers (scanner devices, ticket
//!   administration) include `timestamp` (Unix epoch ms) and `hash` fields.
//!   `hash` is the hex SHA-256 of the canonical request JSON (with the hash
//!   field replaced by 64 zeros) followed by the admin secret.
//!
//! Pure functions only; HTTP wiring lives in the service crate.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Placeholder substituted for the hash field before hashing
pub const DUMMY_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Authentication error types
#[derive(Debug, Clone)]
pub enum ApiAuthError {
    /// Timestamp outside acceptable window
    InvalidTimestamp {
        timestamp: i64,
        now: i64,
        reason: String,
    },

    /// Hash does not match calculated value
    InvalidHash,

    /// Webhook signature header absent or wrong
    InvalidSignature,
}

impl std::fmt::Display for ApiAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiAuthError::InvalidTimestamp { reason, .. } => {
                write!(f, "Invalid timestamp: {}", reason)
            }
            ApiAuthError::InvalidHash => write!(f, "Invalid hash"),
            ApiAuthError::InvalidSignature => write!(f, "Invalid webhook signature"),
        }
    }
}

impl std::error::Error for ApiAuthError {}

// ========================================
// Webhook Signature
// ========================================

/// Verify the provider's `verif-hash` header against the provisioned secret
///
/// Constant-time with respect to the header contents.
pub fn verify_webhook_signature(provided: Option<&str>, expected: &str) -> Result<(), ApiAuthError> {
    match provided {
        Some(sig) if constant_time_eq::constant_time_eq(sig.as_bytes(), expected.as_bytes()) => {
            Ok(())
        }
        _ => Err(ApiAuthError::InvalidSignature),
    }
}

// ========================================
// Timestamp Validation
// ========================================

/// Validate a request timestamp against `now` with a symmetric window
///
/// # Examples
///
/// ```
/// use admit_common::api::auth::validate_timestamp;
///
/// let now = 1_730_000_000_000i64;
/// assert!(validate_timestamp(now - 500, now, 30_000).is_ok());
/// assert!(validate_timestamp(now - 31_000, now, 30_000).is_err());
/// ```
pub fn validate_timestamp(timestamp: i64, now: i64, window_ms: i64) -> Result<(), ApiAuthError> {
    let diff = now - timestamp;

    if diff > window_ms {
        return Err(ApiAuthError::InvalidTimestamp {
            timestamp,
            now,
            reason: format!("Timestamp {}ms too old (max {}ms past)", diff, window_ms),
        });
    }

    if diff < -window_ms {
        return Err(ApiAuthError::InvalidTimestamp {
            timestamp,
            now,
            reason: format!(
                "Timestamp {}ms in future (max {}ms future)",
                diff.abs(),
                window_ms
            ),
        });
    }

    Ok(())
}

// ========================================
// Hash Calculation and Validation
// ========================================

/// Calculate the request hash
///
/// 1. Replace hash field with [`DUMMY_HASH`]
/// 2. Convert to canonical JSON (sorted keys, no whitespace)
/// 3. Append the admin secret
/// 4. SHA-256, rendered as 64 hex characters
///
/// # Examples
///
/// ```
/// use admit_common::api::auth::calculate_hash;
/// use serde_json::json;
///
/// let body = json!({"qrData": "abc", "timestamp": 1730000000000i64, "hash": ""});
/// let hash = calculate_hash(&body, "gate-secret");
/// assert_eq!(hash.len(), 64);
/// ```
pub fn calculate_hash(json_value: &Value, secret: &str) -> String {
    let mut value = json_value.clone();
    if let Some(obj) = value.as_object_mut() {
        obj.insert("hash".to_string(), Value::String(DUMMY_HASH.to_string()));
    }

    let canonical = to_canonical_json(&value);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.update(secret.as_bytes());
    let result = hasher.finalize();

    format!("{:x}", result)
}

/// Convert JSON to canonical form (sorted keys, no whitespace)
///
/// String escaping follows serde_json, so any valid JSON string round-trips.
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let items: Vec<String> = pairs
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), to_canonical_json(v)))
                .collect();
            format!("{{{}}}", items.join(","))
        }
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}

/// Validate that the provided hash matches the request contents
pub fn validate_hash(provided_hash: &str, json_value: &Value, secret: &str) -> Result<(), ApiAuthError> {
    let calculated = calculate_hash(json_value, secret);

    if !constant_time_eq::constant_time_eq(provided_hash.as_bytes(), calculated.as_bytes()) {
        return Err(ApiAuthError::InvalidHash);
    }

    Ok(())
}

/// Sign a request body in place: sets `timestamp` and `hash`
///
/// Used by scanner clients, the CLI, and tests.
pub fn sign_request(body: &mut Value, secret: &str, timestamp: i64) {
    if let Some(obj) = body.as_object_mut() {
        obj.insert("timestamp".to_string(), Value::from(timestamp));
        obj.insert("hash".to_string(), Value::String(DUMMY_HASH.to_string()));
    }
    let hash = calculate_hash(body, secret);
    if let Some(obj) = body.as_object_mut() {
        obj.insert("hash".to_string(), Value::String(hash));
    }
}

/// Hash for query-string authenticated requests (GET/DELETE)
///
/// The signed object is `{"method": <METHOD>, "path": <path>, "timestamp": <ts>}`,
/// so a credential only authorises the request it was made for.
pub fn query_hash(method: &str, path: &str, timestamp: i64, secret: &str) -> String {
    let signed = serde_json::json!({
        "method": method.to_ascii_uppercase(),
        "path": path,
        "timestamp": timestamp,
    });
    calculate_hash(&signed, secret)
}

/// Validate the hash of a query-string authenticated request
pub fn validate_query_hash(
    provided_hash: &str,
    method: &str,
    path: &str,
    timestamp: i64,
    secret: &str,
) -> Result<(), ApiAuthError> {
    let calculated = query_hash(method, path, timestamp, secret);

    if !constant_time_eq::constant_time_eq(provided_hash.as_bytes(), calculated.as_bytes()) {
        return Err(ApiAuthError::InvalidHash);
    }

    Ok(())
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_730_000_000_000;

    #[test]
    fn test_webhook_signature_match() {
        assert!(verify_webhook_signature(Some("flw-secret"), "flw-secret").is_ok());
    }

    #[test]
    fn test_webhook_signature_mismatch() {
        assert!(verify_webhook_signature(Some("flw-secreT"), "flw-secret").is_err());
        assert!(verify_webhook_signature(Some(""), "flw-secret").is_err());
        assert!(verify_webhook_signature(None, "flw-secret").is_err());
    }

    #[test]
    fn test_valid_timestamp_accepted() {
        assert!(validate_timestamp(NOW, NOW, 30_000).is_ok());
        assert!(validate_timestamp(NOW - 30_000, NOW, 30_000).is_ok());
        assert!(validate_timestamp(NOW + 30_000, NOW, 30_000).is_ok());
    }

    #[test]
    fn test_timestamp_outside_window_rejected() {
        assert!(validate_timestamp(NOW - 30_001, NOW, 30_000).is_err());
        assert!(validate_timestamp(NOW + 30_001, NOW, 30_000).is_err());
    }

    #[test]
    fn test_hash_calculation_algorithm() {
        let body = json!({"qrData": "token", "timestamp": NOW, "hash": "ignored"});

        let hash = calculate_hash(&body, "secret");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));

        // Hash field contents do not influence the result
        let body2 = json!({"qrData": "token", "timestamp": NOW, "hash": "other"});
        assert_eq!(hash, calculate_hash(&body2, "secret"));

        assert_ne!(hash, calculate_hash(&body, "other-secret"));
    }

    #[test]
    fn test_canonical_json_sorting() {
        let canonical = to_canonical_json(&json!({"z": 3, "a": 1, "m": {"y": true, "b": null}}));
        assert_eq!(canonical, r#"{"a":1,"m":{"b":null,"y":true},"z":3}"#);
    }

    #[test]
    fn test_canonical_json_escapes_strings() {
        let canonical = to_canonical_json(&json!({"k": "line\nbreak \"quoted\""}));
        assert_eq!(canonical, r#"{"k":"line\nbreak \"quoted\""}"#);
    }

    #[test]
    fn test_sign_then_validate() {
        let mut body = json!({"qrData": "token"});
        sign_request(&mut body, "secret", NOW);

        let hash = body["hash"].as_str().unwrap().to_string();
        assert!(validate_hash(&hash, &body, "secret").is_ok());
        assert!(validate_hash(&hash, &body, "wrong").is_err());

        body["qrData"] = json!("tampered");
        assert!(validate_hash(&hash, &body, "secret").is_err());
    }

    #[test]
    fn test_query_hash_matches_signed_object() {
        let hash = query_hash("get", "/api/tickets", NOW, "secret");
        let signed = json!({"method": "GET", "path": "/api/tickets", "timestamp": NOW, "hash": hash});
        assert!(validate_hash(&hash, &signed, "secret").is_ok());
    }

    #[test]
    fn test_query_hash_validation() {
        let hash = query_hash("GET", "/api/tickets", NOW, "secret");
        assert!(validate_query_hash(&hash, "GET", "/api/tickets", NOW, "secret").is_ok());
        assert!(validate_query_hash(&hash, "GET", "/api/tickets", NOW + 1, "secret").is_err());
        assert!(validate_query_hash(&hash, "GET", "/api/tickets", NOW, "other").is_err());
    }

    #[test]
    fn test_query_hash_bound_to_method_and_path() {
        let hash = query_hash("GET", "/api/tickets/NACOS-1", NOW, "secret");
        assert!(validate_query_hash(&hash, "DELETE", "/api/tickets/NACOS-1", NOW, "secret").is_err());
        assert!(validate_query_hash(&hash, "GET", "/api/tickets/NACOS-2", NOW, "secret").is_err());
    }
}
