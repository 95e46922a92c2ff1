//! Timestamp utilities

use chrono::{DateTime, SubsecRound, Utc};

/// Get current UTC timestamp
///
/// Truncated to microseconds, the precision timestamps are stored with, so a
/// value compares equal to itself after a store round trip.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Current Unix epoch time in milliseconds
///
/// Used for signed admin requests, whose `timestamp` field is epoch ms.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parse a stored RFC 3339 timestamp
pub fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[tokio::test]
    async fn test_now_successive_calls_advance() {
        let time1 = now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let time2 = now();
        assert!(time2 > time1);
    }

    #[test]
    fn test_now_millis_matches_now() {
        let ms = now_millis();
        let secs = now().timestamp();
        assert!((ms / 1000 - secs).abs() <= 1);
    }

    #[test]
    fn test_parse_rfc3339_roundtrip() {
        let t = now();
        let parsed = parse_rfc3339(&t.to_rfc3339()).unwrap();
        assert_eq!(parsed, t);
    }

    #[test]
    fn test_now_has_microsecond_precision() {
        assert_eq!(now().timestamp_subsec_nanos() % 1000, 0);
    }

    #[test]
    fn test_parse_rfc3339_rejects_garbage() {
        assert!(parse_rfc3339("yesterday").is_none());
    }
}
