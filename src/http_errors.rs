// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP error code mapping to Cloud DNS failure reasons.
//!
//! This module maps HTTP status codes returned by the Cloud DNS API and the Google
//! token endpoints to short, stable reason strings. The reasons appear in log lines
//! and in [`DnsApiError::Http`](crate::dns_errors::DnsApiError::Http).
//!
//! # Usage
//!
//! ```rust
//! use private_dns::http_errors::map_http_error_to_reason;
//!
//! let (reason, message) = map_http_error_to_reason(409);
//! assert_eq!(reason, "RecordAlreadyExists");
//!
//! let (reason, message) = map_http_error_to_reason(503);
//! assert_eq!(reason, "CloudDnsUnavailable");
//! ```

/// Request rejected as malformed (400)
pub const REASON_BAD_REQUEST: &str = "CloudDnsBadRequest";

/// Missing or expired credentials (401)
pub const REASON_UNAUTHENTICATED: &str = "CloudDnsUnauthenticated";

/// Credentials lack the needed permission (403)
pub const REASON_FORBIDDEN: &str = "CloudDnsForbidden";

/// Project, zone, or change not found (404)
pub const REASON_NOT_FOUND: &str = "ManagedZoneNotFound";

/// An addition collided with an existing record set (409)
pub const REASON_ALREADY_EXISTS: &str = "RecordAlreadyExists";

/// A deletion no longer matches the stored record set (412)
pub const REASON_CONDITION_NOT_MET: &str = "RecordConditionNotMet";

/// Quota or rate limit exceeded (429)
pub const REASON_RATE_LIMITED: &str = "CloudDnsRateLimited";

/// Internal error on the provider side (500)
pub const REASON_INTERNAL_ERROR: &str = "CloudDnsInternalError";

/// Gateway or availability error (502, 503, 504)
pub const REASON_UNAVAILABLE: &str = "CloudDnsUnavailable";

/// Any other status
pub const REASON_UNEXPECTED: &str = "CloudDnsUnexpectedStatus";

/// Map HTTP status code to a reason and message.
///
/// # Arguments
///
/// * `status_code` - HTTP status code (e.g., 400, 404, 500)
///
/// # Returns
///
/// A tuple of `(reason, message)`:
/// - `reason` - One of the `REASON_*` constants in this module
/// - `message` - Human-readable explanation of the error
///
/// # HTTP Code Mapping
///
/// | HTTP Code | Reason | Meaning |
/// |-----------|--------|---------|
/// | 400 | `CloudDnsBadRequest` | Invalid request |
/// | 401 | `CloudDnsUnauthenticated` | Token missing or expired |
/// | 403 | `CloudDnsForbidden` | Insufficient permissions |
/// | 404 | `ManagedZoneNotFound` | Project, zone or change not found |
/// | 409 | `RecordAlreadyExists` | Addition collided with an existing record |
/// | 412 | `RecordConditionNotMet` | Deletion did not match the stored record |
/// | 429 | `CloudDnsRateLimited` | Rate limited |
/// | 500 | `CloudDnsInternalError` | Internal server error |
/// | 502-504 | `CloudDnsUnavailable` | Gateway or availability error |
/// | Other | `CloudDnsUnexpectedStatus` | Unexpected error |
#[must_use]
pub fn map_http_error_to_reason(status_code: u16) -> (&'static str, String) {
    match status_code {
        400 => (
            REASON_BAD_REQUEST,
            "Invalid request to Cloud DNS (400)".into(),
        ),
        401 => (
            REASON_UNAUTHENTICATED,
            "Cloud DNS authentication required (401)".into(),
        ),
        403 => (
            REASON_FORBIDDEN,
            "Cloud DNS authorization failed (403)".into(),
        ),
        404 => (
            REASON_NOT_FOUND,
            "Managed zone or change not found (404)".into(),
        ),
        409 => (
            REASON_ALREADY_EXISTS,
            "Record set already exists in the zone (409)".into(),
        ),
        412 => (
            REASON_CONDITION_NOT_MET,
            "Record set to delete does not match the zone (412)".into(),
        ),
        429 => (
            REASON_RATE_LIMITED,
            "Cloud DNS rate limit exceeded (429)".into(),
        ),
        500 => (
            REASON_INTERNAL_ERROR,
            "Cloud DNS internal error (500)".into(),
        ),
        502 => (REASON_UNAVAILABLE, "Bad gateway reaching Cloud DNS (502)".into()),
        503 => (REASON_UNAVAILABLE, "Cloud DNS unavailable (503)".into()),
        504 => (
            REASON_UNAVAILABLE,
            "Gateway timeout reaching Cloud DNS (504)".into(),
        ),
        _ => (
            REASON_UNEXPECTED,
            format!("Unexpected HTTP status from Cloud DNS ({status_code})"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_http_400() {
        let (reason, message) = map_http_error_to_reason(400);
        assert_eq!(reason, REASON_BAD_REQUEST);
        assert!(message.contains("400"));
        assert!(message.contains("Invalid"));
    }

    #[test]
    fn test_map_http_401_and_403() {
        assert_eq!(map_http_error_to_reason(401).0, REASON_UNAUTHENTICATED);
        assert_eq!(map_http_error_to_reason(403).0, REASON_FORBIDDEN);
    }

    #[test]
    fn test_map_http_404() {
        let (reason, message) = map_http_error_to_reason(404);
        assert_eq!(reason, REASON_NOT_FOUND);
        assert!(message.contains("not found"));
    }

    #[test]
    fn test_map_http_conflicts() {
        assert_eq!(map_http_error_to_reason(409).0, REASON_ALREADY_EXISTS);
        assert_eq!(map_http_error_to_reason(412).0, REASON_CONDITION_NOT_MET);
    }

    #[test]
    fn test_map_http_429() {
        let (reason, message) = map_http_error_to_reason(429);
        assert_eq!(reason, REASON_RATE_LIMITED);
        assert!(message.contains("429"));
    }

    #[test]
    fn test_map_http_5xx() {
        assert_eq!(map_http_error_to_reason(500).0, REASON_INTERNAL_ERROR);
        for status in [502, 503, 504] {
            let (reason, message) = map_http_error_to_reason(status);
            assert_eq!(reason, REASON_UNAVAILABLE);
            assert!(message.contains(&status.to_string()));
        }
    }

    #[test]
    fn test_map_http_unknown() {
        let (reason, message) = map_http_error_to_reason(418);
        assert_eq!(reason, REASON_UNEXPECTED);
        assert!(message.contains("418"));
    }
}
