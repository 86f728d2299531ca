// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS provider, pod source, and naming error types.
//!
//! This module provides specialized error types for:
//! - Cloud DNS API operations (record listing, changes, change status)
//! - Access token acquisition for Cloud DNS
//! - Kubernetes pod lookups
//! - Record name derivation
//!
//! Every error can be classified as retryable or permanent so the record store
//! knows when to back off and when to give up, and so the reconcile loops can
//! report failures without terminating.

use thiserror::Error;

/// Errors returned by a [`DnsApi`](crate::record_store::DnsApi) implementation.
#[derive(Error, Debug, Clone)]
pub enum DnsApiError {
    /// The provider answered with a non-success HTTP status.
    ///
    /// `reason` is a condition reason from [`crate::http_errors`].
    #[error("Cloud DNS returned HTTP {status} ({reason}): {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Condition reason derived from the status code
        reason: &'static str,
        /// Response body or provider error message
        message: String,
    },

    /// The request never produced an HTTP response (connection refused, DNS, TLS).
    #[error("Connection to Cloud DNS failed: {0}")]
    Transport(String),

    /// The request exceeded its deadline.
    #[error("Request to Cloud DNS timed out after {timeout_ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        timeout_ms: u64,
    },

    /// Fetching an access token failed for a reason that may go away (metadata server
    /// hiccup, token endpoint 5xx).
    #[error("Failed to obtain access token: {0}")]
    TokenUnavailable(String),

    /// The configured credentials cannot be used at all (unreadable key file, bad PEM,
    /// token endpoint rejected the assertion).
    #[error("Invalid Cloud DNS credentials: {0}")]
    Credentials(String),

    /// A response body could not be decoded.
    #[error("Failed to decode Cloud DNS response: {0}")]
    Decode(String),

    /// A concurrent change kept invalidating our read-modify-write sequence.
    #[error("Record '{name}' changed concurrently {attempts} times, giving up")]
    ConflictExhausted {
        /// The record name being written
        name: String,
        /// Number of attempts made
        attempts: u32,
    },

    /// Shutdown was requested while the operation was waiting.
    #[error("Operation cancelled by shutdown")]
    Cancelled,
}

impl DnsApiError {
    /// Returns true if this error is transient and the call should be retried with backoff.
    ///
    /// Retryable: HTTP 429 and 5xx, transport failures, timeouts, transient token failures.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Transport(_) | Self::Timeout { .. } | Self::TokenUnavailable(_) => true,
            Self::Credentials(_)
            | Self::Decode(_)
            | Self::ConflictExhausted { .. }
            | Self::Cancelled => false,
        }
    }

    /// Returns true if the zone changed underneath a change submission.
    ///
    /// Cloud DNS answers 409 when an addition collides with an existing record set and
    /// 412 when a deletion no longer matches the stored record set.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Http { status: 409 | 412, .. })
    }

    /// Short error category used as a metrics label.
    #[must_use]
    pub fn class(&self) -> &'static str {
        if matches!(self, Self::Cancelled) {
            "cancelled"
        } else if self.is_conflict() || matches!(self, Self::ConflictExhausted { .. }) {
            "conflict"
        } else if self.is_retryable() {
            "retryable"
        } else {
            "permanent"
        }
    }
}

/// Errors returned by an [`InstanceSource`](crate::instance_source::InstanceSource).
#[derive(Error, Debug)]
pub enum InstanceSourceError {
    /// The Kubernetes API call failed
    #[error("Kubernetes API error while {operation}: {source}")]
    Kube {
        /// What was being attempted (e.g. "listing pods")
        operation: String,
        /// Underlying kube error
        #[source]
        source: kube::Error,
    },

    /// Generic failure for non-Kubernetes sources
    #[error("Pod source failed: {0}")]
    Other(String),
}

/// Errors deriving a record name for an instance.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamingError {
    /// The full name format needs an owner reference and the pod has none
    #[error("Pod '{namespace}/{name}' has no owner reference; cannot derive a full-format record name")]
    MissingOwner {
        /// Pod name
        name: String,
        /// Pod namespace
        namespace: String,
    },
}

/// Composite error for a single reconcile step (one event or one scanned instance).
#[derive(Error, Debug)]
pub enum SyncError {
    /// Cloud DNS failed
    #[error(transparent)]
    Dns(#[from] DnsApiError),

    /// Pod lookup failed
    #[error(transparent)]
    Source(#[from] InstanceSourceError),

    /// Record name could not be derived
    #[error(transparent)]
    Naming(#[from] NamingError),
}

impl SyncError {
    /// Returns true if repeating the step later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Dns(e) => e.is_retryable() || e.is_conflict(),
            Self::Source(_) => true,
            Self::Naming(_) => false,
        }
    }

    /// Error category used as a metrics label.
    #[must_use]
    pub fn class(&self) -> &'static str {
        match self {
            Self::Dns(e) => e.class(),
            Self::Source(_) => "source",
            Self::Naming(_) => "naming",
        }
    }
}

#[cfg(test)]
#[path = "dns_errors_tests.rs"]
mod dns_errors_tests;
