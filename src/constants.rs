// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the private DNS operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// DNS Record Constants
// ============================================================================

/// The only record type this operator manages
pub const RECORD_TYPE_A: &str = "A";

/// TTL for every A record written by the operator (1 minute)
pub const RECORD_TTL_SECS: u32 = 60;

/// Page size requested when listing a whole managed zone
pub const CLOUD_DNS_LIST_PAGE_SIZE: u32 = 500;

/// Number of read-modify-write attempts before a concurrent-change conflict is surfaced
pub const MAX_CONFLICT_ATTEMPTS: u32 = 3;

// ============================================================================
// Cloud DNS API Constants
// ============================================================================

/// Default Cloud DNS API endpoint
pub const CLOUD_DNS_ENDPOINT: &str = "https://dns.googleapis.com";

/// OAuth2 scope granting read/write access to Cloud DNS
pub const CLOUD_DNS_SCOPE: &str = "https://www.googleapis.com/auth/ndev.clouddns.readwrite";

/// Default OAuth2 token endpoint used when a key file does not carry `token_uri`
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// JWT bearer grant type for service account token exchange
pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for service account assertions (1 hour, the maximum Google accepts)
pub const SERVICE_ACCOUNT_ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh access tokens this long before they expire (5 minutes)
pub const TOKEN_REFRESH_BUFFER_SECS: i64 = 300;

/// Base URL of the GCE metadata server
pub const METADATA_SERVER_URL: &str = "http://metadata.google.internal/computeMetadata/v1";

/// Header required by the metadata server
pub const METADATA_FLAVOR_HEADER: &str = "Metadata-Flavor";

/// Value of the metadata header
pub const METADATA_FLAVOR_VALUE: &str = "Google";

/// Timeout for any single HTTP request to Google APIs
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Polling Constants
// ============================================================================

/// Interval between pod lookups while waiting for an IP to be assigned
pub const IP_RESOLUTION_POLL_INTERVAL_SECS: u64 = 2;

/// Interval between change status lookups while waiting for a change to be applied
pub const CHANGE_POLL_INTERVAL_SECS: u64 = 1;

/// Longest wait for a submitted change to leave `pending` (5 minutes)
pub const CHANGE_COMPLETION_TIMEOUT_SECS: u64 = 300;

// ============================================================================
// Default Configuration Values
// ============================================================================

/// Default namespace to watch
pub const DEFAULT_NAMESPACE: &str = "default";

/// Default time to wait for a pod IP before deferring to update events
pub const DEFAULT_IP_TIMEOUT: &str = "1m";

/// Default interval for the full zone reconciliation
pub const DEFAULT_FALLBACK_SYNC_INTERVAL: &str = "30m";

/// Default interval for watcher resync
pub const DEFAULT_WATCHER_SYNC_INTERVAL: &str = "10m";

/// Capacity of the channel between the pod informer and the reconciler
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Pods fetched per page when listing through the Kubernetes API
pub const KUBE_LIST_PAGE_SIZE: u32 = 100;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// How long each background task gets to stop after shutdown is requested
pub const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 10;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Default bind address for the metrics HTTP server
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Path for the liveness endpoint
pub const HEALTH_SERVER_PATH: &str = "/healthz";
