// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Command-line and environment configuration.
//!
//! Every flag can also be set through a `PRIVATE_DNS_*` environment variable. Durations
//! accept the forms understood by [`crate::duration::parse_duration`] (`500ms`, `2s`,
//! `1m`, `1h30m`).

use crate::constants::{
    CLOUD_DNS_ENDPOINT, DEFAULT_FALLBACK_SYNC_INTERVAL, DEFAULT_IP_TIMEOUT, DEFAULT_METRICS_ADDR,
    DEFAULT_NAMESPACE, DEFAULT_WATCHER_SYNC_INTERVAL, METADATA_SERVER_URL,
};
use crate::duration::parse_duration;
use crate::naming::{NameFormat, RecordNamer};
use anyhow::{bail, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Keeps Cloud DNS private zone A records in sync with Kubernetes pods
#[derive(Parser, Debug, Clone)]
#[command(name = "private-dns")]
#[command(about = "Keeps Cloud DNS private zone A records in sync with Kubernetes pods")]
#[command(version)]
pub struct Config {
    /// Namespace in which to watch pods
    #[arg(long, env = "PRIVATE_DNS_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Label selector of the pods to watch (e.g. `app=web`)
    #[arg(long, env = "PRIVATE_DNS_LABEL", default_value = "")]
    pub label: String,

    /// Domain used for generated DNS records (e.g. `svc.internal`)
    #[arg(long, env = "PRIVATE_DNS_DOMAIN")]
    pub domain: String,

    /// Cloud DNS managed zone where the records are written
    #[arg(long, env = "PRIVATE_DNS_ZONE", default_value = "")]
    pub zone: String,

    /// GCP project owning the zone; read from the metadata server when omitted
    #[arg(long, env = "PRIVATE_DNS_PROJECT")]
    pub project: Option<String>,

    /// Path to a GCP service account key file; the metadata server is used when omitted
    #[arg(long = "sa-file", env = "PRIVATE_DNS_SA_FILE")]
    pub sa_file: Option<PathBuf>,

    /// Omit the owner name from record names (`<pod>.<domain>.`)
    #[arg(long, env = "PRIVATE_DNS_SHORT_FORMAT")]
    pub short_format: bool,

    /// How long to wait for a new pod's IP before deferring to update events
    #[arg(long, env = "PRIVATE_DNS_TIMEOUT", default_value = DEFAULT_IP_TIMEOUT, value_parser = parse_duration)]
    pub timeout: Duration,

    /// Interval of the full zone reconciliation
    #[arg(long, env = "PRIVATE_DNS_FALLBACK_SYNC_INTERVAL", default_value = DEFAULT_FALLBACK_SYNC_INTERVAL, value_parser = parse_duration)]
    pub fallback_sync_interval: Duration,

    /// Interval at which cached pods are re-delivered to the reconciler
    #[arg(long, env = "PRIVATE_DNS_WATCHER_SYNC_INTERVAL", default_value = DEFAULT_WATCHER_SYNC_INTERVAL, value_parser = parse_duration)]
    pub watcher_sync_interval: Duration,

    /// Delete managed records that have no matching pod during the full reconciliation
    #[arg(long, env = "PRIVATE_DNS_DELETE_STALE_RECORDS")]
    pub delete_stale_records: bool,

    /// Keep records in memory and log changes instead of calling Cloud DNS
    #[arg(long, env = "PRIVATE_DNS_DRY_RUN")]
    pub dry_run: bool,

    /// Address of the metrics and health HTTP server
    #[arg(long, env = "PRIVATE_DNS_METRICS_ADDR", default_value = DEFAULT_METRICS_ADDR)]
    pub metrics_addr: SocketAddr,

    /// Cloud DNS API endpoint
    #[arg(long, env = "PRIVATE_DNS_CLOUD_DNS_ENDPOINT", default_value = CLOUD_DNS_ENDPOINT)]
    pub cloud_dns_endpoint: String,

    /// GCE metadata server base URL
    #[arg(long, env = "PRIVATE_DNS_METADATA_URL", default_value = METADATA_SERVER_URL, hide = true)]
    pub metadata_url: String,

    /// Log at debug level unless `RUST_LOG` says otherwise
    #[arg(long, env = "PRIVATE_DNS_DEBUG")]
    pub debug: bool,
}

impl Config {
    /// Check values clap cannot check on its own.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain is empty, or if no zone is given outside dry-run mode.
    pub fn validate(&self) -> Result<()> {
        if self.domain.trim_matches('.').is_empty() {
            bail!("--domain must not be empty");
        }
        if self.zone.is_empty() && !self.dry_run {
            bail!("--zone is required unless --dry-run is set");
        }
        Ok(())
    }

    /// Record name format selected by `--short-format`.
    #[must_use]
    pub fn name_format(&self) -> NameFormat {
        if self.short_format {
            NameFormat::Short
        } else {
            NameFormat::Full
        }
    }

    /// Record namer for the configured domain and format.
    #[must_use]
    pub fn namer(&self) -> RecordNamer {
        RecordNamer::new(&self.domain, self.name_format())
    }

    /// Label selector, or `None` to watch every pod in the namespace.
    #[must_use]
    pub fn label_selector(&self) -> Option<String> {
        Some(self.label.trim().to_string()).filter(|s| !s.is_empty())
    }

    /// Default log filter when `RUST_LOG` is not set.
    #[must_use]
    pub fn default_log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
