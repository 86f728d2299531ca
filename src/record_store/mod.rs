// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Idempotent A record operations over a Cloud DNS managed zone.
//!
//! This module is split in two layers:
//!
//! - [`DnsApi`] is the raw provider surface: list record sets, submit a change, read a
//!   change's status. [`crate::cloud_dns::CloudDnsClient`] talks to Google Cloud DNS and
//!   [`memory::InMemoryZone`] keeps a zone in process (dry runs and tests).
//! - [`RecordStore`] builds the operations the reconcilers use on top of it:
//!   - `create(name, ip)` is idempotent: no record → add; same IP → no-op; different IP →
//!     one change deleting the stale record and adding the new one.
//!   - `delete(name, ip)` is guarded: it only deletes a record whose IP equals `ip`.
//!   - every change is polled until Cloud DNS reports it `done`, for at most
//!     [`CHANGE_COMPLETION_TIMEOUT_SECS`].
//!
//! Both reconcile paths share one `RecordStore`. The fetch-before-mutate sequence is
//! repeated when Cloud DNS rejects a change because the zone moved underneath it
//! (HTTP 409/412), so interleaved writers never produce a duplicate record.

pub mod memory;

use crate::constants::{
    CHANGE_COMPLETION_TIMEOUT_SECS, CHANGE_POLL_INTERVAL_SECS, CLOUD_DNS_LIST_PAGE_SIZE,
    MAX_CONFLICT_ATTEMPTS, RECORD_TTL_SECS, RECORD_TYPE_A,
};
use crate::dns_errors::DnsApiError;
use crate::metrics;
use crate::retry::{poll_until, retry_dns_call, PollOutcome};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A Cloud DNS resource record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecordSet {
    /// Fully-qualified name, ending in `.`
    pub name: String,
    /// Record type (always `A` for records written here)
    #[serde(rename = "type")]
    pub record_type: String,
    /// Time to live in seconds
    #[serde(default)]
    pub ttl: u32,
    /// Record data; a single IP for records written here
    #[serde(default)]
    pub rrdatas: Vec<String>,
}

impl ResourceRecordSet {
    /// The record set this operator writes for `name` → `ip`.
    pub fn a_record(name: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            record_type: RECORD_TYPE_A.to_string(),
            ttl: RECORD_TTL_SECS,
            rrdatas: vec![ip.into()],
        }
    }

    /// First address in the record data.
    #[must_use]
    pub fn ip(&self) -> Option<&str> {
        self.rrdatas.first().map(String::as_str)
    }
}

/// Status of a submitted change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    /// Accepted but not yet applied
    Pending,
    /// Applied to the authoritative servers
    Done,
    /// Any status this crate does not know about; treated as not yet done
    #[serde(other)]
    Unknown,
}

/// An atomic set of record additions and deletions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    /// Provider-assigned identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Provider-reported status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ChangeStatus>,
    /// Record sets to add
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additions: Vec<ResourceRecordSet>,
    /// Record sets to delete; each must match the stored record set exactly
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deletions: Vec<ResourceRecordSet>,
}

impl Change {
    /// Returns true once the provider reports the change as applied.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.status == Some(ChangeStatus::Done)
    }
}

/// Filter for [`DnsApi::list_record_sets`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Restrict to this exact fully-qualified name
    pub name: Option<String>,
    /// Restrict to this record type (requires `name` on Cloud DNS)
    pub record_type: Option<String>,
    /// Maximum record sets per page
    pub max_results: Option<u32>,
    /// Continuation token from a previous page
    pub page_token: Option<String>,
}

/// One page of record sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSetPage {
    /// Record sets in this page
    #[serde(default)]
    pub rrsets: Vec<ResourceRecordSet>,
    /// Token for the next page, absent on the last page
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Raw DNS provider primitives for one managed zone.
#[async_trait]
pub trait DnsApi: Send + Sync {
    /// List record sets matching `filter` (one page).
    async fn list_record_sets(&self, filter: &ListFilter) -> Result<RecordSetPage, DnsApiError>;

    /// Submit a change; the returned change carries its id and initial status.
    async fn create_change(&self, change: &Change) -> Result<Change, DnsApiError>;

    /// Read the current state of a submitted change.
    async fn get_change(&self, change_id: &str) -> Result<Change, DnsApiError>;
}

/// Result of [`RecordStore::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// No record existed; one was added
    Created,
    /// A record with the same IP already existed
    Unchanged,
    /// A record with a different IP was replaced in a single change
    Replaced {
        /// The IP of the replaced record
        previous_ip: String,
    },
}

impl CreateOutcome {
    /// Short label for logs and metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Unchanged => "unchanged",
            Self::Replaced { .. } => "replaced",
        }
    }
}

/// Result of [`RecordStore::delete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The record existed with the expected IP and was deleted
    Deleted,
    /// No record exists under the name
    Absent,
    /// A record exists but points at a different IP; it was left alone
    Mismatch {
        /// The IP currently stored
        current_ip: String,
    },
}

impl DeleteOutcome {
    /// Short label for logs and metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Deleted => "deleted",
            Self::Absent => "absent",
            Self::Mismatch { .. } => "mismatch",
        }
    }
}

/// Idempotent record operations shared by the event path and the periodic scan.
#[derive(Clone)]
pub struct RecordStore {
    api: Arc<dyn DnsApi>,
    cancel: CancellationToken,
    change_poll_interval: Duration,
    change_timeout: Duration,
}

impl RecordStore {
    /// Create a store over `api`. Every wait inside the store ends when `cancel` fires.
    pub fn new(api: Arc<dyn DnsApi>, cancel: CancellationToken) -> Self {
        Self {
            api,
            cancel,
            change_poll_interval: Duration::from_secs(CHANGE_POLL_INTERVAL_SECS),
            change_timeout: Duration::from_secs(CHANGE_COMPLETION_TIMEOUT_SECS),
        }
    }

    /// Override the interval between change status polls.
    #[must_use]
    pub fn with_change_poll_interval(mut self, interval: Duration) -> Self {
        self.change_poll_interval = interval;
        self
    }

    /// Override how long a submitted change may stay pending before the call fails.
    #[must_use]
    pub fn with_change_timeout(mut self, timeout: Duration) -> Self {
        self.change_timeout = timeout;
        self
    }

    /// Fetch the A record stored under `name`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if listing fails after retries.
    pub async fn get(&self, name: &str) -> Result<Option<ResourceRecordSet>, DnsApiError> {
        let filter = ListFilter {
            name: Some(name.to_string()),
            record_type: Some(RECORD_TYPE_A.to_string()),
            max_results: Some(1),
            page_token: None,
        };
        let page = retry_dns_call(
            || self.api.list_record_sets(&filter),
            "get record",
            &self.cancel,
        )
        .await?;

        Ok(page
            .rrsets
            .into_iter()
            .find(|rrset| rrset.name.eq_ignore_ascii_case(name)))
    }

    /// List every record set in the zone, following pagination.
    ///
    /// # Errors
    ///
    /// Returns an error if any page fails after retries.
    pub async fn list_all(&self) -> Result<Vec<ResourceRecordSet>, DnsApiError> {
        let mut filter = ListFilter {
            max_results: Some(CLOUD_DNS_LIST_PAGE_SIZE),
            ..ListFilter::default()
        };
        let mut all = Vec::new();
        let mut page_count = 0;

        loop {
            page_count += 1;
            let page = retry_dns_call(
                || self.api.list_record_sets(&filter),
                "list record sets",
                &self.cancel,
            )
            .await?;

            debug!(
                page = page_count,
                items_in_page = page.rrsets.len(),
                total_items = all.len() + page.rrsets.len(),
                "Fetched page of record sets from Cloud DNS"
            );
            all.extend(page.rrsets);

            match page.next_page_token {
                Some(token) if !token.is_empty() => filter.page_token = Some(token),
                _ => break,
            }
        }

        Ok(all)
    }

    /// Ensure `name` resolves to exactly `ip`.
    ///
    /// # Errors
    ///
    /// Returns an error if a provider call fails permanently, retries are exhausted,
    /// concurrent changes keep conflicting, or shutdown interrupts a wait.
    pub async fn create(&self, name: &str, ip: &str) -> Result<CreateOutcome, DnsApiError> {
        let desired = ResourceRecordSet::a_record(name, ip);

        for attempt in 1..=MAX_CONFLICT_ATTEMPTS {
            let existing = self.get(name).await?;

            let (change, outcome) = match existing {
                None => (
                    Change {
                        additions: vec![desired.clone()],
                        ..Change::default()
                    },
                    CreateOutcome::Created,
                ),
                Some(current) if current.ip() == Some(ip) => {
                    debug!(record = %name, ip = %ip, "Record already exists");
                    metrics::record_store_operation("create", "unchanged");
                    return Ok(CreateOutcome::Unchanged);
                }
                Some(current) => {
                    let previous_ip = current.ip().unwrap_or_default().to_string();
                    info!(
                        record = %name,
                        stale_ip = %previous_ip,
                        ip = %ip,
                        "Stale record found, replacing"
                    );
                    (
                        Change {
                            additions: vec![desired.clone()],
                            deletions: vec![current],
                            ..Change::default()
                        },
                        CreateOutcome::Replaced { previous_ip },
                    )
                }
            };

            match self.apply(&change).await {
                Ok(_) => {
                    info!(record = %name, ip = %ip, outcome = outcome.label(), "Record written");
                    metrics::record_store_operation("create", outcome.label());
                    return Ok(outcome);
                }
                Err(e) if e.is_conflict() => {
                    warn!(
                        record = %name,
                        attempt = attempt,
                        error = %e,
                        "Zone changed concurrently, re-reading record"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(DnsApiError::ConflictExhausted {
            name: name.to_string(),
            attempts: MAX_CONFLICT_ATTEMPTS,
        })
    }

    /// Delete the record at `name` only if it currently resolves to `ip`.
    ///
    /// # Errors
    ///
    /// Returns an error if a provider call fails permanently, retries are exhausted,
    /// concurrent changes keep conflicting, or shutdown interrupts a wait.
    pub async fn delete(&self, name: &str, ip: &str) -> Result<DeleteOutcome, DnsApiError> {
        for attempt in 1..=MAX_CONFLICT_ATTEMPTS {
            let Some(current) = self.get(name).await? else {
                debug!(record = %name, ip = %ip, "No record found, nothing to delete");
                metrics::record_store_operation("delete", "absent");
                return Ok(DeleteOutcome::Absent);
            };

            if current.ip() != Some(ip) {
                let current_ip = current.ip().unwrap_or_default().to_string();
                debug!(
                    record = %name,
                    ip = %ip,
                    current_ip = %current_ip,
                    "Record points at a different IP, leaving it in place"
                );
                metrics::record_store_operation("delete", "mismatch");
                return Ok(DeleteOutcome::Mismatch { current_ip });
            }

            let change = Change {
                deletions: vec![current],
                ..Change::default()
            };

            match self.apply(&change).await {
                Ok(_) => {
                    info!(record = %name, ip = %ip, "Record deleted");
                    metrics::record_store_operation("delete", "deleted");
                    return Ok(DeleteOutcome::Deleted);
                }
                Err(e) if e.is_conflict() => {
                    warn!(
                        record = %name,
                        attempt = attempt,
                        error = %e,
                        "Zone changed concurrently, re-reading record"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(DnsApiError::ConflictExhausted {
            name: name.to_string(),
            attempts: MAX_CONFLICT_ATTEMPTS,
        })
    }

    /// Delete a batch of record sets in one change. Returns how many were deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the change is rejected or cannot be confirmed.
    pub async fn delete_records(
        &self,
        records: Vec<ResourceRecordSet>,
    ) -> Result<usize, DnsApiError> {
        if records.is_empty() {
            return Ok(0);
        }

        let count = records.len();
        let change = Change {
            deletions: records,
            ..Change::default()
        };
        self.apply(&change).await?;

        info!(count = count, "Deleted stale records");
        metrics::record_store_operation("delete_stale", "deleted");
        Ok(count)
    }

    /// Submit `change` and wait until Cloud DNS reports it applied.
    async fn apply(&self, change: &Change) -> Result<Change, DnsApiError> {
        let submitted = retry_dns_call(
            || self.api.create_change(change),
            "submit change",
            &self.cancel,
        )
        .await?;

        if submitted.is_done() {
            return Ok(submitted);
        }

        let Some(change_id) = submitted.id.clone() else {
            return Err(DnsApiError::Decode(
                "change accepted without an id".to_string(),
            ));
        };

        debug!(change_id = %change_id, "Waiting for change to be applied");

        let outcome = poll_until(
            self.change_poll_interval,
            Some(self.change_timeout),
            &self.cancel,
            || {
                let change_id = change_id.clone();
                async move {
                    match retry_dns_call(
                        || self.api.get_change(&change_id),
                        "get change",
                        &self.cancel,
                    )
                    .await
                    {
                        Ok(current) if current.is_done() => Some(Ok(current)),
                        Ok(_) => None,
                        Err(e) => Some(Err(e)),
                    }
                }
            },
        )
        .await;

        match outcome {
            PollOutcome::Ready(result) => result,
            PollOutcome::TimedOut => {
                warn!(
                    change_id = %change_id,
                    timeout = ?self.change_timeout,
                    "Change still pending, giving up on waiting"
                );
                Err(DnsApiError::Timeout {
                    timeout_ms: u64::try_from(self.change_timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
            PollOutcome::Cancelled => Err(DnsApiError::Cancelled),
        }
    }
}
