// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Periodic full-zone reconciliation.
//!
//! Every interval the [`PeriodicScanner`] lists the live pods and every record in the
//! zone, diffs them (see [`crate::diff`]) and writes whatever is missing or drifted. It runs
//! alongside the event reconciler and repairs anything the event path missed: dropped
//! events, failed writes, records edited by hand.
//!
//! Stale records (managed A records with no live pod) are reported on every scan. They are
//! only deleted when stale deletion is enabled; before deleting, the pod list is read again
//! so a pod created during the scan does not lose its fresh record.

use crate::diff::{plan, ZoneSnapshot};
use crate::dns_errors::{NamingError, SyncError};
use crate::instance_source::InstanceSource;
use crate::metrics;
use crate::naming::{snapshot_key, RecordNamer};
use crate::record_store::{RecordStore, ResourceRecordSet};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{interval_at, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Summary of one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Live pods listed
    pub live: usize,
    /// Pods whose record already matched
    pub satisfied: usize,
    /// Pods whose record was written
    pub upserted: usize,
    /// Pods without an IP yet
    pub awaiting_ip: usize,
    /// Pods with no derivable record name
    pub skipped: usize,
    /// Pods whose write failed
    pub failed: usize,
    /// Managed records with no live pod
    pub stale: Vec<ResourceRecordSet>,
    /// Stale records deleted this scan
    pub stale_deleted: usize,
}

impl ScanReport {
    /// Metrics label for the scan outcome.
    #[must_use]
    pub fn outcome(&self) -> &'static str {
        if self.failed > 0 {
            "partial"
        } else {
            "success"
        }
    }
}

/// Timer-driven full reconciliation.
pub struct PeriodicScanner {
    store: Arc<RecordStore>,
    source: Arc<dyn InstanceSource>,
    namer: RecordNamer,
    interval: Duration,
    delete_stale: bool,
    cancel: CancellationToken,
}

impl PeriodicScanner {
    /// Create a scanner running every `interval`.
    pub fn new(
        store: Arc<RecordStore>,
        source: Arc<dyn InstanceSource>,
        namer: RecordNamer,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            source,
            namer,
            interval,
            delete_stale: false,
            cancel,
        }
    }

    /// Delete stale records instead of only reporting them.
    #[must_use]
    pub fn with_stale_deletion(mut self, enabled: bool) -> Self {
        self.delete_stale = enabled;
        self
    }

    /// Scan on every tick until shutdown. The first scan runs one interval after start.
    pub async fn run(self) {
        info!(
            interval = ?self.interval,
            delete_stale = self.delete_stale,
            "Starting periodic zone scanner"
        );

        let mut ticker = interval_at(tokio::time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let start = Instant::now();
            match self.scan_once().await {
                Ok(report) => {
                    info!(
                        live = report.live,
                        satisfied = report.satisfied,
                        upserted = report.upserted,
                        awaiting_ip = report.awaiting_ip,
                        skipped = report.skipped,
                        failed = report.failed,
                        stale = report.stale.len(),
                        stale_deleted = report.stale_deleted,
                        duration = ?start.elapsed(),
                        "Zone scan complete"
                    );
                    metrics::record_scan(report.outcome(), start.elapsed());
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        transient = e.is_transient(),
                        "Zone scan failed, skipping this cycle"
                    );
                    metrics::record_scan("skipped", start.elapsed());
                    metrics::record_error("scan", e.class());
                }
            }
        }

        info!("Periodic zone scanner stopped");
    }

    /// Run one full reconciliation pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the pods or the zone cannot be listed. Failures writing
    /// individual records are counted in the report instead.
    pub async fn scan_once(&self) -> Result<ScanReport, SyncError> {
        let instances = self.source.list().await?;
        let records = self.store.list_all().await?;
        let snapshot = ZoneSnapshot::build(records, &self.namer);

        debug!(
            live = instances.len(),
            records = snapshot.len(),
            "Diffing live pods against zone"
        );

        let zone_plan = plan(&instances, snapshot, &self.namer);
        let mut report = ScanReport {
            live: instances.len(),
            satisfied: zone_plan.satisfied.len(),
            awaiting_ip: zone_plan.awaiting_ip.len(),
            skipped: zone_plan.skipped.len(),
            ..ScanReport::default()
        };

        for (instance, e) in &zone_plan.skipped {
            warn!(pod = %instance.name, error = %e, "Skipping pod in zone scan");
            metrics::record_skipped_instance(match e {
                NamingError::MissingOwner { .. } => "missing_owner",
            });
        }

        for upsert in &zone_plan.to_upsert {
            if self.cancel.is_cancelled() {
                break;
            }
            match self
                .store
                .create(&upsert.record_name, &upsert.instance.ip)
                .await
            {
                Ok(outcome) => {
                    debug!(
                        record = %upsert.record_name,
                        ip = %upsert.instance.ip,
                        outcome = outcome.label(),
                        "Zone scan wrote record"
                    );
                    report.upserted += 1;
                }
                Err(e) => {
                    error!(
                        record = %upsert.record_name,
                        ip = %upsert.instance.ip,
                        error = %e,
                        "Zone scan failed to write record"
                    );
                    metrics::record_error("scan_upsert", e.class());
                    report.failed += 1;
                }
            }
        }

        for record in &zone_plan.stale {
            warn!(
                record = %record.name,
                ip = record.ip().unwrap_or_default(),
                "Stale record has no matching pod"
            );
        }
        metrics::set_stale_records(zone_plan.stale.len());
        report.stale = zone_plan.stale;

        if self.delete_stale && !report.stale.is_empty() && !self.cancel.is_cancelled() {
            report.stale_deleted = self.delete_stale_records(&report.stale).await;
        }

        Ok(report)
    }

    /// Delete `stale` records that still have no live pod. Returns how many were deleted.
    async fn delete_stale_records(&self, stale: &[ResourceRecordSet]) -> usize {
        let live_names: HashSet<String> = match self.source.list().await {
            Ok(instances) => instances
                .into_iter()
                .map(|i| i.name.to_ascii_lowercase())
                .collect(),
            Err(e) => {
                warn!(error = %e, "Could not re-list pods, leaving stale records in place");
                return 0;
            }
        };

        let deletable: Vec<ResourceRecordSet> = stale
            .iter()
            .filter(|r| !live_names.contains(&snapshot_key(&r.name).to_ascii_lowercase()))
            .cloned()
            .collect();

        match self.store.delete_records(deletable).await {
            Ok(deleted) => deleted,
            Err(e) => {
                error!(error = %e, "Failed to delete stale records, will retry next scan");
                metrics::record_error("scan_delete_stale", e.class());
                0
            }
        }
    }
}

#[cfg(test)]
#[path = "scanner_tests.rs"]
mod scanner_tests;
