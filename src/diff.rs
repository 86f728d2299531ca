// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Diff between live pods and the zone's A records.
//!
//! The periodic scan builds a [`ZoneSnapshot`] from every managed A record in the zone,
//! keyed by the first label of the record name, then [`plan`] walks the live pods:
//!
//! - a record with the pod's exact name and IP is satisfied and consumed
//! - a record with the pod's exact name but another IP is consumed and the pod is upserted
//! - a pod with no record under its name is upserted
//! - a pod without an IP consumes its record (if any) but is never upserted
//! - a pod whose record name cannot be derived is skipped and consumes nothing
//!
//! Whatever is left in the snapshot afterwards has no live pod and is stale. A record that
//! shares a pod's key but not its full name (e.g. the pod moved to another owner) stays
//! unconsumed and shows up as stale.

use crate::constants::RECORD_TYPE_A;
use crate::dns_errors::NamingError;
use crate::instance::InstanceIdentity;
use crate::naming::{snapshot_key, RecordNamer};
use crate::record_store::ResourceRecordSet;
use std::collections::HashMap;
use tracing::debug;

/// Managed A records of one scan, keyed by snapshot key.
#[derive(Debug, Clone, Default)]
pub struct ZoneSnapshot {
    entries: HashMap<String, Vec<ResourceRecordSet>>,
}

impl ZoneSnapshot {
    /// Keep the A records under the managed domain from `records`.
    pub fn build(records: Vec<ResourceRecordSet>, namer: &RecordNamer) -> Self {
        let mut entries: HashMap<String, Vec<ResourceRecordSet>> = HashMap::new();
        for record in records {
            if record.record_type != RECORD_TYPE_A || !namer.is_managed(&record.name) {
                continue;
            }
            let key = snapshot_key(&record.name).to_ascii_lowercase();
            entries.entry(key).or_default().push(record);
        }
        Self { entries }
    }

    /// Number of records in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Returns true if the snapshot holds no record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> &[ResourceRecordSet] {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Remove and return the record named `record_name`, if present.
    fn take(&mut self, record_name: &str) -> Option<ResourceRecordSet> {
        let key = snapshot_key(record_name).to_ascii_lowercase();
        let records = self.entries.get_mut(&key)?;
        let position = records
            .iter()
            .position(|r| r.name.eq_ignore_ascii_case(record_name))?;
        Some(records.remove(position))
    }

    fn into_remaining(self) -> Vec<ResourceRecordSet> {
        let mut remaining: Vec<ResourceRecordSet> = self.entries.into_values().flatten().collect();
        remaining.sort_by(|a, b| a.name.cmp(&b.name));
        remaining
    }
}

/// A pod whose record must be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUpsert {
    /// The live pod
    pub instance: InstanceIdentity,
    /// Its record name
    pub record_name: String,
    /// IP of the record currently stored under that name, if any
    pub current_ip: Option<String>,
}

/// Outcome of diffing live pods against a snapshot.
#[derive(Debug, Clone, Default)]
pub struct ZonePlan {
    /// Pods whose record already matches
    pub satisfied: Vec<InstanceIdentity>,
    /// Pods whose record is missing or points elsewhere
    pub to_upsert: Vec<PlannedUpsert>,
    /// Pods without an IP yet
    pub awaiting_ip: Vec<InstanceIdentity>,
    /// Pods whose record name cannot be derived
    pub skipped: Vec<(InstanceIdentity, NamingError)>,
    /// Managed records with no live pod
    pub stale: Vec<ResourceRecordSet>,
}

/// Diff `instances` against `snapshot`.
#[must_use]
pub fn plan(
    instances: &[InstanceIdentity],
    mut snapshot: ZoneSnapshot,
    namer: &RecordNamer,
) -> ZonePlan {
    let mut zone_plan = ZonePlan::default();

    for instance in instances {
        let record_name = match namer.record_name(instance) {
            Ok(name) => name,
            Err(e) => {
                zone_plan.skipped.push((instance.clone(), e));
                continue;
            }
        };

        let current = snapshot.take(&record_name);
        if current.is_none() {
            let others = snapshot.get(snapshot_key(&record_name));
            if !others.is_empty() {
                debug!(
                    pod = %instance.name,
                    record = %record_name,
                    others = others.len(),
                    "Pod has records under a different name, leaving them stale"
                );
            }
        }

        if !instance.has_ip() {
            zone_plan.awaiting_ip.push(instance.clone());
            continue;
        }

        let current_ip = current.as_ref().and_then(|r| r.ip()).map(str::to_string);
        if current_ip.as_deref() == Some(instance.ip.as_str()) {
            zone_plan.satisfied.push(instance.clone());
        } else {
            zone_plan.to_upsert.push(PlannedUpsert {
                instance: instance.clone(),
                record_name,
                current_ip,
            });
        }
    }

    zone_plan.stale = snapshot.into_remaining();
    zone_plan
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod diff_tests;
